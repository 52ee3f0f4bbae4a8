use pxd_ir::{EnumValue, Expression, SourceLocation, Specialization, TemplateParam};

/// Stable index of an item in a [`Unit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Struct,
    Union,
    Enum,
    Typedef,
    /// Named alias synthesized for an inline function pointer type.
    FnAlias,
    Function,
    Variable,
    Constant,
    Class,
}

impl ItemKind {
    /// Struct, union or class: the kinds a bare forward declaration can introduce.
    pub fn is_aggregate(self) -> bool {
        matches!(self, ItemKind::Struct | ItemKind::Union | ItemKind::Class)
    }

    /// Kinds that introduce a type name.
    pub fn is_type(self) -> bool {
        !matches!(
            self,
            ItemKind::Function | ItemKind::Variable | ItemKind::Constant
        )
    }

    pub fn keyword(self) -> &'static str {
        match self {
            ItemKind::Struct => "struct",
            ItemKind::Union => "union",
            ItemKind::Enum => "enum",
            ItemKind::Typedef => "typedef",
            ItemKind::FnAlias => "function pointer",
            ItemKind::Function => "function",
            ItemKind::Variable => "variable",
            ItemKind::Constant => "constant",
            ItemKind::Class => "class",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Quals {
    pub is_const: bool,
    pub is_volatile: bool,
}

impl Quals {
    pub const NONE: Quals = Quals {
        is_const: false,
        is_volatile: false,
    };

    pub const CONST: Quals = Quals {
        is_const: true,
        is_volatile: false,
    };

    pub fn merge(self, other: Quals) -> Quals {
        Quals {
            is_const: self.is_const || other.is_const,
            is_volatile: self.is_volatile || other.is_volatile,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    Named { name: String, scope: Vec<String> },
    Item(ItemId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TyArg {
    Type(Ty),
    Value(String),
}

/// Type after lowering: qualifiers normalized, declared names resolved to items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    /// Builtin or external name. `scope` holds stripped namespace qualifiers.
    Named {
        name: String,
        scope: Vec<String>,
        quals: Quals,
    },
    Item {
        id: ItemId,
        quals: Quals,
    },
    Pointer {
        pointee: Box<Ty>,
        is_const: bool,
    },
    Reference {
        referent: Box<Ty>,
    },
    /// `size` is None for a flexible array member.
    Array {
        element: Box<Ty>,
        size: Option<Expression>,
    },
    FunctionPointer(Box<Signature>),
    Template {
        template: TemplateRef,
        args: Vec<TyArg>,
        /* Full specialization declared for exactly these arguments */
        specialization: Option<ItemId>,
        quals: Quals,
    },
}

impl Ty {
    pub fn named(name: &str) -> Self {
        Ty::Named {
            name: name.to_string(),
            scope: Vec::new(),
            quals: Quals::NONE,
        }
    }

    pub fn item(id: ItemId) -> Self {
        Ty::Item {
            id,
            quals: Quals::NONE,
        }
    }

    pub fn pointer(pointee: Ty) -> Self {
        Ty::Pointer {
            pointee: Box::new(pointee),
            is_const: false,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Ty::Named { name, .. } if name == "void")
    }

    /// Visit this type and every type nested in it, including signatures.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Ty)) {
        f(self);
        match self {
            Ty::Named { .. } | Ty::Item { .. } => {}
            Ty::Pointer { pointee, .. } => pointee.walk(f),
            Ty::Reference { referent } => referent.walk(f),
            Ty::Array { element, .. } => element.walk(f),
            Ty::FunctionPointer(sig) => sig.walk(f),
            Ty::Template { args, .. } => {
                for arg in args {
                    if let TyArg::Type(ty) = arg {
                        ty.walk(f);
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub ty: Ty,
    pub bit_width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: Ty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub return_type: Ty,
    pub params: Vec<Param>,
    pub variadic: bool,
}

impl Signature {
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Ty)) {
        self.return_type.walk(f);
        for param in &self.params {
            param.ty.walk(f);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    pub name: String,
    pub signature: Signature,
    pub is_const: bool,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassItem {
    Field(Member),
    Method(MethodDef),
    Constructor(Vec<Param>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassBody {
    pub template_params: Vec<TemplateParam>,
    pub specialization: Option<Specialization>,
    pub bases: Vec<Ty>,
    pub members: Option<Vec<ClassItem>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemBody {
    /// Struct or union; None for opaque.
    Aggregate { fields: Option<Vec<Member>> },
    Enum { values: Vec<EnumValue> },
    Typedef { target: Ty },
    FnAlias { signature: Signature },
    Function { signature: Signature },
    Variable { ty: Ty },
    Constant {
        value: Option<Expression>,
        ty: Option<Ty>,
    },
    Class(ClassBody),
}

impl ItemBody {
    /// Every root type the body mentions.
    pub fn types(&self) -> Vec<&Ty> {
        let mut out = Vec::new();
        match self {
            ItemBody::Aggregate { fields } => {
                for field in fields.iter().flatten() {
                    out.push(&field.ty);
                }
            }
            ItemBody::Enum { .. } => {}
            ItemBody::Typedef { target } => out.push(target),
            ItemBody::FnAlias { signature } | ItemBody::Function { signature } => {
                push_signature(signature, &mut out);
            }
            ItemBody::Variable { ty } => out.push(ty),
            ItemBody::Constant { ty, .. } => out.extend(ty.iter()),
            ItemBody::Class(class) => {
                out.extend(class.bases.iter());
                for member in class.members.iter().flatten() {
                    match member {
                        ClassItem::Field(field) => out.push(&field.ty),
                        ClassItem::Method(method) => push_signature(&method.signature, &mut out),
                        ClassItem::Constructor(params) => {
                            out.extend(params.iter().map(|p| &p.ty));
                        }
                    }
                }
            }
        }
        out
    }
}

impl ItemBody {
    pub fn types_mut(&mut self) -> Vec<&mut Ty> {
        let mut out = Vec::new();
        match self {
            ItemBody::Aggregate { fields } => {
                for field in fields.iter_mut().flatten() {
                    out.push(&mut field.ty);
                }
            }
            ItemBody::Enum { .. } => {}
            ItemBody::Typedef { target } => out.push(target),
            ItemBody::FnAlias { signature } | ItemBody::Function { signature } => {
                push_signature_mut(signature, &mut out);
            }
            ItemBody::Variable { ty } => out.push(ty),
            ItemBody::Constant { ty, .. } => out.extend(ty.iter_mut()),
            ItemBody::Class(class) => {
                out.extend(class.bases.iter_mut());
                for member in class.members.iter_mut().flatten() {
                    match member {
                        ClassItem::Field(field) => out.push(&mut field.ty),
                        ClassItem::Method(method) => {
                            push_signature_mut(&mut method.signature, &mut out)
                        }
                        ClassItem::Constructor(params) => {
                            out.extend(params.iter_mut().map(|p| &mut p.ty));
                        }
                    }
                }
            }
        }
        out
    }
}

fn push_signature_mut<'a>(signature: &'a mut Signature, out: &mut Vec<&'a mut Ty>) {
    out.push(&mut signature.return_type);
    out.extend(signature.params.iter_mut().map(|p| &mut p.ty));
}

fn push_signature<'a>(signature: &'a Signature, out: &mut Vec<&'a Ty>) {
    out.push(&signature.return_type);
    out.extend(signature.params.iter().map(|p| &p.ty));
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Declared,
    /// `typedef struct { ... } X;`: the aggregate takes the typedef's name.
    TypedefNamed,
    /// Anonymous aggregate or inline function pointer, named after its position.
    Synthesized {
        owner: String,
        path: Vec<String>,
        tag: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub name: Option<String>,
    pub namespace: Vec<String>,
    pub location: Option<SourceLocation>,
    /* (top-level declaration index, nesting sequence) */
    pub position: (usize, usize),
    pub origin: Origin,
    /* Enclosing item for nested and synthesized items */
    pub parent: Option<ItemId>,
    pub body: ItemBody,
    /* Limitations found while lowering, rendered as `# NOTE:` lines */
    pub notes: Vec<String>,
}

impl Item {
    pub fn is_opaque(&self) -> bool {
        match &self.body {
            ItemBody::Aggregate { fields } => fields.is_none(),
            ItemBody::Class(class) => class.members.is_none(),
            _ => false,
        }
    }

    pub fn qualified_name(&self) -> Option<String> {
        let name = self.name.as_ref()?;
        if self.namespace.is_empty() {
            Some(name.clone())
        } else {
            Some(format!("{}::{}", self.namespace.join("::"), name))
        }
    }

    /// Owner name and field path used for names synthesized inside this item.
    pub fn naming_context(&self) -> (String, Vec<String>) {
        match &self.origin {
            Origin::Synthesized { owner, path, .. } => (owner.clone(), path.clone()),
            _ => (self.name.clone().unwrap_or_default(), Vec::new()),
        }
    }

    /// Human-readable identification for diagnostics.
    pub fn describe(&self) -> String {
        let what = match (&self.origin, self.qualified_name()) {
            (Origin::Synthesized { owner, path, .. }, _) => {
                let mut full = vec![owner.clone()];
                full.extend(path.iter().cloned());
                format!("anonymous {} at {}", self.kind.keyword(), full.join("."))
            }
            (_, Some(name)) => format!("{} {}", self.kind.keyword(), name),
            (_, None) => format!("anonymous {}", self.kind.keyword()),
        };
        match &self.location {
            Some(loc) => format!("{} ({}:{})", what, loc.file, loc.line),
            None => what,
        }
    }
}

/// Arena of lowered declarations for one header.
#[derive(Debug, Clone)]
pub struct Unit {
    pub path: String,
    pub items: Vec<Item>,
}

impl Unit {
    pub fn item(&self, id: ItemId) -> &Item {
        &self.items[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.iter().map(|item| item.id)
    }

    /// Enum item that declares the constant `name`.
    pub fn enum_owning(&self, name: &str) -> Option<ItemId> {
        self.items.iter().find_map(|item| match &item.body {
            ItemBody::Enum { values } if values.iter().any(|v| v.name == name) => Some(item.id),
            _ => None,
        })
    }

    /// Constant item (macro or const object) named `name`.
    pub fn constant_named(&self, name: &str) -> Option<ItemId> {
        self.items
            .iter()
            .find(|item| item.kind == ItemKind::Constant && item.name.as_deref() == Some(name))
            .map(|item| item.id)
    }
}
