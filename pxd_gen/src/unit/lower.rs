use super::model::*;
use crate::errors::{GenError, GenResult, Stage, Warning};
use pxd_ir::{
    Aggregate, ArraySize, CType, ClassDecl, ClassMember, DeclKind, Declaration, EnumDecl, Field,
    Header, Parameter, Qualifier, SourceLocation, TemplateArg, TypedefDecl,
};
use std::collections::HashMap;
use tracing::{debug, trace};

const ELABORATED_KEYWORDS: &[&str] = &["struct", "union", "enum", "class", "typename"];

/* Qualifiers with no Cython spelling; dropped during lowering */
const DROPPED_QUALIFIERS: &[&str] = &[
    "restrict",
    "__restrict",
    "__restrict__",
    "_Atomic",
    "_Noreturn",
    "register",
    "__extension__",
];

/// A named type spelling split into its parts.
#[derive(Debug, PartialEq)]
struct SplitName {
    base: String,
    scope: Vec<String>,
    keyword: Option<String>,
    quals: Quals,
}

fn quals_from(qualifiers: &[Qualifier]) -> Quals {
    let mut quals = Quals::NONE;
    for qualifier in qualifiers {
        match qualifier {
            Qualifier::Const => quals.is_const = true,
            Qualifier::Volatile => quals.is_volatile = true,
            Qualifier::Restrict | Qualifier::Atomic => {}
        }
    }
    quals
}

fn split_named(name: &str, qualifiers: &[Qualifier]) -> SplitName {
    let mut quals = quals_from(qualifiers);
    let mut keyword = None;
    let mut words: Vec<&str> = Vec::new();

    for word in name.split_whitespace() {
        match word {
            "const" => quals.is_const = true,
            "volatile" => quals.is_volatile = true,
            w if DROPPED_QUALIFIERS.contains(&w) => {}
            w if ELABORATED_KEYWORDS.contains(&w) && keyword.is_none() && words.is_empty() => {
                keyword = Some(w.to_string());
            }
            w => words.push(w),
        }
    }

    let joined = words.join(" ");
    let (scope, base) = split_scope(&joined);
    SplitName {
        base,
        scope,
        keyword,
        quals,
    }
}

fn split_scope(name: &str) -> (Vec<String>, String) {
    if !name.contains("::") || name.contains('<') {
        return (Vec::new(), name.to_string());
    }
    let mut parts: Vec<String> = name
        .split("::")
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();
    let base = parts.pop().unwrap_or_default();
    (parts, base)
}

fn qualify(namespace: &[String], name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", namespace.join("::"), name)
    }
}

fn specialization_key(template: &str, args: &[TemplateArg]) -> String {
    format!("{}<{:?}>", template, args)
}

fn placeholder(kind: ItemKind) -> ItemBody {
    match kind {
        ItemKind::Struct | ItemKind::Union => ItemBody::Aggregate { fields: None },
        ItemKind::Enum => ItemBody::Enum { values: Vec::new() },
        ItemKind::Typedef => ItemBody::Typedef {
            target: Ty::named("void"),
        },
        ItemKind::FnAlias | ItemKind::Function => {
            let signature = Signature {
                return_type: Ty::named("void"),
                params: Vec::new(),
                variadic: false,
            };
            if kind == ItemKind::FnAlias {
                ItemBody::FnAlias { signature }
            } else {
                ItemBody::Function { signature }
            }
        }
        ItemKind::Variable => ItemBody::Variable {
            ty: Ty::named("void"),
        },
        ItemKind::Constant => ItemBody::Constant {
            value: None,
            ty: None,
        },
        ItemKind::Class => ItemBody::Class(ClassBody {
            template_params: Vec::new(),
            specialization: None,
            bases: Vec::new(),
            members: None,
        }),
    }
}

/// Position of the type currently being lowered; drives synthesized names.
#[derive(Debug, Clone)]
struct Ctx {
    owner: String,
    path: Vec<String>,
    parent: ItemId,
    index: usize,
    namespace: Vec<String>,
    location: Option<SourceLocation>,
}

impl Ctx {
    fn for_item(item: &Item) -> Self {
        let (owner, path) = item.naming_context();
        Self {
            owner,
            path,
            parent: item.id,
            index: item.position.0,
            namespace: item.namespace.clone(),
            location: item.location.clone(),
        }
    }
}

struct Lowerer {
    items: Vec<Item>,
    /* Qualified names of type items */
    types: HashMap<String, ItemId>,
    /* Unqualified fallback for namespaced types; first declaration wins */
    short_names: HashMap<String, ItemId>,
    specializations: HashMap<String, ItemId>,
    next_sub: HashMap<usize, usize>,
    warnings: Vec<Warning>,
}

/// Lower a header into an item arena (the Collecting stage).
pub fn collect(header: &Header) -> GenResult<(Unit, Vec<Warning>)> {
    let mut lowerer = Lowerer {
        items: Vec::new(),
        types: HashMap::new(),
        short_names: HashMap::new(),
        specializations: HashMap::new(),
        next_sub: HashMap::new(),
        warnings: Vec::new(),
    };

    let mut index = 0;
    lowerer.lower_declarations(&header.declarations, &[], &mut index)?;
    lowerer.resolve_names();
    lowerer.hoist_function_pointers();

    debug!(
        "collected {} items from {} top-level declarations",
        lowerer.items.len(),
        index
    );

    Ok((
        Unit {
            path: header.path.clone(),
            items: lowerer.items,
        },
        lowerer.warnings,
    ))
}

impl Lowerer {
    fn lower_declarations(
        &mut self,
        decls: &[Declaration],
        namespace: &[String],
        index: &mut usize,
    ) -> GenResult<()> {
        for decl in decls {
            if let DeclKind::Namespace(ns) = &decl.kind {
                let mut inner = namespace.to_vec();
                /* Anonymous namespaces add no qualification */
                if let Some(name) = &decl.name {
                    inner.push(name.clone());
                }
                self.lower_declarations(&ns.declarations, &inner, index)?;
                continue;
            }
            self.lower_declaration(decl, namespace, *index)?;
            *index += 1;
        }
        Ok(())
    }

    fn lower_declaration(
        &mut self,
        decl: &Declaration,
        namespace: &[String],
        index: usize,
    ) -> GenResult<()> {
        let location = decl.location.clone();
        let position = (index, 0);

        match &decl.kind {
            DeclKind::Struct(agg) | DeclKind::Union(agg) => {
                let kind = aggregate_kind(&decl.kind);
                match &decl.name {
                    Some(name) => {
                        self.declare_aggregate(
                            kind,
                            name,
                            agg,
                            namespace,
                            position,
                            location,
                            Origin::Declared,
                            None,
                        )?;
                    }
                    None => self.warnings.push(Warning::unsupported(
                        &format!("anonymous {}", kind.keyword()),
                        "declaration without a name or declarator was skipped",
                    )),
                }
            }
            DeclKind::Enum(values) => {
                self.declare_enum(
                    decl.name.as_deref(),
                    values,
                    namespace,
                    position,
                    location,
                    Origin::Declared,
                    None,
                )?;
            }
            DeclKind::Class(class) => match &decl.name {
                Some(name) => {
                    self.declare_class(name, class, namespace, position, location, None)?;
                }
                None => self.warnings.push(Warning::unsupported(
                    "anonymous class",
                    "class without a name was skipped",
                )),
            },
            DeclKind::Typedef(typedef) => {
                if let Some(name) = &decl.name {
                    self.declare_typedef(name, typedef, namespace, index, location)?;
                }
            }
            DeclKind::Function(function) => {
                if let Some(name) = &decl.name {
                    let id = self.allocate(
                        ItemKind::Function,
                        Some(name.clone()),
                        namespace,
                        location,
                        position,
                        Origin::Declared,
                        None,
                    );
                    let mut ctx = Ctx::for_item(&self.items[id.0]);
                    let signature = self.lower_signature(
                        &function.return_type,
                        &function.params,
                        function.variadic,
                        &mut ctx,
                    )?;
                    self.items[id.0].body = ItemBody::Function { signature };
                }
            }
            DeclKind::Variable(variable) => {
                if let Some(name) = &decl.name {
                    let id = self.allocate(
                        ItemKind::Variable,
                        Some(name.clone()),
                        namespace,
                        location,
                        position,
                        Origin::Declared,
                        None,
                    );
                    let mut ctx = Ctx::for_item(&self.items[id.0]);
                    let ty = self.lower_type(&variable.ty, &mut ctx)?;
                    self.items[id.0].body = ItemBody::Variable { ty };
                }
            }
            DeclKind::Constant(constant) => {
                if let Some(name) = &decl.name {
                    let id = self.allocate(
                        ItemKind::Constant,
                        Some(name.clone()),
                        namespace,
                        location,
                        position,
                        Origin::Declared,
                        None,
                    );
                    let mut ctx = Ctx::for_item(&self.items[id.0]);
                    let ty = match &constant.ty {
                        Some(ty) => Some(self.lower_type(ty, &mut ctx)?),
                        None => None,
                    };
                    self.items[id.0].body = ItemBody::Constant {
                        value: constant.value.clone(),
                        ty,
                    };
                }
            }
            DeclKind::Namespace(ns) => {
                let mut index = index;
                self.lower_declarations(&ns.declarations, namespace, &mut index)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn allocate(
        &mut self,
        kind: ItemKind,
        name: Option<String>,
        namespace: &[String],
        location: Option<SourceLocation>,
        position: (usize, usize),
        origin: Origin,
        parent: Option<ItemId>,
    ) -> ItemId {
        let id = ItemId(self.items.len());
        trace!("allocating {:?} {:?} at {:?}", kind, name, position);
        self.items.push(Item {
            id,
            kind,
            name,
            namespace: namespace.to_vec(),
            location,
            position,
            origin,
            parent,
            body: placeholder(kind),
            notes: Vec::new(),
        });
        id
    }

    fn register_type(&mut self, id: ItemId, name: &str, namespace: &[String]) {
        self.types.entry(qualify(namespace, name)).or_insert(id);
        if !namespace.is_empty() {
            self.short_names.entry(name.to_string()).or_insert(id);
        }
    }

    fn next_position(&mut self, index: usize) -> (usize, usize) {
        let sub = self.next_sub.entry(index).or_insert(0);
        *sub += 1;
        (index, *sub)
    }

    /// Existing item that a redeclaration of `name` should merge into.
    ///
    /// Returns `Ok(None)` when no compatible item exists and a collision error
    /// when both declarations carry a body.
    fn find_mergeable(
        &self,
        kind: ItemKind,
        name: &str,
        namespace: &[String],
        has_body: bool,
        location: &Option<SourceLocation>,
    ) -> GenResult<Option<ItemId>> {
        let qualified = qualify(namespace, name);
        let Some(&existing) = self.types.get(&qualified) else {
            return Ok(None);
        };
        let item = &self.items[existing.0];
        if item.kind != kind {
            return Ok(None);
        }
        if has_body && !item.is_opaque() && !matches!(&item.body, ItemBody::Enum { values } if values.is_empty())
        {
            let second = match location {
                Some(loc) => format!("{} {} ({}:{})", kind.keyword(), qualified, loc.file, loc.line),
                None => format!("{} {}", kind.keyword(), qualified),
            };
            return Err(GenError::NameCollision {
                stage: Stage::Collecting,
                identifier: qualified,
                first: item.describe(),
                second,
            });
        }
        Ok(Some(existing))
    }

    #[allow(clippy::too_many_arguments)]
    fn declare_aggregate(
        &mut self,
        kind: ItemKind,
        name: &str,
        agg: &Aggregate,
        namespace: &[String],
        position: (usize, usize),
        location: Option<SourceLocation>,
        origin: Origin,
        parent: Option<ItemId>,
    ) -> GenResult<ItemId> {
        let has_body = agg.fields.is_some();
        let id = match self.find_mergeable(kind, name, namespace, has_body, &location)? {
            Some(existing) => {
                if !has_body {
                    return Ok(existing);
                }
                debug!("merging definition of {} {} into its forward declaration", kind.keyword(), name);
                let item = &mut self.items[existing.0];
                item.position = position;
                item.location = location;
                if origin == Origin::TypedefNamed {
                    item.origin = origin;
                }
                existing
            }
            None => {
                let id = self.allocate(
                    kind,
                    Some(name.to_string()),
                    namespace,
                    location,
                    position,
                    origin,
                    parent,
                );
                self.register_type(id, name, namespace);
                id
            }
        };

        if let Some(fields) = &agg.fields {
            let mut ctx = Ctx::for_item(&self.items[id.0]);
            let members = self.lower_fields(fields, &mut ctx)?;
            self.items[id.0].body = ItemBody::Aggregate {
                fields: Some(members),
            };
        }
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    fn declare_enum(
        &mut self,
        name: Option<&str>,
        decl: &EnumDecl,
        namespace: &[String],
        position: (usize, usize),
        location: Option<SourceLocation>,
        origin: Origin,
        parent: Option<ItemId>,
    ) -> GenResult<ItemId> {
        let has_body = !decl.values.is_empty();
        let existing = match name {
            Some(name) => self.find_mergeable(ItemKind::Enum, name, namespace, has_body, &location)?,
            None => None,
        };

        let id = match existing {
            Some(existing) => {
                if !has_body {
                    return Ok(existing);
                }
                let item = &mut self.items[existing.0];
                item.position = position;
                item.location = location;
                existing
            }
            None => {
                let id = self.allocate(
                    ItemKind::Enum,
                    name.map(str::to_string),
                    namespace,
                    location,
                    position,
                    origin,
                    parent,
                );
                if let Some(name) = name {
                    self.register_type(id, name, namespace);
                }
                id
            }
        };

        self.items[id.0].body = ItemBody::Enum {
            values: decl.values.clone(),
        };
        Ok(id)
    }

    fn declare_class(
        &mut self,
        name: &str,
        class: &ClassDecl,
        namespace: &[String],
        position: (usize, usize),
        location: Option<SourceLocation>,
        parent: Option<ItemId>,
    ) -> GenResult<ItemId> {
        let id = match &class.specialization {
            Some(spec) if spec.partial && self.types.contains_key(&qualify(namespace, name)) => {
                let primary = self.types[&qualify(namespace, name)];
                let note = format!(
                    "partial specialization of {} skipped; only the primary template is declared",
                    name
                );
                self.items[primary.0].notes.push(note.clone());
                self.warnings
                    .push(Warning::unsupported(&format!("class {}", name), note));
                return Ok(primary);
            }
            Some(spec) if !spec.partial => {
                let id = self.allocate(
                    ItemKind::Class,
                    Some(name.to_string()),
                    namespace,
                    location,
                    position,
                    Origin::Declared,
                    parent,
                );
                self.specializations
                    .insert(specialization_key(name, &spec.args), id);
                id
            }
            _ => {
                let has_body = class.members.is_some();
                match self.find_mergeable(ItemKind::Class, name, namespace, has_body, &location)? {
                    Some(existing) if !has_body => return Ok(existing),
                    Some(existing) => {
                        let item = &mut self.items[existing.0];
                        item.position = position;
                        item.location = location;
                        existing
                    }
                    None => {
                        let id = self.allocate(
                            ItemKind::Class,
                            Some(name.to_string()),
                            namespace,
                            location,
                            position,
                            Origin::Declared,
                            parent,
                        );
                        self.register_type(id, name, namespace);
                        id
                    }
                }
            }
        };

        let mut ctx = Ctx::for_item(&self.items[id.0]);
        let mut bases = Vec::new();
        for base in &class.bases {
            bases.push(self.lower_type(base, &mut ctx)?);
        }

        let members = match &class.members {
            Some(members) => {
                let mut lowered = Vec::new();
                for member in members {
                    match member {
                        ClassMember::Field(field) => {
                            for lowered_field in
                                self.lower_fields(std::slice::from_ref(field), &mut ctx)?
                            {
                                lowered.push(ClassItem::Field(lowered_field));
                            }
                        }
                        ClassMember::Method(method) => {
                            ctx.path.push(method.name.clone());
                            let signature = self.lower_signature(
                                &method.return_type,
                                &method.params,
                                method.variadic,
                                &mut ctx,
                            )?;
                            ctx.path.pop();
                            lowered.push(ClassItem::Method(MethodDef {
                                name: method.name.clone(),
                                signature,
                                is_const: method.is_const,
                                is_static: method.is_static,
                            }));
                        }
                        ClassMember::Constructor(ctor) => {
                            let void = CType::named("void");
                            let signature =
                                self.lower_signature(&void, &ctor.params, false, &mut ctx)?;
                            lowered.push(ClassItem::Constructor(signature.params));
                        }
                    }
                }
                Some(lowered)
            }
            None => None,
        };

        self.items[id.0].body = ItemBody::Class(ClassBody {
            template_params: class.template_params.clone(),
            specialization: class.specialization.clone(),
            bases,
            members,
        });
        Ok(id)
    }

    fn declare_typedef(
        &mut self,
        name: &str,
        typedef: &TypedefDecl,
        namespace: &[String],
        index: usize,
        location: Option<SourceLocation>,
    ) -> GenResult<()> {
        let position = (index, 0);

        match &typedef.target {
            CType::Inline(inner) if is_tag_declaration(inner) => {
                let inner_location = inner.location.clone().or_else(|| location.clone());
                match inner.name.as_deref() {
                    /* typedef struct { ... } X; */
                    None => {
                        self.declare_tag(inner, name, namespace, position, inner_location, Origin::TypedefNamed)?;
                        return Ok(());
                    }
                    /* typedef struct X { ... } X; */
                    Some(tag) if tag == name => {
                        self.declare_tag(inner, name, namespace, position, inner_location, Origin::Declared)?;
                        return Ok(());
                    }
                    /* typedef struct _X { ... } X; falls through to a plain typedef */
                    Some(_) => {}
                }
            }
            CType::Named(named) => {
                let split = split_named(&named.name, &named.qualifiers);
                if split.base == name && split.scope.is_empty() {
                    /* typedef struct X X; */
                    if !self.types.contains_key(&qualify(namespace, name)) {
                        let kind = match split.keyword.as_deref() {
                            Some("union") => ItemKind::Union,
                            Some("enum") => ItemKind::Enum,
                            Some("class") => ItemKind::Class,
                            _ => ItemKind::Struct,
                        };
                        let id = self.allocate(
                            kind,
                            Some(name.to_string()),
                            namespace,
                            location,
                            position,
                            Origin::Declared,
                            None,
                        );
                        self.register_type(id, name, namespace);
                    }
                    debug!("typedef {} names its own tag; elided", name);
                    return Ok(());
                }
            }
            _ => {}
        }

        let id = self.allocate(
            ItemKind::Typedef,
            Some(name.to_string()),
            namespace,
            location,
            position,
            Origin::Declared,
            None,
        );
        self.register_type(id, name, namespace);
        let mut ctx = Ctx::for_item(&self.items[id.0]);
        let target = self.lower_type(&typedef.target, &mut ctx)?;
        self.items[id.0].body = ItemBody::Typedef { target };
        Ok(())
    }

    /// Declare a struct/union/enum/class declaration under `name`.
    fn declare_tag(
        &mut self,
        decl: &Declaration,
        name: &str,
        namespace: &[String],
        position: (usize, usize),
        location: Option<SourceLocation>,
        origin: Origin,
    ) -> GenResult<ItemId> {
        match &decl.kind {
            DeclKind::Struct(agg) | DeclKind::Union(agg) => self.declare_aggregate(
                aggregate_kind(&decl.kind),
                name,
                agg,
                namespace,
                position,
                location,
                origin,
                None,
            ),
            DeclKind::Enum(values) => {
                self.declare_enum(Some(name), values, namespace, position, location, origin, None)
            }
            DeclKind::Class(class) => {
                self.declare_class(name, class, namespace, position, location, None)
            }
            _ => Ok(self.allocate(
                ItemKind::Typedef,
                Some(name.to_string()),
                namespace,
                location,
                position,
                origin,
                None,
            )),
        }
    }

    fn lower_fields(&mut self, fields: &[Field], ctx: &mut Ctx) -> GenResult<Vec<Member>> {
        let mut members = Vec::new();
        for field in fields {
            match &field.name {
                Some(name) => {
                    ctx.path.push(name.clone());
                    let ty = self.lower_type(&field.ty, ctx)?;
                    ctx.path.pop();
                    members.push(Member {
                        name: name.clone(),
                        ty,
                        bit_width: field.bit_width,
                    });
                }
                None => match &field.ty {
                    /* C11 anonymous member: its fields belong to the enclosing aggregate */
                    CType::Inline(inner) if inner.name.is_none() => match &inner.kind {
                        DeclKind::Struct(agg) | DeclKind::Union(agg) => {
                            if let Some(inner_fields) = &agg.fields {
                                members.extend(self.lower_fields(inner_fields, ctx)?);
                            }
                        }
                        _ => {
                            self.lower_type(&field.ty, ctx)?;
                        }
                    },
                    /* Nested tag declaration without a member */
                    CType::Inline(_) => {
                        self.lower_type(&field.ty, ctx)?;
                    }
                    _ => trace!("skipping unnamed member in {}", ctx.owner),
                },
            }
        }
        Ok(members)
    }

    fn lower_signature(
        &mut self,
        return_type: &CType,
        params: &[Parameter],
        variadic: bool,
        ctx: &mut Ctx,
    ) -> GenResult<Signature> {
        let return_type = self.lower_type(return_type, ctx)?;
        let mut lowered = Vec::new();
        for (i, param) in params.iter().enumerate() {
            ctx.path
                .push(param.name.clone().unwrap_or_else(|| format!("arg{}", i)));
            let ty = self.lower_type(&param.ty, ctx)?;
            ctx.path.pop();
            lowered.push(Param {
                name: param.name.clone(),
                ty,
            });
        }

        /* `(void)` declares an empty parameter list */
        if lowered.len() == 1 && lowered[0].name.is_none() && lowered[0].ty.is_void() {
            lowered.clear();
        }

        Ok(Signature {
            return_type,
            params: lowered,
            variadic,
        })
    }

    fn lower_type(&mut self, ty: &CType, ctx: &mut Ctx) -> GenResult<Ty> {
        match ty {
            CType::Named(named) => {
                let split = split_named(&named.name, &named.qualifiers);
                Ok(Ty::Named {
                    name: split.base,
                    scope: split.scope,
                    quals: split.quals,
                })
            }
            CType::Pointer(pointer) => Ok(Ty::Pointer {
                pointee: Box::new(self.lower_type(&pointer.pointee, ctx)?),
                is_const: pointer.qualifiers.contains(&Qualifier::Const),
            }),
            CType::Reference(reference) => Ok(Ty::Reference {
                referent: Box::new(self.lower_type(&reference.referent, ctx)?),
            }),
            CType::Array(array) => Ok(Ty::Array {
                element: Box::new(self.lower_type(&array.element, ctx)?),
                size: match &array.size {
                    ArraySize::Fixed(expr) => Some(expr.clone()),
                    ArraySize::Flexible => None,
                },
            }),
            CType::FunctionPointer(fp) => {
                let signature =
                    self.lower_signature(&fp.return_type, &fp.params, fp.variadic, ctx)?;
                Ok(Ty::FunctionPointer(Box::new(signature)))
            }
            CType::TemplateInstantiation(inst) => {
                let split = split_named(&inst.template, &inst.qualifiers);
                let specialization = self
                    .specializations
                    .get(&specialization_key(&split.base, &inst.args))
                    .copied();
                let mut args = Vec::new();
                for arg in &inst.args {
                    args.push(match arg {
                        TemplateArg::Type(arg_ty) => TyArg::Type(self.lower_type(arg_ty, ctx)?),
                        TemplateArg::Value(value) => TyArg::Value(value.clone()),
                    });
                }
                Ok(Ty::Template {
                    template: TemplateRef::Named {
                        name: split.base,
                        scope: split.scope,
                    },
                    args,
                    specialization,
                    quals: split.quals,
                })
            }
            CType::Inline(decl) => self.lower_inline(decl, ctx),
        }
    }

    fn lower_inline(&mut self, decl: &Declaration, ctx: &mut Ctx) -> GenResult<Ty> {
        let position = self.next_position(ctx.index);
        let location = decl.location.clone().or_else(|| ctx.location.clone());
        let namespace = ctx.namespace.clone();

        if let Some(name) = &decl.name {
            if !is_tag_declaration(decl) {
                self.warnings.push(Warning::unsupported(
                    &ctx.owner,
                    format!("inline {} {} is not a type; referenced by name", decl.kind_name(), name),
                ));
                return Ok(Ty::named(name));
            }
            let id = match &decl.kind {
                DeclKind::Struct(agg) | DeclKind::Union(agg) => self.declare_aggregate(
                    aggregate_kind(&decl.kind),
                    name,
                    agg,
                    &namespace,
                    position,
                    location,
                    Origin::Declared,
                    Some(ctx.parent),
                )?,
                DeclKind::Enum(values) => self.declare_enum(
                    Some(name),
                    values,
                    &namespace,
                    position,
                    location,
                    Origin::Declared,
                    Some(ctx.parent),
                )?,
                _ => self.declare_tag(decl, name, &namespace, position, location, Origin::Declared)?,
            };
            return Ok(Ty::item(id));
        }

        let (kind, tag) = match &decl.kind {
            DeclKind::Struct(_) => (ItemKind::Struct, "s"),
            DeclKind::Union(_) => (ItemKind::Union, "u"),
            DeclKind::Enum(_) => (ItemKind::Enum, "e"),
            DeclKind::Class(_) => (ItemKind::Struct, "s"),
            _ => {
                self.warnings.push(Warning::unsupported(
                    &ctx.owner,
                    format!("anonymous inline {} has no output form", decl.kind_name()),
                ));
                return Ok(Ty::named("int"));
            }
        };

        let origin = Origin::Synthesized {
            owner: ctx.owner.clone(),
            path: ctx.path.clone(),
            tag,
        };
        let id = self.allocate(kind, None, &namespace, location, position, origin, Some(ctx.parent));
        let mut inner = Ctx {
            owner: ctx.owner.clone(),
            path: ctx.path.clone(),
            parent: id,
            index: ctx.index,
            namespace,
            location: ctx.location.clone(),
        };

        let body = match &decl.kind {
            DeclKind::Struct(agg) | DeclKind::Union(agg) => {
                let fields = match &agg.fields {
                    Some(fields) => Some(self.lower_fields(fields, &mut inner)?),
                    None => None,
                };
                ItemBody::Aggregate { fields }
            }
            DeclKind::Enum(values) => ItemBody::Enum {
                values: values.values.clone(),
            },
            DeclKind::Class(class) => {
                let fields: Vec<Field> = class
                    .members
                    .iter()
                    .flatten()
                    .filter_map(|member| match member {
                        ClassMember::Field(field) => Some(field.clone()),
                        _ => None,
                    })
                    .collect();
                ItemBody::Aggregate {
                    fields: Some(self.lower_fields(&fields, &mut inner)?),
                }
            }
            _ => placeholder(kind),
        };
        self.items[id.0].body = body;
        Ok(Ty::item(id))
    }

    /// Replace named references to declared types with item references.
    fn resolve_names(&mut self) {
        for idx in 0..self.items.len() {
            let namespace = self.items[idx].namespace.clone();
            let shadowed: Vec<String> = match &self.items[idx].body {
                ItemBody::Class(class) => class
                    .template_params
                    .iter()
                    .map(|param| param.name.clone())
                    .collect(),
                _ => Vec::new(),
            };
            let mut body = std::mem::replace(&mut self.items[idx].body, placeholder(ItemKind::Enum));
            for ty in body.types_mut() {
                self.resolve_ty(ty, &namespace, &shadowed);
            }
            self.items[idx].body = body;
        }
    }

    fn resolve_ty(&self, ty: &mut Ty, namespace: &[String], shadowed: &[String]) {
        match ty {
            Ty::Named { name, scope, quals } => {
                if scope.is_empty() && shadowed.contains(name) {
                    return;
                }
                if let Some(id) = self.lookup_type(name, scope, namespace) {
                    let quals = *quals;
                    *ty = Ty::Item { id, quals };
                }
            }
            Ty::Item { .. } => {}
            Ty::Pointer { pointee, .. } => self.resolve_ty(pointee, namespace, shadowed),
            Ty::Reference { referent } => self.resolve_ty(referent, namespace, shadowed),
            Ty::Array { element, .. } => self.resolve_ty(element, namespace, shadowed),
            Ty::FunctionPointer(signature) => {
                self.resolve_ty(&mut signature.return_type, namespace, shadowed);
                for param in &mut signature.params {
                    self.resolve_ty(&mut param.ty, namespace, shadowed);
                }
            }
            Ty::Template { template, args, .. } => {
                if let TemplateRef::Named { name, scope } = template {
                    let resolved = self
                        .lookup_type(name, scope, namespace)
                        .filter(|id| self.items[id.0].kind == ItemKind::Class);
                    if let Some(id) = resolved {
                        *template = TemplateRef::Item(id);
                    }
                }
                for arg in args {
                    if let TyArg::Type(arg_ty) = arg {
                        self.resolve_ty(arg_ty, namespace, shadowed);
                    }
                }
            }
        }
    }

    /// Look `name` up from inside `namespace`, innermost enclosing scope first.
    fn lookup_type(&self, name: &str, scope: &[String], namespace: &[String]) -> Option<ItemId> {
        for depth in (0..=namespace.len()).rev() {
            let mut parts: Vec<&str> = namespace[..depth].iter().map(String::as_str).collect();
            parts.extend(scope.iter().map(String::as_str));
            parts.push(name);
            if let Some(&id) = self.types.get(&parts.join("::")) {
                return Some(id);
            }
        }
        if scope.is_empty() {
            return self.short_names.get(name).copied();
        }
        None
    }

    /// Give every inline function pointer type a named alias (the first
    /// occurrence names it) and refer to the alias everywhere.
    fn hoist_function_pointers(&mut self) {
        let mut aliases: HashMap<String, ItemId> = HashMap::new();
        for item in &self.items {
            if let ItemBody::Typedef {
                target: Ty::FunctionPointer(signature),
            } = &item.body
            {
                aliases.entry(signature_key(signature)).or_insert(item.id);
            }
        }

        let count = self.items.len();
        for idx in 0..count {
            let id = ItemId(idx);
            let (owner, mut path) = self.items[idx].naming_context();
            let mut body = std::mem::replace(&mut self.items[idx].body, placeholder(ItemKind::Enum));

            match &mut body {
                ItemBody::Typedef {
                    target: Ty::FunctionPointer(signature),
                } => self.hoist_in_signature(signature, id, &owner, &mut path, &mut aliases),
                ItemBody::Typedef { target } => {
                    self.hoist_ty(target, id, &owner, &mut path, &mut aliases)
                }
                ItemBody::Aggregate { fields } => {
                    for field in fields.iter_mut().flatten() {
                        path.push(field.name.clone());
                        self.hoist_ty(&mut field.ty, id, &owner, &mut path, &mut aliases);
                        path.pop();
                    }
                }
                ItemBody::FnAlias { signature } | ItemBody::Function { signature } => {
                    self.hoist_in_signature(signature, id, &owner, &mut path, &mut aliases)
                }
                ItemBody::Variable { ty } => self.hoist_ty(ty, id, &owner, &mut path, &mut aliases),
                ItemBody::Constant { ty: Some(ty), .. } => {
                    self.hoist_ty(ty, id, &owner, &mut path, &mut aliases)
                }
                ItemBody::Constant { ty: None, .. } | ItemBody::Enum { .. } => {}
                ItemBody::Class(class) => {
                    for member in class.members.iter_mut().flatten() {
                        match member {
                            ClassItem::Field(field) => {
                                path.push(field.name.clone());
                                self.hoist_ty(&mut field.ty, id, &owner, &mut path, &mut aliases);
                                path.pop();
                            }
                            ClassItem::Method(method) => {
                                path.push(method.name.clone());
                                self.hoist_in_signature(
                                    &mut method.signature,
                                    id,
                                    &owner,
                                    &mut path,
                                    &mut aliases,
                                );
                                path.pop();
                            }
                            ClassItem::Constructor(params) => {
                                for (i, param) in params.iter_mut().enumerate() {
                                    path.push(param.name.clone().unwrap_or_else(|| format!("arg{}", i)));
                                    self.hoist_ty(&mut param.ty, id, &owner, &mut path, &mut aliases);
                                    path.pop();
                                }
                            }
                        }
                    }
                }
            }

            self.items[idx].body = body;
        }
    }

    fn hoist_in_signature(
        &mut self,
        signature: &mut Signature,
        parent: ItemId,
        owner: &str,
        path: &mut Vec<String>,
        aliases: &mut HashMap<String, ItemId>,
    ) {
        self.hoist_ty(&mut signature.return_type, parent, owner, path, aliases);
        for (i, param) in signature.params.iter_mut().enumerate() {
            path.push(param.name.clone().unwrap_or_else(|| format!("arg{}", i)));
            self.hoist_ty(&mut param.ty, parent, owner, path, aliases);
            path.pop();
        }
    }

    fn hoist_ty(
        &mut self,
        ty: &mut Ty,
        parent: ItemId,
        owner: &str,
        path: &mut Vec<String>,
        aliases: &mut HashMap<String, ItemId>,
    ) {
        match ty {
            Ty::FunctionPointer(signature) => {
                self.hoist_in_signature(signature, parent, owner, path, aliases);
                let key = signature_key(signature);
                let id = match aliases.get(&key) {
                    Some(&id) => id,
                    None => {
                        let parent_item = &self.items[parent.0];
                        let namespace = parent_item.namespace.clone();
                        let location = parent_item.location.clone();
                        let position = self.next_position(parent_item.position.0);
                        let origin = Origin::Synthesized {
                            owner: owner.to_string(),
                            path: path.clone(),
                            tag: "ft",
                        };
                        let id = self.allocate(
                            ItemKind::FnAlias,
                            None,
                            &namespace,
                            location,
                            position,
                            origin,
                            Some(parent),
                        );
                        self.items[id.0].body = ItemBody::FnAlias {
                            signature: (**signature).clone(),
                        };
                        aliases.insert(key, id);
                        id
                    }
                };
                *ty = Ty::item(id);
            }
            Ty::Pointer { pointee, .. } => self.hoist_ty(pointee, parent, owner, path, aliases),
            Ty::Reference { referent } => self.hoist_ty(referent, parent, owner, path, aliases),
            Ty::Array { element, .. } => self.hoist_ty(element, parent, owner, path, aliases),
            Ty::Template { args, .. } => {
                for arg in args {
                    if let TyArg::Type(arg_ty) = arg {
                        self.hoist_ty(arg_ty, parent, owner, path, aliases);
                    }
                }
            }
            Ty::Named { .. } | Ty::Item { .. } => {}
        }
    }
}

/// Identity of a function pointer type; parameter names do not matter.
fn signature_key(signature: &Signature) -> String {
    let mut unnamed = signature.clone();
    for param in &mut unnamed.params {
        param.name = None;
    }
    format!("{:?}", unnamed)
}

fn aggregate_kind(kind: &DeclKind) -> ItemKind {
    match kind {
        DeclKind::Union(_) => ItemKind::Union,
        _ => ItemKind::Struct,
    }
}

fn is_tag_declaration(decl: &Declaration) -> bool {
    matches!(
        decl.kind,
        DeclKind::Struct(_) | DeclKind::Union(_) | DeclKind::Enum(_) | DeclKind::Class(_)
    )
}
