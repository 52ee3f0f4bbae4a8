use crate::expr::Expression;
use crate::types::{CType, Field, Parameter, TemplateArg};
use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct SourceLocation {
    pub file: String,
    #[serde(default)]
    pub line: u32,
}

/// One translation unit as produced by a front end.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Header {
    /* Name used in the `cdef extern from` block */
    pub path: String,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

impl Header {
    pub fn new(path: &str, declarations: Vec<Declaration>) -> Self {
        Self {
            path: path.to_string(),
            declarations,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Declaration {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<SourceLocation>,
    pub kind: DeclKind,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub enum DeclKind {
    Struct(Aggregate),
    Union(Aggregate),
    Enum(EnumDecl),
    Typedef(TypedefDecl),
    Function(FunctionDecl),
    Variable(VariableDecl),
    Constant(ConstantDecl),
    Class(ClassDecl),
    Namespace(NamespaceDecl),
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Aggregate {
    /* None marks an opaque (incomplete) type */
    #[serde(default)]
    pub fields: Option<Vec<Field>>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct EnumValue {
    pub name: String,
    #[serde(default)]
    pub value: Option<Expression>,
}

impl EnumValue {
    pub fn new(name: &str, value: Option<Expression>) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct EnumDecl {
    #[serde(default)]
    pub values: Vec<EnumValue>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct TypedefDecl {
    pub target: CType,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct FunctionDecl {
    pub return_type: CType,
    #[serde(default)]
    pub params: Vec<Parameter>,
    #[serde(default)]
    pub variadic: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct VariableDecl {
    pub ty: CType,
}

/// `#define NAME value` (`is_macro`) or a `const` object with an initializer.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ConstantDecl {
    #[serde(default)]
    pub value: Option<Expression>,
    #[serde(default)]
    pub ty: Option<CType>,
    #[serde(default)]
    pub is_macro: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateParamKind {
    #[default]
    Type,
    /// `template <int N>`
    NonType(CType),
    /// `template <typename... Ts>`
    Variadic,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct TemplateParam {
    pub name: String,
    #[serde(default)]
    pub kind: TemplateParamKind,
}

impl TemplateParam {
    pub fn type_param(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: TemplateParamKind::Type,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Specialization {
    pub args: Vec<TemplateArg>,
    #[serde(default)]
    pub partial: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Method {
    /* Plain identifier or `operator<token>` */
    pub name: String,
    pub return_type: CType,
    #[serde(default)]
    pub params: Vec<Parameter>,
    #[serde(default)]
    pub variadic: bool,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub is_static: bool,
}

impl Method {
    pub fn new(name: &str, return_type: CType, params: Vec<Parameter>) -> Self {
        Self {
            name: name.to_string(),
            return_type,
            params,
            variadic: false,
            is_const: false,
            is_static: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Constructor {
    #[serde(default)]
    pub params: Vec<Parameter>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub enum ClassMember {
    Field(Field),
    Method(Method),
    Constructor(Constructor),
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ClassDecl {
    #[serde(default)]
    pub template_params: Vec<TemplateParam>,
    #[serde(default)]
    pub specialization: Option<Specialization>,
    #[serde(default)]
    pub bases: Vec<CType>,
    /* None marks a forward-declared class */
    #[serde(default)]
    pub members: Option<Vec<ClassMember>>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct NamespaceDecl {
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

impl Declaration {
    pub fn new(name: Option<&str>, kind: DeclKind) -> Self {
        Self {
            name: name.map(str::to_string),
            location: None,
            kind,
        }
    }

    pub fn at(mut self, file: &str, line: u32) -> Self {
        self.location = Some(SourceLocation {
            file: file.to_string(),
            line,
        });
        self
    }

    pub fn structure(name: &str, fields: Vec<Field>) -> Self {
        Self::new(
            Some(name),
            DeclKind::Struct(Aggregate {
                fields: Some(fields),
            }),
        )
    }

    pub fn union(name: &str, fields: Vec<Field>) -> Self {
        Self::new(
            Some(name),
            DeclKind::Union(Aggregate {
                fields: Some(fields),
            }),
        )
    }

    pub fn opaque_struct(name: &str) -> Self {
        Self::new(Some(name), DeclKind::Struct(Aggregate { fields: None }))
    }

    pub fn anonymous_struct(fields: Vec<Field>) -> Self {
        Self::new(
            None,
            DeclKind::Struct(Aggregate {
                fields: Some(fields),
            }),
        )
    }

    pub fn anonymous_union(fields: Vec<Field>) -> Self {
        Self::new(
            None,
            DeclKind::Union(Aggregate {
                fields: Some(fields),
            }),
        )
    }

    pub fn enumeration(name: Option<&str>, values: Vec<EnumValue>) -> Self {
        Self::new(name, DeclKind::Enum(EnumDecl { values }))
    }

    pub fn typedef(name: &str, target: CType) -> Self {
        Self::new(Some(name), DeclKind::Typedef(TypedefDecl { target }))
    }

    pub fn function(name: &str, return_type: CType, params: Vec<Parameter>) -> Self {
        Self::new(
            Some(name),
            DeclKind::Function(FunctionDecl {
                return_type,
                params,
                variadic: false,
            }),
        )
    }

    pub fn variadic_function(name: &str, return_type: CType, params: Vec<Parameter>) -> Self {
        Self::new(
            Some(name),
            DeclKind::Function(FunctionDecl {
                return_type,
                params,
                variadic: true,
            }),
        )
    }

    pub fn variable(name: &str, ty: CType) -> Self {
        Self::new(Some(name), DeclKind::Variable(VariableDecl { ty }))
    }

    pub fn macro_constant(name: &str, value: Expression) -> Self {
        Self::new(
            Some(name),
            DeclKind::Constant(ConstantDecl {
                value: Some(value),
                ty: None,
                is_macro: true,
            }),
        )
    }

    pub fn class(name: &str, class: ClassDecl) -> Self {
        Self::new(Some(name), DeclKind::Class(class))
    }

    pub fn namespace(name: &str, declarations: Vec<Declaration>) -> Self {
        Self::new(Some(name), DeclKind::Namespace(NamespaceDecl { declarations }))
    }

    /// Keyword used for diagnostics (`struct`, `typedef`, ...).
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            DeclKind::Struct(_) => "struct",
            DeclKind::Union(_) => "union",
            DeclKind::Enum(_) => "enum",
            DeclKind::Typedef(_) => "typedef",
            DeclKind::Function(_) => "function",
            DeclKind::Variable(_) => "variable",
            DeclKind::Constant(_) => "constant",
            DeclKind::Class(_) => "class",
            DeclKind::Namespace(_) => "namespace",
        }
    }
}
