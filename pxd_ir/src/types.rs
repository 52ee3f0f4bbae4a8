use crate::decls::Declaration;
use crate::expr::Expression;
use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Qualifier {
    Const,
    Volatile,
    Restrict,
    Atomic,
}

/// A type referenced by name: a builtin (`unsigned int`), a declaration in the
/// same header (`struct Point`, `Point`) or an external name (`uint32_t`).
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct NamedType {
    pub name: String,
    #[serde(default)]
    pub qualifiers: Vec<Qualifier>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct PointerType {
    pub pointee: Box<CType>,
    /* Qualifiers of the pointer itself (`int * const p`) */
    #[serde(default)]
    pub qualifiers: Vec<Qualifier>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ReferenceType {
    pub referent: Box<CType>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub enum ArraySize {
    Fixed(Expression),
    /// Trailing `[]` member.
    Flexible,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ArrayType {
    pub element: Box<CType>,
    pub size: ArraySize,
}

/// Pointer to a function: `ret (*)(params)`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct FunctionPointerType {
    pub return_type: Box<CType>,
    #[serde(default)]
    pub params: Vec<Parameter>,
    #[serde(default)]
    pub variadic: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateArg {
    Type(CType),
    /// Non-type argument spelled as source text (`16`, `true`).
    Value(String),
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct TemplateInstantiation {
    pub template: String,
    pub args: Vec<TemplateArg>,
    #[serde(default)]
    pub qualifiers: Vec<Qualifier>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub enum CType {
    Named(NamedType),
    Pointer(PointerType),
    Reference(ReferenceType),
    Array(ArrayType),
    FunctionPointer(FunctionPointerType),
    TemplateInstantiation(TemplateInstantiation),
    /// Aggregate or enum declared in place, e.g. `struct { int a; } field;`.
    Inline(Box<Declaration>),
}

impl CType {
    pub fn named(name: &str) -> Self {
        CType::Named(NamedType {
            name: name.to_string(),
            qualifiers: Vec::new(),
        })
    }

    pub fn qualified(name: &str, qualifiers: Vec<Qualifier>) -> Self {
        CType::Named(NamedType {
            name: name.to_string(),
            qualifiers,
        })
    }

    pub fn pointer(pointee: CType) -> Self {
        CType::Pointer(PointerType {
            pointee: Box::new(pointee),
            qualifiers: Vec::new(),
        })
    }

    pub fn const_pointer(pointee: CType) -> Self {
        CType::Pointer(PointerType {
            pointee: Box::new(pointee),
            qualifiers: vec![Qualifier::Const],
        })
    }

    pub fn reference(referent: CType) -> Self {
        CType::Reference(ReferenceType {
            referent: Box::new(referent),
        })
    }

    pub fn array(element: CType, size: Expression) -> Self {
        CType::Array(ArrayType {
            element: Box::new(element),
            size: ArraySize::Fixed(size),
        })
    }

    pub fn flexible_array(element: CType) -> Self {
        CType::Array(ArrayType {
            element: Box::new(element),
            size: ArraySize::Flexible,
        })
    }

    pub fn function_pointer(return_type: CType, params: Vec<Parameter>, variadic: bool) -> Self {
        CType::FunctionPointer(FunctionPointerType {
            return_type: Box::new(return_type),
            params,
            variadic,
        })
    }

    pub fn template(template: &str, args: Vec<TemplateArg>) -> Self {
        CType::TemplateInstantiation(TemplateInstantiation {
            template: template.to_string(),
            args,
            qualifiers: Vec::new(),
        })
    }

    pub fn inline(decl: Declaration) -> Self {
        CType::Inline(Box::new(decl))
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Field {
    /* None for C11 anonymous struct/union members */
    #[serde(default)]
    pub name: Option<String>,
    pub ty: CType,
    #[serde(default)]
    pub bit_width: Option<u32>,
}

impl Field {
    pub fn new(name: &str, ty: CType) -> Self {
        Self {
            name: Some(name.to_string()),
            ty,
            bit_width: None,
        }
    }

    pub fn bitfield(name: &str, ty: CType, width: u32) -> Self {
        Self {
            name: Some(name.to_string()),
            ty,
            bit_width: Some(width),
        }
    }

    pub fn anonymous(ty: CType) -> Self {
        Self {
            name: None,
            ty,
            bit_width: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Parameter {
    #[serde(default)]
    pub name: Option<String>,
    pub ty: CType,
}

impl Parameter {
    pub fn new(name: &str, ty: CType) -> Self {
        Self {
            name: Some(name.to_string()),
            ty,
        }
    }

    pub fn unnamed(ty: CType) -> Self {
        Self { name: None, ty }
    }
}
