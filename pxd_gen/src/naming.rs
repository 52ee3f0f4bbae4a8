//! Output identifiers for every emitted entity.
//!
//! Cython needs one flat identifier per entity. Anonymous aggregates get a
//! synthetic name from their position, reserved words are escaped with a `_`
//! suffix (keeping the C spelling as a `"cname"` string), template
//! specializations are mangled, and namespaced names that clash with another
//! entity are prefixed with their namespace path.

use crate::errors::{GenError, GenResult, Stage};
use crate::unit::{Item, ItemBody, ItemId, ItemKind, Origin, Unit};
use pxd_ir::{CType, TemplateArg};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

/* Python and Cython reserved words */
const RESERVED_WORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield", "print", "exec", "cdef", "cpdef", "ctypedef", "cimport",
    "cppclass", "include", "extern", "gil", "nogil", "inline", "readonly", "public", "api",
    "DEF", "IF", "ELIF", "ELSE", "NULL", "sizeof", "typeof", "fused", "struct", "union", "enum",
];

/* Operators Cython declares under their C++ spelling */
const NATIVE_OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "%", "==", "!=", "<", ">", "<=", ">=", "[]", "!", "++", "--", "&", "|",
    "^", "~", "<<", ">>", "+=", "-=", "*=", "/=", "bool",
];

/* Operators with no Cython spelling that can still be called by a plain name */
const RENAMED_OPERATORS: &[(&str, &str)] = &[("->", "deref"), ("()", "call"), ("=", "assign")];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

/// Identifier plus the C spelling, when the two differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub ident: String,
    pub cname: Option<String>,
}

impl ResolvedName {
    pub fn plain(ident: &str) -> Self {
        Self {
            ident: ident.to_string(),
            cname: None,
        }
    }

    /// Declaration form: `ident` or `ident "cname"`.
    pub fn declaration(&self) -> String {
        match &self.cname {
            Some(cname) => format!("{} \"{}\"", self.ident, cname),
            None => self.ident.clone(),
        }
    }
}

/// Escape a declared name that collides with a reserved word.
pub fn escape_keyword(name: &str) -> ResolvedName {
    if is_reserved(name) {
        ResolvedName {
            ident: format!("{}_", name),
            cname: Some(name.to_string()),
        }
    } else {
        ResolvedName::plain(name)
    }
}

/// Parameter names are local; they are escaped without a cname.
pub fn escape_param(name: &str) -> String {
    if is_reserved(name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

/// How a C++ method name is declared in a `cppclass` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodName {
    /// Ordinary method, possibly keyword-escaped.
    Plain(ResolvedName),
    /// Operator Cython understands: `operator[]`, `operator==`, ...
    Operator(String),
    /// Operator exposed under a plain name: `deref "operator->"`.
    Renamed(ResolvedName),
    /// Operator with no Cython form.
    Rejected,
}

pub fn method_name(name: &str) -> MethodName {
    let Some(token) = operator_token(name) else {
        return MethodName::Plain(escape_keyword(name));
    };
    if NATIVE_OPERATORS.contains(&token.as_str()) {
        let spelling = if token.chars().all(|c| c.is_ascii_alphanumeric()) {
            format!("operator {}", token)
        } else {
            format!("operator{}", token)
        };
        return MethodName::Operator(spelling);
    }
    match RENAMED_OPERATORS.iter().find(|(op, _)| *op == token) {
        Some((op, ident)) => MethodName::Renamed(ResolvedName {
            ident: ident.to_string(),
            cname: Some(format!("operator{}", op)),
        }),
        None => MethodName::Rejected,
    }
}

/* `operator==` -> "==", `operator new[]` -> "new[]", `operators` -> None */
fn operator_token(name: &str) -> Option<String> {
    let rest = name.strip_prefix("operator")?;
    let first = rest.chars().next()?;
    if first.is_ascii_alphanumeric() || first == '_' {
        return None;
    }
    let token: String = rest.split_whitespace().collect::<Vec<_>>().join("");
    if token.is_empty() { None } else { Some(token) }
}

/// C++ spelling of a template argument.
pub fn cpp_spelling(ty: &CType) -> String {
    match ty {
        CType::Named(named) => named.name.split_whitespace().collect::<Vec<_>>().join(" "),
        CType::Pointer(pointer) => format!("{}*", cpp_spelling(&pointer.pointee)),
        CType::Reference(reference) => format!("{}&", cpp_spelling(&reference.referent)),
        CType::Array(array) => format!("{}[]", cpp_spelling(&array.element)),
        CType::FunctionPointer(fp) => {
            let params: Vec<String> = fp.params.iter().map(|p| cpp_spelling(&p.ty)).collect();
            format!("{} (*)({})", cpp_spelling(&fp.return_type), params.join(", "))
        }
        CType::TemplateInstantiation(inst) => {
            format!("{}<{}>", inst.template, template_args_spelling(&inst.args))
        }
        CType::Inline(decl) => decl.name.clone().unwrap_or_default(),
    }
}

fn template_args_spelling(args: &[TemplateArg]) -> String {
    args.iter()
        .map(|arg| match arg {
            TemplateArg::Type(ty) => cpp_spelling(ty),
            TemplateArg::Value(value) => value.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn sanitize(text: &str) -> String {
    let joined = text
        .replace("::", "_")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    joined
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn mangle_arg(ty: &CType) -> String {
    match ty {
        CType::Named(named) => sanitize(&named.name),
        CType::Pointer(pointer) => format!("{}_ptr", mangle_arg(&pointer.pointee)),
        CType::Reference(reference) => format!("{}_ref", mangle_arg(&reference.referent)),
        CType::Array(array) => format!("{}_arr", mangle_arg(&array.element)),
        CType::FunctionPointer(fp) => format!("{}_fn", mangle_arg(&fp.return_type)),
        CType::TemplateInstantiation(inst) => mangle_template(&inst.template, &inst.args),
        CType::Inline(decl) => sanitize(decl.name.as_deref().unwrap_or("anon")),
    }
}

/// Flat identifier for `template<args>`: `Vector<bool>` -> `Vector_bool`,
/// `Map<std::string, int*>` -> `Map_std_string_int_ptr`.
pub fn mangle_template(template: &str, args: &[TemplateArg]) -> String {
    let mut parts = vec![sanitize(template)];
    for arg in args {
        parts.push(match arg {
            TemplateArg::Type(ty) => mangle_arg(ty),
            TemplateArg::Value(value) => sanitize(value),
        });
    }
    parts.join("_")
}

/// Spelling of a specialization as written in C++: `Vector<bool>`.
pub fn template_spelling(template: &str, args: &[TemplateArg]) -> String {
    format!("{}<{}>", template, template_args_spelling(args))
}

/// Final identifiers for the items of one unit.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: HashMap<ItemId, ResolvedName>,
}

impl NameTable {
    pub fn get(&self, id: ItemId) -> Option<&ResolvedName> {
        self.names.get(&id)
    }

    /// Identifier used when referring to `id` from another declaration.
    pub fn ident(&self, id: ItemId) -> &str {
        self.names.get(&id).map(|n| n.ident.as_str()).unwrap_or("")
    }
}

/// Who produced an identifier; used to report collisions.
struct Claim {
    key: String,
    description: String,
}

struct Resolver<'a> {
    unit: &'a Unit,
    names: HashMap<ItemId, ResolvedName>,
    claimed: HashMap<String, Claim>,
}

impl Resolver<'_> {
    /// Register `ident` for an entity; `key` identifies the entity so
    /// overloads of one function do not collide with each other.
    fn claim(&mut self, ident: &str, key: &str, description: String) -> GenResult<()> {
        match self.claimed.get(ident) {
            Some(existing) if existing.key == key => Ok(()),
            Some(existing) => Err(GenError::NameCollision {
                stage: Stage::Resolving,
                identifier: ident.to_string(),
                first: existing.description.clone(),
                second: description,
            }),
            None => {
                trace!("claimed '{}' for {}", ident, description);
                self.claimed.insert(
                    ident.to_string(),
                    Claim {
                        key: key.to_string(),
                        description,
                    },
                );
                Ok(())
            }
        }
    }

    fn assign(&mut self, item: &Item, name: ResolvedName) -> GenResult<()> {
        let key = entity_key(item);
        self.claim(&name.ident, &key, item.describe())?;
        self.names.insert(item.id, name);
        Ok(())
    }
}

/* Overloaded functions share one key; everything else is keyed by id */
fn entity_key(item: &Item) -> String {
    match (item.kind, item.qualified_name()) {
        (ItemKind::Function, Some(name)) => format!("fn {}", name),
        _ => format!("item {}", item.id.0),
    }
}

fn is_specialization(item: &Item) -> bool {
    matches!(&item.body, ItemBody::Class(class) if class.specialization.is_some())
}

/// Assign identifiers to `retained` items.
pub fn resolve(unit: &Unit, retained: &[ItemId]) -> GenResult<NameTable> {
    let mut items: Vec<&Item> = retained.iter().map(|&id| unit.item(id)).collect();
    items.sort_by_key(|item| (item.position, item.id));

    let mut resolver = Resolver {
        unit,
        names: HashMap::new(),
        claimed: HashMap::new(),
    };

    let declared: Vec<&Item> = items
        .iter()
        .copied()
        .filter(|item| item.name.is_some() && !matches!(item.origin, Origin::Synthesized { .. }))
        .filter(|item| !is_specialization(item))
        .collect();

    /* Short names shared by more than one entity */
    let mut short_owners: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for item in &declared {
        if let Some(name) = &item.name {
            let key = entity_key(item);
            let owners = short_owners.entry(name.as_str()).or_default();
            if !owners.contains(&key) {
                owners.push(key);
            }
        }
    }
    for item in items.iter().filter(|item| matches!(item.body, ItemBody::Enum { .. })) {
        if let ItemBody::Enum { values } = &item.body {
            for value in values {
                let owners = short_owners.entry(value.name.as_str()).or_default();
                owners.push(format!("enum value {}", value.name));
            }
        }
    }

    for item in &declared {
        let Some(name) = &item.name else { continue };
        let shared = short_owners.get(name.as_str()).is_some_and(|o| o.len() > 1);
        let resolved = if shared && !item.namespace.is_empty() {
            let ident = format!("{}_{}", item.namespace.join("_"), name);
            debug!("namespaced {} renamed to {}", item.describe(), ident);
            ResolvedName {
                ident,
                cname: Some(name.clone()),
            }
        } else {
            escape_keyword(name)
        };
        resolver.assign(item, resolved)?;
    }

    /* Enum values live in the module namespace too */
    for item in &items {
        if let ItemBody::Enum { values } = &item.body {
            for value in values {
                let ident = escape_keyword(&value.name).ident;
                let description = format!("enum value {} of {}", value.name, item.describe());
                resolver.claim(&ident, &format!("value {}", value.name), description)?;
            }
        }
    }

    for item in items.iter().filter(|item| is_specialization(item)) {
        let (Some(name), ItemBody::Class(class)) = (&item.name, &item.body) else {
            continue;
        };
        let Some(spec) = &class.specialization else { continue };
        let resolved = ResolvedName {
            ident: mangle_template(name, &spec.args),
            cname: Some(template_spelling(name, &spec.args)),
        };
        resolver.assign(item, resolved)?;
    }

    for item in &items {
        let Origin::Synthesized { owner, path, tag } = &item.origin else {
            continue;
        };
        let mut parts = vec![String::new(), owner.clone()];
        parts.extend(path.iter().cloned());
        parts.push(tag.to_string());
        let base = sanitize(&parts.join("_"));

        let mut ident = base.clone();
        let mut suffix = 2;
        while resolver.claimed.contains_key(&ident) {
            ident = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        resolver.assign(item, ResolvedName::plain(&ident))?;
    }

    debug!("resolved {} identifiers for {}", resolver.names.len(), resolver.unit.path);
    Ok(NameTable {
        names: resolver.names,
    })
}
