use super::helpers::{RenderContext, normalize_spaces};
use crate::naming::escape_param;
use crate::unit::{ItemId, Param, Quals, Signature, TemplateRef, Ty, TyArg};
use pxd_ir::{ArraySize, ArrayType, CType, Expression, NamedType, PointerType, Qualifier};

/* `const `/`volatile ` prefix, always in front of the base type */
fn quals_prefix(quals: Quals) -> String {
  let mut out = String::new();
  if quals.is_const {
    out.push_str("const ");
  }
  if quals.is_volatile {
    out.push_str("volatile ");
  }
  out
}

/* Wrap a pointer declarator before an array or parameter suffix binds to it */
fn parenthesize(declarator: &str) -> String {
  format!("({})", declarator.replace("* ", "*").replace("& ", "&"))
}

fn is_indirect(declarator: &str) -> bool {
  declarator.starts_with('*') || declarator.starts_with('&')
}

/* Prefix a declarator with `*`/`&`; a space separates the marks from an identifier */
fn prefix_declarator(mark: &str, declarator: &str) -> String {
  if declarator.is_empty() {
    mark.to_string()
  } else if is_indirect(declarator) {
    format!("{}{}", mark, declarator)
  } else {
    format!("{} {}", mark, declarator)
  }
}

impl RenderContext<'_> {
  /* Identifier of an item; an item outside the name table keeps its C name */
  pub fn item_ident(&self, id: ItemId) -> String {
    let ident = self.names.ident(id);
    if !ident.is_empty() {
      return ident.to_string();
    }
    self.unit.item(id).name.clone().unwrap_or_default()
  }

  /* Spelling of a type with no declarator: `const int*`, `Vector[int]` */
  pub fn render_type(&mut self, ty: &Ty) -> String {
    self.declare(ty, "")
  }

  /* Full declaration of `name` with type `ty`: `int m[2][3]`, `int (*cb)(int)` */
  pub fn declare(&mut self, ty: &Ty, name: &str) -> String {
    match ty {
      Ty::Pointer { pointee, is_const } => {
        let mark = if *is_const { "* const" } else { "*" };
        let declarator = prefix_declarator(mark, name);
        self.declare(pointee, &declarator)
      }
      Ty::Reference { referent } => {
        let declarator = prefix_declarator("&", name);
        self.declare(referent, &declarator)
      }
      Ty::Array { element, size } => {
        let name = if is_indirect(name) { parenthesize(name) } else { name.to_string() };
        let size = match size {
          Some(expr) => self.render_expr(expr),
          None => String::new(),
        };
        self.declare(element, &format!("{}[{}]", name, size))
      }
      Ty::FunctionPointer(signature) => {
        let name = if is_indirect(name) { name.replace("* ", "*") } else { name.to_string() };
        let declarator = format!("(*{})({})", name, self.render_params(signature));
        self.declare(&signature.return_type, &declarator)
      }
      Ty::Named { .. } | Ty::Item { .. } | Ty::Template { .. } => {
        let base = self.base_spelling(ty);
        if name.is_empty() {
          base
        } else if is_indirect(name) {
          format!("{}{}", base, name)
        } else {
          format!("{} {}", base, name)
        }
      }
    }
  }

  fn base_spelling(&mut self, ty: &Ty) -> String {
    match ty {
      Ty::Named { name, quals, .. } => format!("{}{}", quals_prefix(*quals), normalize_spaces(name)),
      Ty::Item { id, quals } => format!("{}{}", quals_prefix(*quals), self.item_ident(*id)),
      Ty::Template {
        template,
        args,
        specialization,
        quals,
      } => {
        let specialized = specialization.map(|id| self.item_ident(id)).filter(|ident| !ident.is_empty());
        let spelling = match specialized {
          Some(ident) => ident,
          None => {
            let name = match template {
              TemplateRef::Named { name, .. } => normalize_spaces(name),
              TemplateRef::Item(id) => self.item_ident(*id),
            };
            let args: Vec<String> = args
              .iter()
              .map(|arg| match arg {
                TyArg::Type(arg_ty) => self.render_type(arg_ty),
                TyArg::Value(value) => value.clone(),
              })
              .collect();
            format!("{}[{}]", name, args.join(", "))
          }
        };
        format!("{}{}", quals_prefix(*quals), spelling)
      }
      _ => self.render_type(ty),
    }
  }

  /* Parameter list without parentheses; names are escaped, variadic adds `...` */
  pub fn render_params(&mut self, signature: &Signature) -> String {
    let mut rendered: Vec<String> = signature
      .params
      .iter()
      .map(|param| self.render_param(param))
      .collect();
    if signature.variadic {
      rendered.push("...".to_string());
    }
    rendered.join(", ")
  }

  pub fn render_param(&mut self, param: &Param) -> String {
    match &param.name {
      Some(name) => self.declare(&param.ty, &escape_param(name)),
      None => self.render_type(&param.ty),
    }
  }
}

/* Parse a rendered `T name[N]` field declaration back into its name and type */
pub fn parse_field_decl(text: &str) -> Option<(String, CType)> {
  let mut rest = text.trim();
  let mut dims: Vec<String> = Vec::new();
  while rest.ends_with(']') {
    let open = rest.rfind('[')?;
    dims.push(rest[open + 1..rest.len() - 1].trim().to_string());
    rest = rest[..open].trim_end();
  }
  dims.reverse();

  let spaced = rest.replace('*', " * ");
  let mut tokens: Vec<&str> = spaced.split_whitespace().collect();
  let name = tokens.pop()?;
  if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
    return None;
  }

  let star = tokens.iter().position(|t| *t == "*").unwrap_or(tokens.len());
  let mut qualifiers = Vec::new();
  let mut words = Vec::new();
  for word in &tokens[..star] {
    match *word {
      "const" => qualifiers.push(Qualifier::Const),
      "volatile" => qualifiers.push(Qualifier::Volatile),
      w => words.push(w),
    }
  }
  if words.is_empty() {
    return None;
  }

  let mut ty = CType::Named(NamedType {
    name: words.join(" "),
    qualifiers,
  });
  let mut pointer_tokens = tokens[star..].iter().peekable();
  while let Some(token) = pointer_tokens.next() {
    if *token != "*" {
      return None;
    }
    let mut pointer_quals = Vec::new();
    while let Some(&&qualifier) = pointer_tokens.peek() {
      match qualifier {
        "const" => pointer_quals.push(Qualifier::Const),
        "volatile" => pointer_quals.push(Qualifier::Volatile),
        _ => break,
      }
      pointer_tokens.next();
    }
    ty = CType::Pointer(PointerType {
      pointee: Box::new(ty),
      qualifiers: pointer_quals,
    });
  }

  for dim in dims.iter().rev() {
    let size = if dim.is_empty() {
      ArraySize::Flexible
    } else if dim.chars().next().is_some_and(|c| c.is_ascii_digit()) {
      ArraySize::Fixed(Expression::int(dim))
    } else if dim.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
      ArraySize::Fixed(Expression::ident(dim))
    } else {
      ArraySize::Fixed(Expression::Opaque(dim.clone()))
    };
    ty = CType::Array(ArrayType {
      element: Box::new(ty),
      size,
    });
  }

  Some((name.to_string(), ty))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::naming::{NameTable, resolve};
  use crate::unit::{Unit, collect};
  use pxd_ir::{Declaration, Field, Header, Parameter, TemplateArg};

  fn lowered(decls: Vec<Declaration>) -> (Unit, NameTable) {
    let (unit, _) = collect(&Header::new("test.h", decls)).unwrap();
    let retained: Vec<ItemId> = unit.ids().collect();
    let names = resolve(&unit, &retained).unwrap();
    (unit, names)
  }

  fn field_decls(decls: Vec<Declaration>, owner: &str) -> Vec<String> {
    let (unit, names) = lowered(decls);
    let mut ctx = RenderContext::new(&unit, &names, &unit.ids().collect::<Vec<_>>());
    let item = unit
      .items
      .iter()
      .find(|item| item.name.as_deref() == Some(owner))
      .unwrap();
    match &item.body {
      crate::unit::ItemBody::Aggregate { fields: Some(fields) } => fields
        .iter()
        .map(|field| ctx.declare(&field.ty, &field.name))
        .collect(),
      _ => panic!("{} is not an aggregate", owner),
    }
  }

  #[test]
  fn test_const_placement() {
    let decls = vec![Declaration::structure(
      "S",
      vec![
        Field::new("a", CType::pointer(CType::named("const int"))),
        Field::new("b", CType::pointer(CType::named("int const"))),
        Field::new("c", CType::const_pointer(CType::named("int"))),
        Field::new("d", CType::named("volatile const unsigned   long")),
        Field::new("e", CType::pointer(CType::named("int restrict"))),
        Field::new("f", CType::pointer(CType::const_pointer(CType::named("char")))),
      ],
    )];
    assert_eq!(
      field_decls(decls, "S"),
      vec![
        "const int* a",
        "const int* b",
        "int* const c",
        "const volatile unsigned long d",
        "int* e",
        "char* const* f",
      ]
    );
  }

  #[test]
  fn test_array_declarators() {
    let decls = vec![Declaration::structure(
      "Grid",
      vec![
        Field::new(
          "m",
          CType::array(CType::array(CType::named("int"), Expression::int("3")), Expression::int("2")),
        ),
        Field::new("p", CType::pointer(CType::array(CType::named("int"), Expression::int("4")))),
        Field::new("names", CType::array(CType::pointer(CType::named("char")), Expression::int("8"))),
        Field::new("data", CType::flexible_array(CType::named("unsigned char"))),
      ],
    )];
    assert_eq!(
      field_decls(decls, "Grid"),
      vec!["int m[2][3]", "int (*p)[4]", "char* names[8]", "unsigned char data[]"]
    );
  }

  #[test]
  fn test_elaborated_and_scoped_names() {
    let decls = vec![
      Declaration::structure("Point", vec![Field::new("x", CType::named("int"))]),
      Declaration::structure(
        "Shape",
        vec![
          Field::new("origin", CType::named("struct Point")),
          Field::new("next", CType::pointer(CType::named("const struct Point"))),
          Field::new("label", CType::named("std::string")),
        ],
      ),
    ];
    assert_eq!(
      field_decls(decls, "Shape"),
      vec!["Point origin", "const Point* next", "string label"]
    );
  }

  #[test]
  fn test_function_pointer_declarator() {
    let (unit, names) = lowered(vec![]);
    let mut ctx = RenderContext::new(&unit, &names, &unit.ids().collect::<Vec<_>>());
    let signature = Signature {
      return_type: Ty::pointer(Ty::named("char")),
      params: vec![
        Param {
          name: Some("lambda".to_string()),
          ty: Ty::named("int"),
        },
        Param {
          name: None,
          ty: Ty::pointer(Ty::named("void")),
        },
      ],
      variadic: true,
    };
    let ty = Ty::FunctionPointer(Box::new(signature));
    assert_eq!(ctx.declare(&ty, "cb"), "char* (*cb)(int lambda_, void*, ...)");
    assert_eq!(ctx.declare(&Ty::pointer(ty), "table"), "char* (**table)(int lambda_, void*, ...)");
  }

  #[test]
  fn test_templates() {
    let (unit, names) = lowered(vec![
      Declaration::class(
        "Vector",
        pxd_ir::ClassDecl {
          template_params: vec![pxd_ir::TemplateParam::type_param("T")],
          members: Some(vec![]),
          ..Default::default()
        },
      ),
      Declaration::class(
        "Vector",
        pxd_ir::ClassDecl {
          specialization: Some(pxd_ir::Specialization {
            args: vec![TemplateArg::Type(CType::named("bool"))],
            partial: false,
          }),
          members: Some(vec![]),
          ..Default::default()
        },
      ),
      Declaration::function(
        "use",
        CType::named("void"),
        vec![
          Parameter::new(
            "a",
            CType::template("Vector", vec![TemplateArg::Type(CType::named("int"))]),
          ),
          Parameter::new(
            "b",
            CType::template("Vector", vec![TemplateArg::Type(CType::named("bool"))]),
          ),
          Parameter::new(
            "c",
            CType::template(
              "std::map",
              vec![
                TemplateArg::Type(CType::named("std::string")),
                TemplateArg::Type(CType::pointer(CType::named("int"))),
              ],
            ),
          ),
          Parameter::new(
            "d",
            CType::template("Array", vec![TemplateArg::Value("16".to_string())]),
          ),
        ],
      ),
    ]);
    let mut ctx = RenderContext::new(&unit, &names, &unit.ids().collect::<Vec<_>>());
    let function = unit
      .items
      .iter()
      .find(|item| item.name.as_deref() == Some("use"))
      .unwrap();
    let crate::unit::ItemBody::Function { signature } = &function.body else {
      panic!("not a function");
    };
    assert_eq!(
      ctx.render_params(signature),
      "Vector[int] a, Vector_bool b, map[string, int*] c, Array[16] d"
    );
  }

  #[test]
  fn test_rendered_fields_parse_back() {
    let originals = vec![
      Field::new("a", CType::pointer(CType::qualified("int", vec![Qualifier::Const]))),
      Field::new("b", CType::const_pointer(CType::named("char"))),
      Field::new(
        "m",
        CType::array(CType::array(CType::named("int"), Expression::int("3")), Expression::int("2")),
      ),
      Field::new("tail", CType::flexible_array(CType::named("unsigned char"))),
      Field::new("slots", CType::array(CType::pointer(CType::named("void")), Expression::ident("N"))),
      Field::new("plain", CType::named("unsigned long long")),
    ];
    let decls = vec![
      Declaration::macro_constant("N", Expression::int("4")),
      Declaration::structure("R", originals.clone()),
    ];
    let rendered = field_decls(decls, "R");
    for (text, original) in rendered.iter().zip(&originals) {
      let (name, ty) = parse_field_decl(text).unwrap();
      assert_eq!(Some(&name), original.name.as_ref(), "{}", text);
      assert_eq!(ty, original.ty, "{}", text);
    }
  }

  #[test]
  fn test_parse_rejects_non_declarations() {
    assert_eq!(parse_field_decl("int"), None);
    assert_eq!(parse_field_decl("* p"), None);
    assert_eq!(parse_field_decl("int (*cb)(int)"), None);
  }
}
