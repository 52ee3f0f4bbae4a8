use super::helpers::{EnumConstant, RenderContext};
use crate::unit::{ItemBody, ItemId, ItemKind};
use pxd_ir::{BinaryOperator, Expression, IntegerBase, IntegerLiteral, UnaryOperator};
use std::collections::HashSet;
use tracing::trace;

/* Split `0x1Fu` into ("0x1F", "u"); digit separators are dropped */
fn split_integer(raw: &str) -> (String, String) {
  let cleaned: String = raw.chars().filter(|c| *c != '\'').collect();
  let body_end = cleaned
    .char_indices()
    .rev()
    .take_while(|(_, c)| matches!(c, 'u' | 'U' | 'l' | 'L' | 'z' | 'Z'))
    .last()
    .map(|(i, _)| i)
    .unwrap_or(cleaned.len());
  let (digits, suffix) = cleaned.split_at(body_end);
  (digits.to_string(), suffix.to_string())
}

/* Integer literal in Cython notation; only a bare leading-zero octal changes */
pub fn render_integer(literal: &IntegerLiteral) -> String {
  let (digits, suffix) = split_integer(&literal.raw);
  let digits = match literal.base {
    IntegerBase::Octal if !digits.to_ascii_lowercase().starts_with("0o") => {
      format!("0o{}", digits.trim_start_matches('0'))
    }
    _ => digits,
  };
  let digits = if digits == "0o" { "0".to_string() } else { digits };
  format!("{}{}", digits, suffix)
}

pub fn integer_value(literal: &IntegerLiteral) -> Option<i128> {
  let (digits, _) = split_integer(&literal.raw);
  let lower = digits.to_ascii_lowercase();
  match literal.base {
    IntegerBase::Hex => i128::from_str_radix(lower.strip_prefix("0x")?, 16).ok(),
    IntegerBase::Binary => i128::from_str_radix(lower.strip_prefix("0b")?, 2).ok(),
    IntegerBase::Octal => {
      let body = lower.strip_prefix("0o").unwrap_or(&lower);
      let body = body.trim_start_matches('0');
      if body.is_empty() { Some(0) } else { i128::from_str_radix(body, 8).ok() }
    }
    IntegerBase::Decimal => lower.parse::<i128>().ok(),
  }
}

/* Code point of a character literal: `'A'` -> 65, `'\n'` -> 10, `L'\x41'` -> 65 */
pub fn char_code(raw: &str) -> Option<u32> {
  let start = raw.find('\'')?;
  let end = raw.rfind('\'')?;
  if end <= start {
    return None;
  }
  let body = &raw[start + 1..end];
  let mut chars = body.chars();
  let first = chars.next()?;
  if first != '\\' {
    return if chars.next().is_none() { Some(first as u32) } else { None };
  }

  let escape = chars.next()?;
  let rest: String = chars.collect();
  let simple = match escape {
    'n' => Some(10),
    't' => Some(9),
    'r' => Some(13),
    'a' => Some(7),
    'b' => Some(8),
    'f' => Some(12),
    'v' => Some(11),
    '\\' => Some(92),
    '\'' => Some(39),
    '"' => Some(34),
    '?' => Some(63),
    _ => None,
  };
  if let Some(code) = simple {
    return if rest.is_empty() { Some(code) } else { None };
  }
  match escape {
    'x' => u32::from_str_radix(&rest, 16).ok(),
    'u' | 'U' => u32::from_str_radix(&rest, 16).ok(),
    '0'..='7' => u32::from_str_radix(&format!("{}{}", escape, rest), 8).ok(),
    _ => None,
  }
}

fn binary_symbol(op: BinaryOperator) -> &'static str {
  match op {
    BinaryOperator::Add => "+",
    BinaryOperator::Sub => "-",
    BinaryOperator::Mul => "*",
    BinaryOperator::Div => "/",
    BinaryOperator::Rem => "%",
    BinaryOperator::Shl => "<<",
    BinaryOperator::Shr => ">>",
    BinaryOperator::BitAnd => "&",
    BinaryOperator::BitOr => "|",
    BinaryOperator::BitXor => "^",
    BinaryOperator::LogicalAnd => "and",
    BinaryOperator::LogicalOr => "or",
    BinaryOperator::Eq => "==",
    BinaryOperator::Ne => "!=",
    BinaryOperator::Lt => "<",
    BinaryOperator::Gt => ">",
    BinaryOperator::Le => "<=",
    BinaryOperator::Ge => ">=",
  }
}

fn is_literal(expr: &Expression) -> bool {
  matches!(
    expr,
    Expression::IntegerLiteral(_)
      | Expression::FloatLiteral(_)
      | Expression::StringLiteral(_)
      | Expression::CharLiteral(_)
  )
}

/* Literal arithmetic with checked i128 operations */
fn evaluate_binary(op: BinaryOperator, l: i128, r: i128) -> Option<i128> {
  match op {
    BinaryOperator::Add => l.checked_add(r),
    BinaryOperator::Sub => l.checked_sub(r),
    BinaryOperator::Mul => l.checked_mul(r),
    BinaryOperator::Div => l.checked_div(r),
    BinaryOperator::Rem => l.checked_rem(r),
    BinaryOperator::Shl => l.checked_shl(u32::try_from(r).ok()?),
    BinaryOperator::Shr => l.checked_shr(u32::try_from(r).ok()?),
    BinaryOperator::BitAnd => Some(l & r),
    BinaryOperator::BitOr => Some(l | r),
    BinaryOperator::BitXor => Some(l ^ r),
    BinaryOperator::LogicalAnd => Some(((l != 0) && (r != 0)) as i128),
    BinaryOperator::LogicalOr => Some(((l != 0) || (r != 0)) as i128),
    BinaryOperator::Eq => Some((l == r) as i128),
    BinaryOperator::Ne => Some((l != r) as i128),
    BinaryOperator::Lt => Some((l < r) as i128),
    BinaryOperator::Gt => Some((l > r) as i128),
    BinaryOperator::Le => Some((l <= r) as i128),
    BinaryOperator::Ge => Some((l >= r) as i128),
  }
}

impl RenderContext<'_> {
  /* Render an expression; every non-literal operand is parenthesized, the top level is not */
  pub fn render_expr(&mut self, expr: &Expression) -> String {
    match expr {
      Expression::IntegerLiteral(literal) => render_integer(literal),
      Expression::FloatLiteral(raw) => raw.clone(),
      Expression::StringLiteral(raw) => raw.clone(),
      Expression::CharLiteral(raw) => match char_code(raw) {
        Some(code) => code.to_string(),
        None => {
          self.unresolved(format!("character literal {} could not be decoded", raw));
          raw.clone()
        }
      },
      Expression::Identifier(name) => {
        if let Some(constant) = self.constants.get(name) {
          return constant.text.clone();
        }
        if self.unit.constant_named(name).is_none() {
          self.unresolved(format!("'{}' is not a known constant", name));
        }
        name.clone()
      }
      Expression::BinaryOp(binary) => {
        let left = self.render_operand(&binary.left);
        let right = self.render_operand(&binary.right);
        format!("{} {} {}", left, binary_symbol(binary.op), right)
      }
      Expression::UnaryOp(unary) => {
        let operand = self.render_operand(&unary.operand);
        match unary.op {
          UnaryOperator::Neg => format!("-{}", operand),
          UnaryOperator::Plus => format!("+{}", operand),
          UnaryOperator::BitNot => format!("~{}", operand),
          UnaryOperator::LogicalNot => format!("not {}", operand),
        }
      }
      Expression::Opaque(text) => {
        self.unresolved(format!("expression '{}' passed through verbatim", text));
        text.clone()
      }
    }
  }

  fn render_operand(&mut self, expr: &Expression) -> String {
    let text = self.render_expr(expr);
    if is_literal(expr) { text } else { format!("({})", text) }
  }

  /* Integer value of an expression made of literals and resolved enum constants */
  pub fn evaluate(&self, expr: &Expression) -> Option<i128> {
    match expr {
      Expression::IntegerLiteral(literal) => integer_value(literal),
      Expression::CharLiteral(raw) => char_code(raw).map(i128::from),
      Expression::Identifier(name) => self.constants.get(name)?.value,
      Expression::BinaryOp(binary) => {
        let left = self.evaluate(&binary.left)?;
        let right = self.evaluate(&binary.right)?;
        evaluate_binary(binary.op, left, right)
      }
      Expression::UnaryOp(unary) => {
        let value = self.evaluate(&unary.operand)?;
        match unary.op {
          UnaryOperator::Neg => value.checked_neg(),
          UnaryOperator::Plus => Some(value),
          UnaryOperator::BitNot => Some(!value),
          UnaryOperator::LogicalNot => Some((value == 0) as i128),
        }
      }
      Expression::FloatLiteral(_) | Expression::StringLiteral(_) | Expression::Opaque(_) => None,
    }
  }

  /* Resolve every enum constant of the unit, in declaration order */
  pub(super) fn resolve_enum_constants(&mut self, retained: &[ItemId]) {
    let unit = self.unit;
    let mut enums: Vec<_> = retained
      .iter()
      .map(|&id| unit.item(id))
      .filter(|item| item.kind == ItemKind::Enum)
      .collect();
    enums.sort_by_key(|item| item.position);

    for item in enums {
      let ItemBody::Enum { values } = &item.body else { continue };
      self.set_current(super::helpers::describe_for_warning(item));
      let mut previous: Option<EnumConstant> = None;

      for value in values {
        let constant = match (&value.value, &previous) {
          (Some(expr), _) => EnumConstant {
            text: self.render_expr(expr),
            value: self.evaluate(expr),
          },
          (None, None) => EnumConstant {
            text: "0".to_string(),
            value: Some(0),
          },
          (None, Some(prev)) => match prev.value.and_then(|v| v.checked_add(1)) {
            Some(next) => EnumConstant {
              text: next.to_string(),
              value: Some(next),
            },
            None => EnumConstant {
              text: format!("({}) + 1", prev.text),
              value: None,
            },
          },
        };
        trace!("enum constant {} = {}", value.name, constant.text);
        self.constants.insert(value.name.clone(), constant.clone());
        previous = Some(constant);
      }
    }
  }

  /* Cython type of a constant from its value: int, double or const char* */
  pub fn infer_constant_type(&mut self, expr: &Expression) -> String {
    let mut visiting = HashSet::new();
    match self.infer_type(expr, &mut visiting) {
      Some(ty) => ty,
      None => {
        self.unsupported("constant type could not be inferred; declared as int");
        "int".to_string()
      }
    }
  }

  fn infer_type(&mut self, expr: &Expression, visiting: &mut HashSet<String>) -> Option<String> {
    match expr {
      Expression::IntegerLiteral(_) | Expression::CharLiteral(_) => Some("int".to_string()),
      Expression::FloatLiteral(_) => Some("double".to_string()),
      Expression::StringLiteral(_) => Some("const char*".to_string()),
      Expression::Identifier(name) => {
        if self.constants.contains_key(name) {
          return Some("int".to_string());
        }
        let unit = self.unit;
        let id = unit.constant_named(name)?;
        if !visiting.insert(name.clone()) {
          return None;
        }
        let ItemBody::Constant { value, ty } = &unit.item(id).body else {
          return None;
        };
        let inferred = match (ty, value) {
          (Some(ty), _) => Some(self.render_type(ty)),
          (None, Some(value)) => self.infer_type(value, visiting),
          (None, None) => None,
        };
        visiting.remove(name);
        inferred
      }
      Expression::BinaryOp(binary) => {
        let left = self.infer_type(&binary.left, visiting)?;
        let right = self.infer_type(&binary.right, visiting)?;
        match binary.op {
          BinaryOperator::LogicalAnd
          | BinaryOperator::LogicalOr
          | BinaryOperator::Eq
          | BinaryOperator::Ne
          | BinaryOperator::Lt
          | BinaryOperator::Gt
          | BinaryOperator::Le
          | BinaryOperator::Ge => Some("int".to_string()),
          _ if left == "const char*" || right == "const char*" => None,
          _ if left == "double" || right == "double" => Some("double".to_string()),
          _ => Some("int".to_string()),
        }
      }
      Expression::UnaryOp(unary) => {
        let operand = self.infer_type(&unary.operand, visiting)?;
        match unary.op {
          UnaryOperator::LogicalNot => Some("int".to_string()),
          _ if operand == "const char*" => None,
          _ => Some(operand),
        }
      }
      Expression::Opaque(_) => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::errors::WarningKind;
  use crate::naming::NameTable;
  use crate::unit::collect;
  use pxd_ir::{Declaration, EnumValue, Header};

  fn with_context<T>(decls: Vec<Declaration>, f: impl FnOnce(&mut RenderContext) -> T) -> T {
    let (unit, _) = collect(&Header::new("test.h", decls)).unwrap();
    let names = NameTable::default();
    let mut ctx = RenderContext::new(&unit, &names, &unit.ids().collect::<Vec<_>>());
    f(&mut ctx)
  }

  #[test]
  fn test_integer_notation_is_preserved() {
    let render = |raw: &str| match Expression::int(raw) {
      Expression::IntegerLiteral(literal) => render_integer(&literal),
      _ => unreachable!(),
    };
    assert_eq!(render("42"), "42");
    assert_eq!(render("0xFFu"), "0xFFu");
    assert_eq!(render("0XabUL"), "0XabUL");
    assert_eq!(render("017"), "0o17");
    assert_eq!(render("0b1010"), "0b1010");
    assert_eq!(render("1'000'000"), "1000000");
    assert_eq!(render("100ULL"), "100ULL");
    assert_eq!(render("0"), "0");
  }

  #[test]
  fn test_integer_values() {
    let value = |raw: &str| match Expression::int(raw) {
      Expression::IntegerLiteral(literal) => integer_value(&literal),
      _ => unreachable!(),
    };
    assert_eq!(value("0x1F"), Some(31));
    assert_eq!(value("017"), Some(15));
    assert_eq!(value("0b101"), Some(5));
    assert_eq!(value("10u"), Some(10));
  }

  #[test]
  fn test_char_codes() {
    assert_eq!(char_code("'A'"), Some(65));
    assert_eq!(char_code("'\\n'"), Some(10));
    assert_eq!(char_code("'\\0'"), Some(0));
    assert_eq!(char_code("'\\x41'"), Some(65));
    assert_eq!(char_code("'\\101'"), Some(65));
    assert_eq!(char_code("L'z'"), Some(122));
    assert_eq!(char_code("'ab'"), None);
  }

  #[test]
  fn test_enum_auto_increment() {
    let decls = vec![Declaration::enumeration(
      Some("Codes"),
      vec![
        EnumValue::new("C1", Some(Expression::int("10"))),
        EnumValue::new("C2", Some(Expression::int("20"))),
        EnumValue::new("C3", None),
      ],
    )];
    with_context(decls, |ctx| {
      assert_eq!(ctx.constants["C3"].value, Some(21));
      assert_eq!(ctx.constants["C3"].text, "21");
    });
  }

  #[test]
  fn test_enum_references_keep_symbolic_text() {
    let decls = vec![Declaration::enumeration(
      Some("E"),
      vec![
        EnumValue::new("A", Some(Expression::int("1"))),
        EnumValue::new(
          "B",
          Some(Expression::binary(BinaryOperator::Add, Expression::ident("A"), Expression::int("1"))),
        ),
        EnumValue::new("C", None),
      ],
    )];
    with_context(decls, |ctx| {
      assert_eq!(ctx.constants["B"].text, "(1) + 1");
      assert_eq!(ctx.constants["B"].value, Some(2));
      assert_eq!(ctx.constants["C"].text, "3");
      assert_eq!(ctx.render_expr(&Expression::ident("B")), "(1) + 1");
    });
  }

  #[test]
  fn test_symbolic_auto_increment() {
    let decls = vec![Declaration::enumeration(
      Some("Flags"),
      vec![
        EnumValue::new("BASE", Some(Expression::ident("EXTERNAL_BASE"))),
        EnumValue::new("NEXT", None),
      ],
    )];
    with_context(decls, |ctx| {
      assert_eq!(ctx.constants["NEXT"].text, "(EXTERNAL_BASE) + 1");
      assert_eq!(ctx.constants["NEXT"].value, None);
      assert_eq!(ctx.warning_count(WarningKind::UnresolvedExpression), 1);
    });
  }

  #[test]
  fn test_operators_and_parentheses() {
    with_context(vec![Declaration::macro_constant("LIMIT", Expression::int("8"))], |ctx| {
      let expr = Expression::binary(
        BinaryOperator::Mul,
        Expression::binary(BinaryOperator::Add, Expression::ident("LIMIT"), Expression::int("2")),
        Expression::unary(UnaryOperator::Neg, Expression::int("1")),
      );
      assert_eq!(ctx.render_expr(&expr), "((LIMIT) + 2) * (-1)");

      let logical = Expression::binary(
        BinaryOperator::LogicalAnd,
        Expression::int("1"),
        Expression::unary(UnaryOperator::LogicalNot, Expression::int("0")),
      );
      assert_eq!(ctx.render_expr(&logical), "1 and (not 0)");
      assert_eq!(ctx.render_expr(&Expression::CharLiteral("'A'".to_string())), "65");
      assert!(ctx.warnings.is_empty());
    });
  }

  #[test]
  fn test_checked_arithmetic() {
    with_context(vec![], |ctx| {
      let overflow = Expression::binary(
        BinaryOperator::Shl,
        Expression::int("1"),
        Expression::int("200"),
      );
      assert_eq!(ctx.evaluate(&overflow), None);
      let div_zero = Expression::binary(BinaryOperator::Div, Expression::int("1"), Expression::int("0"));
      assert_eq!(ctx.evaluate(&div_zero), None);
      let shift = Expression::binary(BinaryOperator::Shl, Expression::int("1"), Expression::int("4"));
      assert_eq!(ctx.evaluate(&shift), Some(16));
    });
  }

  #[test]
  fn test_macro_type_inference() {
    let decls = vec![
      Declaration::macro_constant("SIZE", Expression::int("100")),
      Declaration::macro_constant("MASK", Expression::int("0xFF")),
      Declaration::macro_constant("PI", Expression::FloatLiteral("3.14".to_string())),
      Declaration::macro_constant("NAME", Expression::StringLiteral("\"x\"".to_string())),
      Declaration::macro_constant("DOUBLE_SIZE", Expression::binary(
        BinaryOperator::Mul,
        Expression::ident("SIZE"),
        Expression::int("2"),
      )),
      Declaration::macro_constant("TAU", Expression::binary(
        BinaryOperator::Mul,
        Expression::ident("PI"),
        Expression::int("2"),
      )),
    ];
    with_context(decls, |ctx| {
      assert_eq!(ctx.infer_constant_type(&Expression::int("100")), "int");
      assert_eq!(ctx.infer_constant_type(&Expression::int("0xFF")), "int");
      assert_eq!(ctx.infer_constant_type(&Expression::FloatLiteral("3.14".to_string())), "double");
      assert_eq!(
        ctx.infer_constant_type(&Expression::StringLiteral("\"x\"".to_string())),
        "const char*"
      );
      assert_eq!(ctx.infer_constant_type(&Expression::ident("DOUBLE_SIZE")), "int");
      assert_eq!(ctx.infer_constant_type(&Expression::ident("TAU")), "double");
      let squared = Expression::binary(BinaryOperator::Mul, Expression::ident("SIZE"), Expression::ident("SIZE"));
      assert_eq!(ctx.infer_constant_type(&squared), "int");
      assert!(ctx.warnings.is_empty());

      assert_eq!(ctx.infer_constant_type(&Expression::ident("MYSTERY")), "int");
      assert_eq!(ctx.warning_count(WarningKind::UnsupportedConstruct), 1);
    });
  }
}
