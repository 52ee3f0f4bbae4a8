use crate::errors::{Warning, WarningKind};
use crate::naming::NameTable;
use crate::unit::{Item, ItemId, Unit};
use std::collections::HashMap;
use tracing::warn;

/* Indentation of declarations inside an extern block and of members inside a body */
pub const INDENT: &str = "    ";

/* Resolved form of an enum constant */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConstant {
  /* Text substituted wherever the constant is referenced */
  pub text: String,
  /* Integer value when every operand was a literal */
  pub value: Option<i128>,
}

/* Shared state for rendering the declarations of one unit */
pub struct RenderContext<'a> {
  pub unit: &'a Unit,
  pub names: &'a NameTable,
  pub constants: HashMap<String, EnumConstant>,
  pub warnings: Vec<Warning>,
  /* Annotations collected for the declaration being rendered */
  pub notes: Vec<String>,
  current: String,
}

impl<'a> RenderContext<'a> {
  /* Enum constants are resolved for the `retained` items only */
  pub fn new(unit: &'a Unit, names: &'a NameTable, retained: &[ItemId]) -> Self {
    let mut ctx = Self {
      unit,
      names,
      constants: HashMap::new(),
      warnings: Vec::new(),
      notes: Vec::new(),
      current: String::new(),
    };
    ctx.resolve_enum_constants(retained);
    ctx
  }

  /* Start rendering `id`; diagnostics are attributed to it */
  pub fn begin(&mut self, id: ItemId) {
    self.current = describe_for_warning(self.unit.item(id));
    self.notes.clear();
  }

  pub fn set_current(&mut self, description: String) {
    self.current = description;
  }

  /* Record a construct with no output form; it is annotated in the document */
  pub fn unsupported(&mut self, message: impl Into<String>) {
    let message = message.into();
    let warning = Warning::unsupported(&self.current, message.clone());
    warn!("{}", warning);
    self.warnings.push(warning);
    self.notes.push(message);
  }

  /* Record an expression that passes through verbatim */
  pub fn unresolved(&mut self, message: impl Into<String>) {
    let warning = Warning::unresolved(&self.current, message);
    warn!("{}", warning);
    self.warnings.push(warning);
  }

  pub fn take_notes(&mut self) -> Vec<String> {
    std::mem::take(&mut self.notes)
  }

  pub fn warning_count(&self, kind: WarningKind) -> usize {
    self.warnings.iter().filter(|w| w.kind == kind).count()
  }
}

/* Name used for an item in warnings: the C name when it has one */
pub fn describe_for_warning(item: &Item) -> String {
  match item.qualified_name() {
    Some(name) => format!("{} {}", item.kind.keyword(), name),
    None => item.describe(),
  }
}

/* Collapse runs of whitespace: `unsigned   long` -> `unsigned long` */
pub fn normalize_spaces(text: &str) -> String {
  text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/* `# NOTE:` lines for a declaration */
pub fn note_lines(notes: &[String]) -> Vec<String> {
  notes.iter().map(|note| format!("# NOTE: {}", note)).collect()
}

/* Indent every non-empty line by one level */
pub fn indent_lines(lines: &[String]) -> Vec<String> {
  lines
    .iter()
    .map(|line| if line.is_empty() { String::new() } else { format!("{}{}", INDENT, line) })
    .collect()
}
