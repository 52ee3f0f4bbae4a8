use super::helpers::{INDENT, RenderContext, note_lines};
use crate::naming::{MethodName, escape_keyword, method_name};
use crate::unit::{ClassBody, ClassItem, Item, ItemBody, ItemId, ItemKind, Member, MethodDef, Origin, Ty};
use pxd_ir::TemplateParamKind;
use tracing::trace;

/* Declared name of an item: `ident` or `ident "cname"` */
fn declared_name(ctx: &RenderContext, item: &Item) -> String {
  match ctx.names.get(item.id) {
    Some(resolved) => resolved.declaration(),
    None => ctx.item_ident(item.id),
  }
}

/* Keyword opening an aggregate declaration; typedef-named aggregates use ctypedef */
fn aggregate_keyword(item: &Item) -> &'static str {
  match (item.kind, &item.origin) {
    (ItemKind::Struct, Origin::TypedefNamed) => "ctypedef struct",
    (ItemKind::Union, Origin::TypedefNamed) => "ctypedef union",
    (ItemKind::Union, _) => "cdef union",
    (ItemKind::Class, _) => "cdef cppclass",
    _ => "cdef struct",
  }
}

/* Body lines, or `pass` when there are none */
fn body_or_pass(lines: Vec<String>) -> Vec<String> {
  if lines.is_empty() {
    vec![format!("{}pass", INDENT)]
  } else {
    lines.into_iter().map(|line| format!("{}{}", INDENT, line)).collect()
  }
}

/* Emit one field; bit widths have no Cython form and are dropped */
fn emit_field(ctx: &mut RenderContext, field: &Member) -> String {
  let name = escape_keyword(&field.name).declaration();
  if field.bit_width.is_some() {
    trace!("dropping bit width of field {}", field.name);
  }
  ctx.declare(&field.ty, &name)
}

fn emit_aggregate(ctx: &mut RenderContext, item: &Item, fields: &Option<Vec<Member>>) -> Vec<String> {
  let header = format!("{} {}", aggregate_keyword(item), declared_name(ctx, item));
  let Some(fields) = fields else {
    return vec![header];
  };
  let mut lines = vec![format!("{}:", header)];
  let body = fields.iter().map(|field| emit_field(ctx, field)).collect();
  lines.extend(body_or_pass(body));
  lines
}

fn emit_enum(ctx: &mut RenderContext, item: &Item, values: &[pxd_ir::EnumValue]) -> Vec<String> {
  let header = match (&item.origin, &item.name) {
    (Origin::TypedefNamed, _) => format!("ctypedef enum {}:", declared_name(ctx, item)),
    (Origin::Declared, None) => "cpdef enum:".to_string(),
    _ => format!("cpdef enum {}:", declared_name(ctx, item)),
  };

  let body = values
    .iter()
    .map(|value| {
      let name = escape_keyword(&value.name).declaration();
      match ctx.constants.get(&value.name) {
        Some(constant) => format!("{} = {}", name, constant.text),
        None => name,
      }
    })
    .collect();

  let mut lines = vec![header];
  lines.extend(body_or_pass(body));
  lines
}

fn emit_constant(
  ctx: &mut RenderContext,
  item: &Item,
  value: &Option<pxd_ir::Expression>,
  ty: &Option<Ty>,
) -> Vec<String> {
  let name = declared_name(ctx, item);
  let line = match (ty, value) {
    (Some(ty), _) => ctx.declare(ty, &name),
    (None, Some(value)) => format!("{} {}", ctx.infer_constant_type(value), name),
    (None, None) => {
      ctx.unsupported("constant without a value or type; declared as int");
      format!("int {}", name)
    }
  };
  vec![line]
}

/* Template parameter list `[T, U]`; non-type and variadic parameters are dropped */
fn template_params(ctx: &mut RenderContext, class: &ClassBody) -> String {
  let mut kept = Vec::new();
  for param in &class.template_params {
    match &param.kind {
      TemplateParamKind::Type => kept.push(param.name.clone()),
      TemplateParamKind::NonType(_) => {
        ctx.unsupported(format!("non-type template parameter {} dropped", param.name));
      }
      TemplateParamKind::Variadic => {
        ctx.unsupported(format!("variadic template parameter {} dropped", param.name));
      }
    }
  }
  if kept.is_empty() { String::new() } else { format!("[{}]", kept.join(", ")) }
}

fn emit_method(ctx: &mut RenderContext, method: &MethodDef) -> Vec<String> {
  let spelling = match method_name(&method.name) {
    MethodName::Plain(resolved) | MethodName::Renamed(resolved) => resolved.declaration(),
    MethodName::Operator(spelling) => spelling,
    MethodName::Rejected => {
      ctx.unsupported("overloaded operator with no Cython form skipped");
      return Vec::new();
    }
  };

  let params = ctx.render_params(&method.signature);
  let mut line = ctx.declare(&method.signature.return_type, &format!("{}({})", spelling, params));
  if method.is_const {
    line.push_str(" const");
  }

  let mut lines = Vec::new();
  if method.is_static {
    lines.push("@staticmethod".to_string());
  }
  lines.push(line);
  lines
}

fn emit_class(ctx: &mut RenderContext, item: &Item, class: &ClassBody) -> Vec<String> {
  let ident = ctx.item_ident(item.id);
  let name = declared_name(ctx, item);
  let params = template_params(ctx, class);
  let mut header = format!("cdef cppclass {}{}", name, params);
  if !class.bases.is_empty() {
    let bases: Vec<String> = class.bases.iter().map(|base| ctx.render_type(base)).collect();
    header.push_str(&format!("({})", bases.join(", ")));
  }

  let Some(members) = &class.members else {
    return vec![header];
  };

  let mut body = Vec::new();
  for member in members {
    match member {
      ClassItem::Field(field) => body.push(emit_field(ctx, field)),
      ClassItem::Constructor(params) => {
        let rendered: Vec<String> = params.iter().map(|param| ctx.render_param(param)).collect();
        body.push(format!("{}({})", ident, rendered.join(", ")));
      }
      ClassItem::Method(method) => body.extend(emit_method(ctx, method)),
    }
  }

  let mut lines = vec![format!("{}:", header)];
  lines.extend(body_or_pass(body));
  lines
}

/// Lines of one declaration, relative to the extern block. Limitations are
/// prepended as `# NOTE:` lines when `annotate` is set.
pub fn emit_declaration(ctx: &mut RenderContext, id: ItemId, annotate: bool) -> Vec<String> {
  let unit = ctx.unit;
  let item = unit.item(id);
  ctx.begin(id);

  let lines = match &item.body {
    ItemBody::Aggregate { fields } => emit_aggregate(ctx, item, fields),
    ItemBody::Enum { values } => emit_enum(ctx, item, values),
    ItemBody::Typedef { target } => {
      let name = declared_name(ctx, item);
      vec![format!("ctypedef {}", ctx.declare(target, &name))]
    }
    ItemBody::FnAlias { signature } => {
      let name = declared_name(ctx, item);
      let alias = Ty::FunctionPointer(Box::new(signature.clone()));
      vec![format!("ctypedef {}", ctx.declare(&alias, &name))]
    }
    ItemBody::Function { signature } => {
      let name = declared_name(ctx, item);
      let params = ctx.render_params(signature);
      vec![ctx.declare(&signature.return_type, &format!("{}({})", name, params))]
    }
    ItemBody::Variable { ty } => {
      let name = declared_name(ctx, item);
      vec![ctx.declare(ty, &name)]
    }
    ItemBody::Constant { value, ty } => emit_constant(ctx, item, value, ty),
    ItemBody::Class(class) => emit_class(ctx, item, class),
  };

  let rendered_notes = ctx.take_notes();
  if !annotate {
    return lines;
  }
  let mut notes = item.notes.clone();
  notes.extend(rendered_notes);
  let mut out = note_lines(&notes);
  out.extend(lines);
  out
}

/// Bare declaration that lets earlier declarations point at `id`.
pub fn emit_forward_declaration(ctx: &RenderContext, id: ItemId) -> String {
  let item = ctx.unit.item(id);
  match &item.body {
    ItemBody::Class(class) => {
      let params: Vec<&str> = class
        .template_params
        .iter()
        .filter(|param| param.kind == TemplateParamKind::Type)
        .map(|param| param.name.as_str())
        .collect();
      let params = if params.is_empty() { String::new() } else { format!("[{}]", params.join(", ")) };
      format!("cdef cppclass {}{}", declared_name(ctx, item), params)
    }
    _ => format!("{} {}", aggregate_keyword(item), declared_name(ctx, item)),
  }
}
