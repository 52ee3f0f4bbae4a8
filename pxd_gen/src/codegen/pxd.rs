use crate::codegen::pxd_gen::{
  ImportTable, RenderContext, collect_imports, emit_declaration, emit_forward_declaration,
  helpers::indent_lines, import_lines,
};
use crate::config::Catalog;
use crate::dependency::OrderPlan;
use crate::errors::Warning;
use crate::naming::NameTable;
use crate::unit::Unit;
use indexmap::IndexMap;
use tracing::debug;

pub struct PxdCodeGeneratorOptions {
  /* Prepend `# NOTE:` lines to declarations with unsupported parts */
  pub annotate: bool,
}

impl Default for PxdCodeGeneratorOptions {
  fn default() -> Self {
    Self { annotate: true }
  }
}

/* Declarations of one `cdef extern from` block, each as its own lines */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternBlock {
  pub namespace: Vec<String>,
  pub declarations: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct RenderedUnit {
  pub imports: ImportTable,
  pub blocks: Vec<ExternBlock>,
  pub warnings: Vec<Warning>,
}

pub struct PxdCodeGenerator<'a> {
  options: PxdCodeGeneratorOptions,
  unit: &'a Unit,
  names: &'a NameTable,
  catalog: &'a Catalog,
}

impl<'a> PxdCodeGenerator<'a> {
  pub fn new(
    unit: &'a Unit,
    names: &'a NameTable,
    catalog: &'a Catalog,
    options: PxdCodeGeneratorOptions,
  ) -> Self {
    Self {
      options,
      unit,
      names,
      catalog,
    }
  }

  /* Render forward declarations, then every planned declaration in order; a new
  extern block opens whenever the namespace changes */
  pub fn render(&self, plan: &OrderPlan) -> RenderedUnit {
    let mut ctx = RenderContext::new(self.unit, self.names, &plan.order);

    let mut forward: IndexMap<&[String], Vec<Vec<String>>> = IndexMap::new();
    for &id in &plan.forward {
      let item = self.unit.item(id);
      debug!("forward declaring {}", item.describe());
      forward
        .entry(item.namespace.as_slice())
        .or_default()
        .push(vec![emit_forward_declaration(&ctx, id)]);
    }

    let mut blocks: Vec<ExternBlock> = forward
      .into_iter()
      .map(|(namespace, declarations)| ExternBlock {
        namespace: namespace.to_vec(),
        declarations,
      })
      .collect();

    for &id in &plan.order {
      let declaration = emit_declaration(&mut ctx, id, self.options.annotate);
      let namespace = &self.unit.item(id).namespace;
      match blocks.last_mut() {
        Some(block) if &block.namespace == namespace => block.declarations.push(declaration),
        _ => blocks.push(ExternBlock {
          namespace: namespace.clone(),
          declarations: vec![declaration],
        }),
      }
    }

    if blocks.is_empty() {
      blocks.push(ExternBlock {
        namespace: Vec::new(),
        declarations: Vec::new(),
      });
    }

    RenderedUnit {
      imports: collect_imports(self.unit, &plan.order, self.catalog),
      blocks,
      warnings: ctx.warnings,
    }
  }

  /* Assemble the document: imports, then the extern blocks in order */
  pub fn emit_document(&self, rendered: &RenderedUnit) -> String {
    let mut lines = import_lines(&rendered.imports);
    if !lines.is_empty() {
      lines.push(String::new());
    }

    for block in &rendered.blocks {
      if block.namespace.is_empty() {
        lines.push(format!("cdef extern from \"{}\":", self.unit.path));
      } else {
        lines.push(format!(
          "cdef extern from \"{}\" namespace \"{}\":",
          self.unit.path,
          block.namespace.join("::")
        ));
      }
      lines.push(String::new());

      if block.declarations.is_empty() {
        lines.push("    pass".to_string());
        lines.push(String::new());
      }
      for declaration in &block.declarations {
        lines.extend(indent_lines(declaration));
        lines.push(String::new());
      }
    }

    lines.join("\n")
  }

  pub fn emit_code(&self, plan: &OrderPlan) -> (String, Vec<Warning>) {
    let rendered = self.render(plan);
    let document = self.emit_document(&rendered);
    (document, rendered.warnings)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dependency::plan;
  use crate::naming::resolve;
  use crate::unit::{ItemId, collect};
  use pxd_ir::{CType, Declaration, Expression, Field, Header};

  fn generate(path: &str, decls: Vec<Declaration>) -> String {
    let (unit, _) = collect(&Header::new(path, decls)).unwrap();
    let retained: Vec<ItemId> = unit.ids().collect();
    let plan = plan(&unit, &retained).unwrap();
    let names = resolve(&unit, &retained).unwrap();
    let catalog = Catalog::builtin();
    let generator = PxdCodeGenerator::new(&unit, &names, &catalog, PxdCodeGeneratorOptions::default());
    generator.emit_code(&plan).0
  }

  #[test]
  fn test_empty_header_has_pass() {
    assert_eq!(generate("empty.h", vec![]), "cdef extern from \"empty.h\":\n\n    pass\n");
  }

  #[test]
  fn test_document_layout() {
    let document = generate(
      "point.h",
      vec![
        Declaration::structure(
          "Point",
          vec![Field::new("x", CType::named("int32_t")), Field::new("y", CType::named("int32_t"))],
        ),
        Declaration::macro_constant("ORIGIN", Expression::int("0")),
      ],
    );
    assert_eq!(
      document,
      "from libc.stdint cimport int32_t\n\
       \n\
       cdef extern from \"point.h\":\n\
       \n\
       \x20   int ORIGIN\n\
       \n\
       \x20   cdef struct Point:\n\
       \x20       int32_t x\n\
       \x20       int32_t y\n"
    );
  }

  #[test]
  fn test_forward_declarations_precede_constants() {
    let document = generate(
      "list.h",
      vec![
        Declaration::structure("Parent", vec![Field::new("first", CType::pointer(CType::named("struct Child")))]),
        Declaration::structure("Child", vec![Field::new("parent", CType::pointer(CType::named("struct Parent")))]),
        Declaration::macro_constant("DEPTH", Expression::int("4")),
      ],
    );
    let body: Vec<&str> = document.lines().filter(|line| !line.is_empty()).collect();
    assert_eq!(
      body,
      vec![
        "cdef extern from \"list.h\":",
        "    cdef struct Child",
        "    int DEPTH",
        "    cdef struct Parent:",
        "        Child* first",
        "    cdef struct Child:",
        "        Parent* parent",
      ]
    );
  }

  #[test]
  fn test_namespace_blocks_reopen_in_dependency_order() {
    let document = generate(
      "scope.hpp",
      vec![
        Declaration::structure("Before", vec![]),
        Declaration::namespace("ns", vec![Declaration::structure("Inner", vec![])]),
        Declaration::structure("After", vec![]),
      ],
    );
    let headers: Vec<&str> = document.lines().filter(|line| line.starts_with("cdef extern")).collect();
    assert_eq!(
      headers,
      vec![
        "cdef extern from \"scope.hpp\":",
        "cdef extern from \"scope.hpp\" namespace \"ns\":",
        "cdef extern from \"scope.hpp\":",
      ]
    );
  }

  #[test]
  fn test_namespace_blocks_follow_global_block() {
    let document = generate(
      "net.hpp",
      vec![
        Declaration::structure("Config", vec![]),
        Declaration::namespace(
          "net",
          vec![Declaration::namespace("tcp", vec![Declaration::structure("Socket", vec![])])],
        ),
      ],
    );
    let headers: Vec<&str> = document.lines().filter(|line| line.starts_with("cdef extern")).collect();
    assert_eq!(
      headers,
      vec![
        "cdef extern from \"net.hpp\":",
        "cdef extern from \"net.hpp\" namespace \"net::tcp\":",
      ]
    );
    assert!(document.ends_with("    cdef struct Socket:\n        pass\n"));
  }
}
