use crate::config::Catalog;
use crate::unit::{ItemId, TemplateRef, Ty, Unit};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::trace;

/* Modules to cimport from, each with the sorted names it provides */
pub type ImportTable = BTreeMap<String, BTreeSet<String>>;

/* A name spelled with `std::`, or used as a template, may come from libcpp */
fn is_cpp_scoped(scope: &[String], template: bool) -> bool {
  template || scope.first().is_some_and(|head| head == "std")
}

/// External names referenced by `retained` items that the catalog can provide.
///
/// Type names declared anywhere in the header are never imported.
pub fn collect_imports(unit: &Unit, retained: &[ItemId], catalog: &Catalog) -> ImportTable {
  let local: HashSet<&str> = unit
    .items
    .iter()
    .filter(|item| item.kind.is_type())
    .filter_map(|item| item.name.as_deref())
    .collect();
  let mut table = ImportTable::new();

  let mut add = |name: &str, scope: &[String], template: bool| {
    if local.contains(name) {
      return;
    }
    if let Some(module) = catalog.lookup(name, is_cpp_scoped(scope, template)) {
      trace!("'{}' imported from {}", name, module);
      table.entry(module.to_string()).or_default().insert(name.to_string());
    }
  };

  for &id in retained {
    for root in unit.item(id).body.types() {
      root.walk(&mut |ty| match ty {
        Ty::Named { name, scope, .. } => add(name, scope, false),
        Ty::Template {
          template: TemplateRef::Named { name, scope },
          ..
        } => add(name, scope, true),
        _ => {}
      });
    }
  }
  table
}

/* `from <module> cimport a, b` lines, sorted by module */
pub fn import_lines(table: &ImportTable) -> Vec<String> {
  table
    .iter()
    .map(|(module, names)| {
      let names: Vec<&str> = names.iter().map(String::as_str).collect();
      format!("from {} cimport {}", module, names.join(", "))
    })
    .collect()
}
