/* Catalog command - print the effective import catalog */

use super::translate::load_catalog;
use anyhow::Context;
use std::path::PathBuf;

/* Execute the catalog command */
pub fn run(catalog: Option<PathBuf>) -> anyhow::Result<()> {
  let catalog = load_catalog(catalog.as_deref())?;
  let yaml = serde_yml::to_string(&catalog).context("failed to serialize catalog")?;
  print!("{}", yaml);
  Ok(())
}
