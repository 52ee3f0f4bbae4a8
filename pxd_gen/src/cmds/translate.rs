/* Translate command - generate a .pxd document from a header IR file */

use crate::config::{Catalog, GenOptions};
use crate::pipeline::translate;
use anyhow::{Context, bail};
use pxd_ir::Header;
use std::fs;
use std::path::{Path, PathBuf};

pub struct TranslateArgs {
  pub file: PathBuf,
  pub output: Option<PathBuf>,
  pub whitelist: Vec<String>,
  pub catalog: Option<PathBuf>,
  pub annotate: bool,
  pub quiet: bool,
  pub verbose: bool,
}

/* Read a header IR file; the format follows the extension */
pub fn load_header(path: &Path) -> anyhow::Result<Header> {
  let content = fs::read_to_string(path)
    .with_context(|| format!("failed to read {}", path.display()))?;
  let extension = path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| ext.to_ascii_lowercase());

  let header = match extension.as_deref() {
    Some("yaml") | Some("yml") => pxd_ir::header_from_yaml(&content)
      .with_context(|| format!("failed to parse YAML header IR {}", path.display()))?,
    Some("json") => serde_json::from_str(&content)
      .with_context(|| format!("failed to parse JSON header IR {}", path.display()))?,
    _ => bail!(
      "unsupported header IR format for {} (expected .yaml, .yml or .json)",
      path.display()
    ),
  };
  Ok(header)
}

/* Built-in catalog, extended by the file given on the command line */
pub fn load_catalog(path: Option<&Path>) -> anyhow::Result<Catalog> {
  match path {
    Some(path) => Catalog::load(path),
    None => Ok(Catalog::builtin()),
  }
}

/* Execute the translate command */
pub fn run(args: TranslateArgs) -> anyhow::Result<()> {
  if args.verbose {
    println!("[~] Configuration:");
    println!("  Input file: {}", args.file.display());
    match &args.output {
      Some(output) => println!("  Output file: {}", output.display()),
      None => println!("  Output: stdout"),
    }
    if !args.whitelist.is_empty() {
      println!("  Whitelist: {}", args.whitelist.len());
      for pattern in &args.whitelist {
        println!("    - {}", pattern);
      }
    }
    println!();
  }

  let header = load_header(&args.file)?;
  let catalog = load_catalog(args.catalog.as_deref())?;
  if args.verbose {
    println!("[~] Loaded {} top-level declarations from {}", header.declarations.len(), header.path);
  }

  let options = GenOptions {
    whitelist: args.whitelist.clone(),
    annotate: args.annotate,
  };
  let translation = translate(&header, &catalog, &options)
    .with_context(|| format!("failed to translate {}", args.file.display()))?;

  if !args.quiet {
    for warning in &translation.warnings {
      eprintln!("[!] {}", warning);
    }
  }

  match &args.output {
    Some(output) => {
      fs::write(output, &translation.document)
        .with_context(|| format!("failed to write {}", output.display()))?;
      if args.verbose {
        println!("[✓] Generated {}", output.display());
      }
    }
    None => print!("{}", translation.document),
  }

  if args.verbose {
    println!("[✓] Translation complete with {} warning(s)", translation.warnings.len());
  }
  Ok(())
}
