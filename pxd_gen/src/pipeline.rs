//! One translation run: IR header in, `.pxd` document and warnings out.

use crate::codegen::pxd::{PxdCodeGenerator, PxdCodeGeneratorOptions};
use crate::config::{Catalog, GenOptions};
use crate::dependency;
use crate::errors::{GenResult, Stage, Warning};
use crate::naming;
use crate::unit;
use crate::whitelist::{self, Whitelist};
use pxd_ir::Header;
use tracing::{debug, warn};

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct Translation {
    pub document: String,
    pub warnings: Vec<Warning>,
}

/// Tracks the stage a run is in; errors raised by a stage carry it.
struct Progress {
    stage: Stage,
}

impl Progress {
    fn advance(&mut self, next: Stage) {
        debug!("{} -> {}", self.stage, next);
        self.stage = next;
    }
}

/// Translate `header` into a `.pxd` document.
///
/// Fatal errors abort the run without a document; everything else is
/// reported through [`Translation::warnings`].
pub fn translate(
    header: &Header,
    catalog: &Catalog,
    options: &GenOptions,
) -> GenResult<Translation> {
    let mut progress = Progress {
        stage: Stage::Collecting,
    };
    debug!("translating {} ({} declarations)", header.path, header.declarations.len());

    let (unit, mut warnings) = unit::collect(header)?;
    for warning in &warnings {
        warn!("{}", warning);
    }

    progress.advance(Stage::Filtering);
    let whitelist = Whitelist::new(&options.whitelist)?;
    let retained = whitelist::filter(&unit, &whitelist);

    progress.advance(Stage::Ordering);
    let plan = dependency::plan(&unit, &retained)?;
    debug!(
        "ordered {} declarations with {} forward declarations",
        plan.order.len(),
        plan.forward.len()
    );

    progress.advance(Stage::Resolving);
    let names = naming::resolve(&unit, &retained)?;

    progress.advance(Stage::Rendering);
    let generator = PxdCodeGenerator::new(
        &unit,
        &names,
        catalog,
        PxdCodeGeneratorOptions {
            annotate: options.annotate,
        },
    );
    let rendered = generator.render(&plan);

    progress.advance(Stage::Emitting);
    let document = generator.emit_document(&rendered);
    warnings.extend(rendered.warnings);

    progress.advance(Stage::Done);
    Ok(Translation { document, warnings })
}
