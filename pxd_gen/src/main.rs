use clap::{Parser, Subcommand};
use pxd_gen::cmds;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "pxd-gen")]
#[command(about = "Cython .pxd generator for parsed C/C++ headers", long_about = None)]
struct Cli {
    /* Log pipeline stages and ordering decisions */
    #[arg(long = "debug", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /* Translate a header IR file into a .pxd document */
    Translate {
        /* Header IR file (.yaml, .yml or .json) */
        #[arg(short = 'f', long = "file", value_name = "FILE")]
        file: PathBuf,

        /* Output file; the document goes to stdout when omitted */
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,

        /* Only emit declarations from files matching these globs */
        #[arg(short = 'w', long = "whitelist", value_name = "GLOB")]
        whitelist: Vec<String>,

        /* Catalog file extending the built-in import tables */
        #[arg(long = "catalog", value_name = "FILE")]
        catalog: Option<PathBuf>,

        /* Do not annotate unsupported constructs with # NOTE: lines */
        #[arg(long = "no-annotate")]
        no_annotate: bool,

        /* Suppress warnings */
        #[arg(short = 'q', long = "quiet")]
        quiet: bool,

        /* Enable verbose output */
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },

    /* Print the effective import catalog as YAML */
    Catalog {
        /* Catalog file extending the built-in import tables */
        #[arg(long = "catalog", value_name = "FILE")]
        catalog: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    /* RUST_LOG wins over the --debug default */
    let default_filter = if cli.debug { "pxd_gen=debug" } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Translate {
            file,
            output,
            whitelist,
            catalog,
            no_annotate,
            quiet,
            verbose,
        } => {
            cmds::translate::run(cmds::translate::TranslateArgs {
                file,
                output,
                whitelist,
                catalog,
                annotate: !no_annotate,
                quiet,
                verbose,
            })?;
        }

        Commands::Catalog { catalog } => {
            cmds::catalog::run(catalog)?;
        }
    }

    Ok(())
}
