//! Parse, outline, print.
//!
//! ```text
//! source text
//!   └── parse_module_with_path   (must yield a core.module)
//!       ├── outline_clusters     (--pass cluster | all)
//!       └── outline_launches     (--pass launch | all)
//!           └── print_module
//! ```

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use derive_more::{Display, Error, From};
use outline_ir::parser::parse_module_with_path;
use outline_ir::printer::print_module;
use outline_ir::{IrContext, Module, ParseError, Symbol};
use outline_passes::{OutlineOptions, outline_clusters, outline_launches};

/// Errors reported by the driver.
#[derive(Debug, Display, Error, From)]
pub enum DriverError {
    /// Reading the input or writing the output failed.
    #[display("I/O error: {_0}")]
    Io(#[error(source)] io::Error),

    /// The input is not valid textual IR.
    #[display("{_0}")]
    Parse(#[error(source)] ParseError),

    /// The top-level operation is something other than `core.module`.
    #[from(ignore)]
    #[display("expected `core.module` at the top level, found `{_0}`")]
    NotAModule(#[error(not(source))] String),
}

/// Which outlining passes to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PassSelection {
    /// `device.cluster` only.
    Cluster,
    /// `device.launch` only.
    Launch,
    /// Cluster outlining, then launch outlining.
    #[default]
    All,
}

impl PassSelection {
    pub fn runs_cluster(self) -> bool {
        matches!(self, PassSelection::Cluster | PassSelection::All)
    }

    pub fn runs_launch(self) -> bool {
        matches!(self, PassSelection::Launch | PassSelection::All)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    pub passes: PassSelection,
    pub outline: OutlineOptions,
}

/// Outline the module in `source` and return it printed.
///
/// `path` only ends up in the locations of the parsed IR.
pub fn outline_source(
    source: &str,
    path: &str,
    options: &PipelineOptions,
) -> Result<String, DriverError> {
    let mut ctx = IrContext::new();
    let op = parse_module_with_path(&mut ctx, source, path)?;
    let Some(module) = Module::new(&ctx, op) else {
        let data = ctx.op(op);
        return Err(DriverError::NotAModule(format!(
            "{}.{}",
            data.dialect, data.name
        )));
    };

    if options.passes.runs_cluster() {
        let result = outline_clusters(&mut ctx, module, options.outline);
        tracing::debug!(
            "{path}: outlined {} cluster(s): {:?}",
            result.outlined_count,
            names(&result.outlined_functions)
        );
    }
    if options.passes.runs_launch() {
        let result = outline_launches(&mut ctx, module, options.outline);
        tracing::debug!(
            "{path}: outlined {} launch(es): {:?}",
            result.outlined_count,
            names(&result.outlined_functions)
        );
    }

    Ok(print_module(&ctx, module.op()))
}

fn names(symbols: &[Symbol]) -> Vec<String> {
    symbols.iter().map(ToString::to_string).collect()
}

/// Read `input` (or stdin), outline it, and write to `output` (or stdout).
pub fn run(
    input: Option<&Path>,
    output: Option<&Path>,
    options: &PipelineOptions,
) -> Result<(), DriverError> {
    let (source, path) = match input {
        Some(path) => (fs::read_to_string(path)?, path.display().to_string()),
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            (source, "<stdin>".to_owned())
        }
    };

    let text = outline_source(&source, &path, options)?;

    match output {
        Some(path) => fs::write(path, text)?,
        None => io::stdout().write_all(text.as_bytes())?,
    }
    Ok(())
}
