//! Command-line interface for the outliner.

use std::path::PathBuf;

use clap::Parser;
use outliner::pipeline::{PassSelection, PipelineOptions};
use outline_passes::OutlineOptions;

#[derive(Parser)]
#[command(name = "outliner")]
#[command(
    about = "Outline device.cluster / device.launch regions into functions",
    long_about = None
)]
pub struct Cli {
    /// Input IR file (reads stdin when omitted)
    pub input: Option<PathBuf>,

    /// Which outlining passes to run
    #[arg(long, value_enum, default_value_t = PassSelection::All)]
    pub pass: PassSelection,

    /// Name outlined functions after a structural hash of the outlined op
    #[arg(long)]
    pub globally_unique_func_names: bool,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            passes: self.pass,
            outline: OutlineOptions {
                globally_unique_func_names: self.globally_unique_func_names,
            },
        }
    }
}
