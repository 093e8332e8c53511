//! Driver for the region outlining passes: textual IR in, textual IR out.

pub mod pipeline;

pub use pipeline::{DriverError, PassSelection, PipelineOptions, outline_source};
