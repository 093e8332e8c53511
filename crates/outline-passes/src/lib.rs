//! Region outlining passes.
//!
//! `device.cluster` and `device.launch` bodies are hoisted into private
//! functions and the operations are replaced by calls to them. Both passes
//! share one algorithm, parameterized by an [`OutlineTarget`].

pub mod live_values;
pub mod outline;

// Re-exports
pub use live_values::captured_values;
pub use outline::{
    ClusterOutliningPass, ClusterTarget, LaunchOutliningPass, LaunchTarget, OutlineOptions,
    OutlineResult, OutlineTarget, OutliningPass, outline_clusters, outline_launches,
};
