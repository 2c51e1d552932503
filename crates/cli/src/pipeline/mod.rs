//! Pipeline orchestration module.

mod orchestrator;
mod resolve;
mod summary;

pub use orchestrator::{builtin_registry, Pipeline, PipelineConfig};
pub use resolve::{resolve, ResolvedPipeline};
pub use summary::{print_plan, print_summary};
