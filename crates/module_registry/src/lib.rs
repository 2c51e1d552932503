//! # Module Registry
//!
//! Module catalog and pipeline assembly.
//!
//! Responsibilities:
//! - Hold module factories keyed by `(group, stage type, name)`
//! - Resolve a [`PipelineRequest`](contracts::PipelineRequest) into
//!   configured [`PipelineStage`](contracts::PipelineStage)s
//!
//! The registry is an explicit object: build it once at startup, then share
//! it read-only.

pub mod builder;
pub mod registry;

#[cfg(test)]
mod test_support;

pub use builder::PipelineBuilder;
pub use registry::{ModuleDescription, ModuleFactory, ModuleRegistry};
