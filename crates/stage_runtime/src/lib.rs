//! # Stage Runtime
//!
//! Wires configured stages together and runs them concurrently.
//!
//! - [`wire`] allocates one pipe per adjacent stage pair and binds endpoints
//! - [`Coordinator`] runs one task per stage and aggregates a [`RunReport`]
//!
//! ## Usage
//!
//! ```ignore
//! use stage_runtime::{wire, Coordinator, CoordinatorConfig};
//!
//! let pipeline = wire(stages, contracts::DEFAULT_PIPE_CAPACITY)?;
//! let report = Coordinator::new(CoordinatorConfig::default()).run(pipeline).await;
//! report.into_result()?;
//! ```

mod coordinator;
pub mod mock;
mod report;
mod wiring;

pub use coordinator::{Coordinator, CoordinatorConfig, DEFAULT_FAILURE_GRACE};
pub use report::{RunReport, StageOutcome, StageStatus, StreamReport};
pub use wiring::{check_shape, wire, StreamLink, WiredPipeline};
