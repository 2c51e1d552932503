//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the backup pipeline.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Pipeline Model
//! - A pipeline is `[source, compress?, encrypt?, sink]` (backup) or
//!   `[source, encrypt?, compress?, sink]` (restore)
//! - Adjacent stages share exactly one [`pipe`]: the upstream stage owns the
//!   [`PipeWriter`], the downstream stage owns the [`PipeReader`]
//! - Modules are configured through the key-based [`ConfigRecord`] contract

mod config_record;
mod error;
mod manifest;
mod module;
mod selector;
mod stream;

pub use config_record::*;
pub use error::*;
pub use manifest::*;
pub use module::*;
pub use selector::*;
pub use stream::*;
