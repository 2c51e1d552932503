//! Command implementations.

mod modules;
mod run;
mod validate;

pub use modules::run_modules;
pub use run::run_pipeline;
pub use validate::run_validate;
