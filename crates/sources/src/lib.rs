//! # Sources
//!
//! Built-in source stages. Each one produces the pipeline's byte stream
//! on its writer endpoint and closes it when the input is exhausted.
//!
//! | name      | reads                          |
//! |-----------|--------------------------------|
//! | `file`    | a local file (`path`)          |
//! | `stdin`   | the process's standard input   |
//! | `command` | stdout of a child process      |
//!
//! Sources are direction-agnostic, so [`register`] adds them to both groups.

mod command;
mod file;
mod stdin;
#[cfg(test)]
mod test_util;

pub use command::{CommandSource, CommandSourceConfig};
pub use file::{FileSource, FileSourceConfig, DEFAULT_BUFFER_SIZE};
pub use stdin::{StdinSource, StdinSourceConfig};

use contracts::ModuleGroup;
use module_registry::ModuleRegistry;

/// Register every built-in source under both groups
pub fn register(registry: &mut ModuleRegistry) {
    for group in ModuleGroup::ALL {
        registry.register_fn(group, FileSource::new);
        registry.register_fn(group, StdinSource::new);
        registry.register_fn(group, CommandSource::new);
    }
}
