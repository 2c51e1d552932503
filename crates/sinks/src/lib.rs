//! # Sinks
//!
//! Built-in sink stages. Each one drains its reader endpoint to EOF.
//!
//! | name      | writes to                          |
//! |-----------|------------------------------------|
//! | `file`    | a local file (`path`)              |
//! | `stdout`  | the process's standard output      |
//! | `log`     | nowhere; logs size and SHA-256     |
//! | `command` | stdin of a child process           |

mod command;
mod file;
mod log;
mod stdout;
#[cfg(test)]
mod test_util;

pub use command::{CommandSink, CommandSinkConfig};
pub use file::{FileSink, FileSinkConfig};
pub use log::{LogSink, LogSinkConfig, StreamDigest};
pub use stdout::{StdoutSink, StdoutSinkConfig};

use contracts::ModuleGroup;
use module_registry::ModuleRegistry;

/// Register every built-in sink under both groups
pub fn register(registry: &mut ModuleRegistry) {
    for group in ModuleGroup::ALL {
        registry.register_fn(group, FileSink::new);
        registry.register_fn(group, StdoutSink::new);
        registry.register_fn(group, LogSink::new);
        registry.register_fn(group, CommandSink::new);
    }
}
