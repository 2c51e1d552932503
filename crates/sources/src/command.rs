//! CommandSource - streams the standard output of a child process
//!
//! Covers dump tools (`mysqldump`, `pg_dump`, `mongodump --archive`, ...)
//! without a dedicated module per database. The child is killed if the
//! stage is dropped before it exits.
//!
//! `args` is split the way a POSIX shell splits words, so quoting works
//! (`-c 'pg_dump mydb | head'`). No expansion or piping happens; wrap the
//! command in `sh -c` for that.

use std::process::Stdio;

use async_trait::async_trait;
use contracts::{
    bind_source, downcast_config, ConfigRecord, Module, ModuleError, PipeReader, PipeWriter,
    StageType,
};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};
use validator::Validate;

contracts::config_record! {
    #[derive(Debug, Clone, Default, Validate)]
    pub struct CommandSourceConfig {
        #[validate(length(min = 1, message = "program is required"))]
        pub program: String,
        /// Arguments, split with shell quoting rules
        pub args: String,
        pub working_dir: Option<String>,
    }
}

impl CommandSourceConfig {
    pub fn arg_list(&self) -> Result<Vec<String>, ModuleError> {
        shell_words::split(&self.args).map_err(|e| ModuleError::InvalidConfig(format!("args: {e}")))
    }
}

#[derive(Default)]
pub struct CommandSource {
    config: CommandSourceConfig,
    writer: Option<PipeWriter>,
}

impl CommandSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Module for CommandSource {
    fn name(&self) -> &str {
        "command"
    }

    fn stage_type(&self) -> StageType {
        StageType::Source
    }

    fn default_config(&self) -> Box<dyn ConfigRecord> {
        Box::new(CommandSourceConfig::default())
    }

    fn apply_config(&mut self, config: Box<dyn ConfigRecord>) -> Result<(), ModuleError> {
        let config: CommandSourceConfig = downcast_config(config)?;
        config.validate()?;
        config.arg_list()?;
        self.config = config;
        Ok(())
    }

    fn bind_streams(
        &mut self,
        writer: Option<PipeWriter>,
        reader: Option<PipeReader>,
    ) -> Result<(), ModuleError> {
        self.writer = Some(bind_source(writer, reader)?);
        Ok(())
    }

    async fn run(&mut self) -> Result<(), ModuleError> {
        let writer = self.writer.as_mut().ok_or(ModuleError::NotBound)?;
        let program = self.config.program.as_str();

        let mut command = Command::new(program);
        command
            .args(self.config.arg_list()?)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| ModuleError::process(program, format!("spawn failed: {e}")))?;
        debug!(program, pid = ?child.id(), "Child process started");

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ModuleError::process(program, "stdout not captured"))?;

        let bytes = tokio::io::copy(&mut stdout, writer).await?;

        // the stream is only finished once the dump is known to be complete
        let status = child.wait().await?;
        if !status.success() {
            return Err(ModuleError::process(program, format!("exited with {status}")));
        }
        writer.shutdown().await?;

        info!(program, bytes, "Command output read");
        Ok(())
    }
}
