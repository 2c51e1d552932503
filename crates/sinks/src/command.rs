//! CommandSink - feeds the stream to a child process's standard input
//!
//! Upload tools (`aws s3 cp - s3://...`, `gsutil cp -`, `ssh host 'cat > f'`)
//! plug in here. The child is killed if the stage is dropped first, or if
//! the upstream stream aborts, so a partial archive is never handed over
//! as complete.
//!
//! `args` is split with POSIX shell quoting rules, without expansion.

use std::process::Stdio;

use async_trait::async_trait;
use contracts::{
    bind_sink, downcast_config, ConfigRecord, Module, ModuleError, PipeReader, PipeWriter,
    StageType,
};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};
use validator::Validate;

contracts::config_record! {
    #[derive(Debug, Clone, Default, Validate)]
    pub struct CommandSinkConfig {
        #[validate(length(min = 1, message = "program is required"))]
        pub program: String,
        /// Arguments, split with shell quoting rules
        pub args: String,
        pub working_dir: Option<String>,
    }
}

impl CommandSinkConfig {
    pub fn arg_list(&self) -> Result<Vec<String>, ModuleError> {
        shell_words::split(&self.args).map_err(|e| ModuleError::InvalidConfig(format!("args: {e}")))
    }
}

#[derive(Default)]
pub struct CommandSink {
    config: CommandSinkConfig,
    reader: Option<PipeReader>,
}

impl CommandSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Module for CommandSink {
    fn name(&self) -> &str {
        "command"
    }

    fn stage_type(&self) -> StageType {
        StageType::Sink
    }

    fn default_config(&self) -> Box<dyn ConfigRecord> {
        Box::new(CommandSinkConfig::default())
    }

    fn apply_config(&mut self, config: Box<dyn ConfigRecord>) -> Result<(), ModuleError> {
        let config: CommandSinkConfig = downcast_config(config)?;
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
        self.reader = Some(bind_sink(writer, reader)?);
        Ok(())
    }

    async fn run(&mut self) -> Result<(), ModuleError> {
        let reader = self.reader.as_mut().ok_or(ModuleError::NotBound)?;
        let program = self.config.program.as_str();

        let mut command = Command::new(program);
        command
            .args(self.config.arg_list()?)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| ModuleError::process(program, format!("spawn failed: {e}")))?;
        debug!(program, pid = ?child.id(), "Child process started");

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ModuleError::process(program, "stdin not captured"))?;
        let copied = tokio::io::copy(reader, &mut stdin).await;
        if let Err(e) = &copied {
            if e.kind() == std::io::ErrorKind::ConnectionAborted {
                // kill before stdin closes, EOF would read as a complete upload
                child.kill().await?;
                warn!(program, "Upstream aborted, child killed");
                return Err(ModuleError::Io(std::io::Error::new(e.kind(), e.to_string())));
            }
        }
        drop(stdin);

        // Exit status first: a child that quits early surfaces as a
        // broken stdin, which is not a pipeline cascade.
        let status = child.wait().await?;
        if !status.success() {
            return Err(ModuleError::process(program, format!("exited with {status}")));
        }
        let bytes = copied
            .map_err(|e| ModuleError::process(program, format!("writing stdin failed: {e}")))?;

        info!(program, bytes, "Command input written");
        Ok(())
    }
}
