//! StdinSource - streams the process's standard input

use async_trait::async_trait;
use contracts::{
    bind_source, downcast_config, ConfigRecord, Module, ModuleError, PipeReader, PipeWriter,
    StageType,
};
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::info;
use validator::Validate;

use crate::file::DEFAULT_BUFFER_SIZE;

contracts::config_record! {
    #[derive(Debug, Clone, Validate)]
    pub struct StdinSourceConfig {
        #[validate(range(min = 1, message = "buffer_size must be > 0"))]
        pub buffer_size: usize,
    }
}

impl Default for StdinSourceConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

#[derive(Default)]
pub struct StdinSource {
    config: StdinSourceConfig,
    writer: Option<PipeWriter>,
}

impl StdinSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Module for StdinSource {
    fn name(&self) -> &str {
        "stdin"
    }

    fn stage_type(&self) -> StageType {
        StageType::Source
    }

    fn default_config(&self) -> Box<dyn ConfigRecord> {
        Box::new(StdinSourceConfig::default())
    }

    fn apply_config(&mut self, config: Box<dyn ConfigRecord>) -> Result<(), ModuleError> {
        let config: StdinSourceConfig = downcast_config(config)?;
        config.validate()?;
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
        let mut stdin = BufReader::with_capacity(self.config.buffer_size, tokio::io::stdin());

        let bytes = tokio::io::copy_buf(&mut stdin, writer).await?;
        writer.shutdown().await?;

        info!(bytes, "Standard input read");
        Ok(())
    }
}
