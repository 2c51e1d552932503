//! FileSource - streams a local file

use std::path::PathBuf;

use async_trait::async_trait;
use contracts::{
    bind_source, downcast_config, ConfigRecord, Module, ModuleError, PipeReader, PipeWriter,
    StageType,
};
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::info;
use validator::Validate;

/// Default read buffer size
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

contracts::config_record! {
    #[derive(Debug, Clone, Validate)]
    pub struct FileSourceConfig {
        #[validate(length(min = 1, message = "path is required"))]
        pub path: String,
        #[validate(range(min = 1, message = "buffer_size must be > 0"))]
        pub buffer_size: usize,
    }
}

impl Default for FileSourceConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Source reading a file from disk
#[derive(Default)]
pub struct FileSource {
    config: FileSourceConfig,
    writer: Option<PipeWriter>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Module for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn stage_type(&self) -> StageType {
        StageType::Source
    }

    fn default_config(&self) -> Box<dyn ConfigRecord> {
        Box::new(FileSourceConfig::default())
    }

    fn apply_config(&mut self, config: Box<dyn ConfigRecord>) -> Result<(), ModuleError> {
        let config: FileSourceConfig = downcast_config(config)?;
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

        let path = PathBuf::from(&self.config.path);
        let file = tokio::fs::File::open(&path).await?;
        let mut reader = BufReader::with_capacity(self.config.buffer_size, file);

        let bytes = tokio::io::copy_buf(&mut reader, writer).await?;
        writer.shutdown().await?;

        info!(path = %path.display(), bytes, "File read");
        Ok(())
    }
}
