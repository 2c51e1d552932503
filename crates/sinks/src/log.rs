//! LogSink - drains the stream and logs its size and SHA-256 digest
//!
//! Useful for dry runs and for verifying that a backup and its restore
//! carry identical bytes without keeping either.

use async_trait::async_trait;
use contracts::{
    bind_sink, downcast_config, ConfigRecord, Module, ModuleError, PipeReader, PipeWriter,
    StageType,
};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::info;
use validator::Validate;

const READ_BUFFER: usize = 64 * 1024;

contracts::config_record! {
    #[derive(Debug, Clone, Validate)]
    pub struct LogSinkConfig {
        #[validate(length(min = 1, message = "label must not be empty"))]
        pub label: String,
    }
}

impl Default for LogSinkConfig {
    fn default() -> Self {
        Self {
            label: "stream".to_string(),
        }
    }
}

/// Size and digest of a drained stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDigest {
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Default)]
pub struct LogSink {
    config: LogSinkConfig,
    reader: Option<PipeReader>,
    digest: Option<StreamDigest>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest of the last completed run
    pub fn digest(&self) -> Option<&StreamDigest> {
        self.digest.as_ref()
    }
}

#[async_trait]
impl Module for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn stage_type(&self) -> StageType {
        StageType::Sink
    }

    fn default_config(&self) -> Box<dyn ConfigRecord> {
        Box::new(LogSinkConfig::default())
    }

    fn apply_config(&mut self, config: Box<dyn ConfigRecord>) -> Result<(), ModuleError> {
        let config: LogSinkConfig = downcast_config(config)?;
        config.validate()?;
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

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; READ_BUFFER];
        let mut bytes = 0u64;
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            bytes += n as u64;
        }

        let digest = StreamDigest {
            bytes,
            sha256: format!("{:x}", hasher.finalize()),
        };
        info!(
            label = %self.config.label,
            bytes = digest.bytes,
            sha256 = %digest.sha256,
            "Stream drained"
        );
        self.digest = Some(digest);
        Ok(())
    }
}
