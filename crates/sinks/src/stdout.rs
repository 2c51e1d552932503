//! StdoutSink - writes the stream to standard output

use async_trait::async_trait;
use contracts::{
    bind_sink, downcast_config, ConfigRecord, Module, ModuleError, PipeReader, PipeWriter,
    StageType,
};
use tokio::io::AsyncWriteExt;
use tracing::info;

contracts::config_record! {
    #[derive(Debug, Clone, Default)]
    pub struct StdoutSinkConfig {}
}

#[derive(Default)]
pub struct StdoutSink {
    reader: Option<PipeReader>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Module for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }

    fn stage_type(&self) -> StageType {
        StageType::Sink
    }

    fn default_config(&self) -> Box<dyn ConfigRecord> {
        Box::new(StdoutSinkConfig::default())
    }

    fn apply_config(&mut self, config: Box<dyn ConfigRecord>) -> Result<(), ModuleError> {
        downcast_config::<StdoutSinkConfig>(config)?;
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
        let mut stdout = tokio::io::stdout();

        let bytes = tokio::io::copy(reader, &mut stdout).await?;
        stdout.flush().await?;

        info!(bytes, "Standard output written");
        Ok(())
    }
}
