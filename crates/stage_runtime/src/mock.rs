//! In-memory modules for exercising the runtime without files or processes
//!
//! - [`MemorySource`] writes a fixed payload
//! - [`PassThrough`] copies bytes unchanged, optionally failing, panicking
//!   or stalling
//! - [`CollectSink`] gathers everything it reads, optionally slowly

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use contracts::{
    bind_sink, bind_source, bind_transform, ConfigRecord, Module, ModuleError, PipeReader,
    PipeWriter, StageType,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

contracts::config_record! {
    /// Mock modules take no parameters
    #[derive(Debug, Default)]
    pub struct MockConfig {}
}

/// Source writing a fixed payload in chunks
pub struct MemorySource {
    payload: Vec<u8>,
    chunk_size: usize,
    writer: Option<PipeWriter>,
}

impl MemorySource {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            chunk_size: 4096,
            writer: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

#[async_trait]
impl Module for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn stage_type(&self) -> StageType {
        StageType::Source
    }

    fn default_config(&self) -> Box<dyn ConfigRecord> {
        Box::new(MockConfig::default())
    }

    fn apply_config(&mut self, _config: Box<dyn ConfigRecord>) -> Result<(), ModuleError> {
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
        for chunk in self.payload.chunks(self.chunk_size) {
            writer.write_all(chunk).await?;
        }
        writer.shutdown().await?;
        Ok(())
    }
}

/// Misbehaviour injected into a [`PassThrough`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    None,
    /// Return an error once this many bytes were copied
    FailAfter(u64),
    /// Panic once this many bytes were copied
    PanicAfter(u64),
    /// Never read, never write, never return
    Stall,
}

/// Transform copying its input unchanged
pub struct PassThrough {
    stage: StageType,
    name: String,
    fault: Fault,
    reject_bind: bool,
    writer: Option<PipeWriter>,
    reader: Option<PipeReader>,
}

impl PassThrough {
    pub fn new(stage: StageType) -> Self {
        Self {
            stage,
            name: "passthrough".to_string(),
            fault: Fault::None,
            reject_bind: false,
            writer: None,
            reader: None,
        }
    }

    pub fn compress() -> Self {
        Self::new(StageType::Compress)
    }

    pub fn encrypt() -> Self {
        Self::new(StageType::Encrypt)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn fail_after(mut self, bytes: u64) -> Self {
        self.fault = Fault::FailAfter(bytes);
        self
    }

    pub fn panic_after(mut self, bytes: u64) -> Self {
        self.fault = Fault::PanicAfter(bytes);
        self
    }

    pub fn stall(mut self) -> Self {
        self.fault = Fault::Stall;
        self
    }

    pub fn reject_bind(mut self) -> Self {
        self.reject_bind = true;
        self
    }
}

#[async_trait]
impl Module for PassThrough {
    fn name(&self) -> &str {
        &self.name
    }

    fn stage_type(&self) -> StageType {
        self.stage
    }

    fn default_config(&self) -> Box<dyn ConfigRecord> {
        Box::new(MockConfig::default())
    }

    fn apply_config(&mut self, _config: Box<dyn ConfigRecord>) -> Result<(), ModuleError> {
        Ok(())
    }

    fn bind_streams(
        &mut self,
        writer: Option<PipeWriter>,
        reader: Option<PipeReader>,
    ) -> Result<(), ModuleError> {
        if self.reject_bind {
            return Err(ModuleError::Other("endpoints rejected".into()));
        }
        let (writer, reader) = bind_transform(writer, reader)?;
        self.writer = Some(writer);
        self.reader = Some(reader);
        Ok(())
    }

    async fn run(&mut self) -> Result<(), ModuleError> {
        if self.fault == Fault::Stall {
            std::future::pending::<()>().await;
        }

        let reader = self.reader.as_mut().ok_or(ModuleError::NotBound)?;
        let writer = self.writer.as_mut().ok_or(ModuleError::NotBound)?;

        let mut copied = 0u64;
        let mut buf = vec![0u8; 1024];
        loop {
            match self.fault {
                Fault::FailAfter(limit) if copied >= limit => {
                    return Err(ModuleError::codec(format!("injected failure after {copied} bytes")));
                }
                Fault::PanicAfter(limit) if copied >= limit => {
                    panic!("injected panic after {copied} bytes");
                }
                _ => {}
            }

            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
            copied += n as u64;
        }
        writer.shutdown().await?;
        Ok(())
    }
}

/// Sink collecting every byte it reads
pub struct CollectSink {
    received: Arc<Mutex<Vec<u8>>>,
    read_size: usize,
    delay: Option<Duration>,
    reader: Option<PipeReader>,
}

impl CollectSink {
    /// Sink plus a handle to the bytes it received
    pub fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                received: Arc::clone(&received),
                read_size: 8192,
                delay: None,
                reader: None,
            },
            received,
        )
    }

    /// Read at most `read_size` bytes, then sleep `delay`
    pub fn slow(mut self, read_size: usize, delay: Duration) -> Self {
        self.read_size = read_size.max(1);
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Module for CollectSink {
    fn name(&self) -> &str {
        "collect"
    }

    fn stage_type(&self) -> StageType {
        StageType::Sink
    }

    fn default_config(&self) -> Box<dyn ConfigRecord> {
        Box::new(MockConfig::default())
    }

    fn apply_config(&mut self, _config: Box<dyn ConfigRecord>) -> Result<(), ModuleError> {
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
        let mut buf = vec![0u8; self.read_size];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            self.received.lock().await.extend_from_slice(&buf[..n]);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
