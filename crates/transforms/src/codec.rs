//! Chunked codec runtime shared by every transform
//!
//! A transform is a [`ChunkCodec`] driven by [`TransformModule`]: the module
//! reads its input endpoint in bounded chunks and steps the codec over each
//! chunk, forwarding every step's output before taking the next one. A step
//! emits a bounded amount, so a highly compressible chunk expands across
//! many writes instead of into one buffer.
//!
//! Codec steps are CPU bound and run on the blocking thread pool.

use std::marker::PhantomData;
use std::time::Instant;

use async_trait::async_trait;
use contracts::{
    bind_transform, downcast_config, ConfigRecord, Module, ModuleError, ModuleGroup, PipeReader,
    PipeWriter, StageType,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};
use validator::Validate;

/// Bytes read from the input endpoint per codec step
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Largest output a decoder emits from a single [`ChunkCodec::update`] step
pub const MAX_STEP_OUTPUT: usize = 16 * 1024 * 1024;

/// Incremental byte codec
pub trait ChunkCodec: Send {
    /// Consume a prefix of `input`, appending produced bytes to `output`
    ///
    /// Returns the number of input bytes consumed. The caller steps again
    /// with the remaining input, and with empty input while
    /// [`has_pending`](Self::has_pending) reports held-back output.
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<usize, ModuleError>;

    /// Whether output is still held back after the last step
    fn has_pending(&self) -> bool {
        false
    }

    /// Flush buffered state at end of input
    ///
    /// Decoders fail here when the input ended mid-frame.
    fn finish(&mut self, output: &mut Vec<u8>) -> Result<(), ModuleError>;
}

/// Static description of one transform family
pub trait TransformKind: Send + 'static {
    const NAME: &'static str;
    const STAGE: StageType;

    type Config: ConfigRecord + Validate + Default + Clone;

    /// Checks the derive rules cannot express
    fn check(_config: &Self::Config) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Encoder for the backup group, decoder for the restore group
    fn codec(config: &Self::Config, group: ModuleGroup) -> Result<Box<dyn ChunkCodec>, ModuleError>;
}

/// Module adapter running a [`TransformKind`]'s codec between two pipes
pub struct TransformModule<K: TransformKind> {
    group: ModuleGroup,
    config: K::Config,
    endpoints: Option<(PipeWriter, PipeReader)>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: TransformKind> TransformModule<K> {
    pub fn new(group: ModuleGroup) -> Self {
        Self {
            group,
            config: K::Config::default(),
            endpoints: None,
            _kind: PhantomData,
        }
    }

    /// Encoding variant (backup group)
    pub fn encoder() -> Self {
        Self::new(ModuleGroup::Backup)
    }

    /// Decoding variant (restore group)
    pub fn decoder() -> Self {
        Self::new(ModuleGroup::Restore)
    }

    pub fn config(&self) -> &K::Config {
        &self.config
    }
}

fn direction(group: ModuleGroup) -> &'static str {
    match group {
        ModuleGroup::Backup => "encode",
        ModuleGroup::Restore => "decode",
    }
}

#[async_trait]
impl<K: TransformKind> Module for TransformModule<K> {
    fn name(&self) -> &str {
        K::NAME
    }

    fn stage_type(&self) -> StageType {
        K::STAGE
    }

    fn default_config(&self) -> Box<dyn ConfigRecord> {
        Box::new(K::Config::default())
    }

    fn apply_config(&mut self, config: Box<dyn ConfigRecord>) -> Result<(), ModuleError> {
        let config: K::Config = downcast_config(config)?;
        config.validate()?;
        K::check(&config)?;
        self.config = config;
        Ok(())
    }

    fn bind_streams(
        &mut self,
        writer: Option<PipeWriter>,
        reader: Option<PipeReader>,
    ) -> Result<(), ModuleError> {
        self.endpoints = Some(bind_transform(writer, reader)?);
        Ok(())
    }

    async fn run(&mut self) -> Result<(), ModuleError> {
        let codec = K::codec(&self.config, self.group)?;
        let (writer, reader) = self.endpoints.as_mut().ok_or(ModuleError::NotBound)?;

        let started = Instant::now();
        let mut work = CodecWork {
            codec,
            input: vec![0u8; READ_CHUNK_SIZE],
            output: Vec::with_capacity(READ_CHUNK_SIZE),
        };
        let (mut bytes_in, mut bytes_out) = (0u64, 0u64);

        loop {
            let n = reader.read(&mut work.input).await?;
            if n == 0 {
                break;
            }
            bytes_in += n as u64;

            let mut offset = 0;
            loop {
                let (next, consumed) = work
                    .offload(move |w| {
                        w.output.clear();
                        w.codec.update(&w.input[offset..n], &mut w.output)
                    })
                    .await?;
                work = next;
                offset += consumed;

                let pending = work.codec.has_pending();
                if consumed == 0 && work.output.is_empty() && !pending && offset < n {
                    return Err(ModuleError::codec(format!(
                        "{} codec made no progress",
                        K::NAME
                    )));
                }
                if !work.output.is_empty() {
                    writer.write_all(&work.output).await?;
                    bytes_out += work.output.len() as u64;
                }
                if offset == n && !pending {
                    break;
                }
            }
        }

        let (work, ()) = work
            .offload(|w| {
                w.output.clear();
                w.codec.finish(&mut w.output)
            })
            .await?;
        writer.write_all(&work.output).await?;
        bytes_out += work.output.len() as u64;
        writer.shutdown().await?;

        debug!(module = K::NAME, "Codec flushed");
        info!(
            module = K::NAME,
            direction = direction(self.group),
            bytes_in,
            bytes_out,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transform finished"
        );
        Ok(())
    }
}

/// Codec plus its buffers, handed to the blocking pool for each step
struct CodecWork {
    codec: Box<dyn ChunkCodec>,
    input: Vec<u8>,
    output: Vec<u8>,
}

impl CodecWork {
    async fn offload<F, R>(mut self, step: F) -> Result<(Self, R), ModuleError>
    where
        F: FnOnce(&mut Self) -> Result<R, ModuleError> + Send + 'static,
        R: Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            let value = step(&mut self)?;
            Ok((self, value))
        })
        .await
        .map_err(|e| {
            if e.is_panic() {
                ModuleError::Panicked(panic_message(e.into_panic()))
            } else {
                ModuleError::Cancelled
            }
        })?
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "codec panicked".to_string())
}

/// Run a codec over `input` split into `step`-sized chunks
#[cfg(test)]
pub(crate) fn run_codec(
    codec: &mut dyn ChunkCodec,
    input: &[u8],
    step: usize,
) -> Result<Vec<u8>, ModuleError> {
    run_codec_steps(codec, input, step).map(|(output, _)| output)
}

/// Like [`run_codec`], also returning the largest output of a single step
#[cfg(test)]
pub(crate) fn run_codec_steps(
    codec: &mut dyn ChunkCodec,
    input: &[u8],
    step: usize,
) -> Result<(Vec<u8>, usize), ModuleError> {
    let mut output = Vec::new();
    let mut largest = 0;
    let mut buf = Vec::new();
    for chunk in input.chunks(step.max(1)) {
        let mut offset = 0;
        loop {
            buf.clear();
            offset += codec.update(&chunk[offset..], &mut buf)?;
            largest = largest.max(buf.len());
            output.extend_from_slice(&buf);
            if offset == chunk.len() && !codec.has_pending() {
                break;
            }
        }
    }
    codec.finish(&mut output)?;
    Ok((output, largest))
}
