//! `lz4` - LZ4 block compression in length-prefixed frames
//!
//! Stream layout: a sequence of `u32 BE length` + LZ4 block with its
//! uncompressed size prepended. An empty payload encodes to zero frames.

use contracts::{ModuleError, ModuleGroup, StageType};
use validator::Validate;

use crate::codec::{ChunkCodec, TransformKind, MAX_STEP_OUTPUT};

pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Largest block the encoder accepts, and so the largest a frame decodes to
///
/// One frame is one decoder step.
pub const MAX_BLOCK_SIZE: usize = MAX_STEP_OUTPUT;

const LEN_PREFIX: usize = 4;

/// Upper bound on a single frame accepted by the decoder: the size prefix
/// plus LZ4's worst-case expansion of a maximal block
const MAX_FRAME_LEN: usize = LEN_PREFIX + MAX_BLOCK_SIZE + MAX_BLOCK_SIZE / 255 + 16;

contracts::config_record! {
    #[derive(Debug, Clone, Validate)]
    pub struct Lz4Config {
        #[validate(range(min = 1024, max = 16777216, message = "block_size must be between 1 KiB and 16 MiB"))]
        pub block_size: usize,
    }
}

impl Default for Lz4Config {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

pub struct Lz4;

impl TransformKind for Lz4 {
    const NAME: &'static str = "lz4";
    const STAGE: StageType = StageType::Compress;
    type Config = Lz4Config;

    fn codec(config: &Lz4Config, group: ModuleGroup) -> Result<Box<dyn ChunkCodec>, ModuleError> {
        Ok(match group {
            ModuleGroup::Backup => Box::new(Lz4Encoder::new(config.block_size)),
            ModuleGroup::Restore => Box::new(Lz4Decoder::default()),
        })
    }
}

pub struct Lz4Encoder {
    block_size: usize,
    pending: Vec<u8>,
}

impl Lz4Encoder {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            pending: Vec::with_capacity(block_size),
        }
    }

    fn emit(block: &[u8], output: &mut Vec<u8>) -> Result<(), ModuleError> {
        let compressed = lz4_flex::compress_prepend_size(block);
        let len = u32::try_from(compressed.len())
            .map_err(|_| ModuleError::codec("lz4 frame exceeds u32 length"))?;
        output.extend_from_slice(&len.to_be_bytes());
        output.extend_from_slice(&compressed);
        Ok(())
    }
}

impl ChunkCodec for Lz4Encoder {
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<usize, ModuleError> {
        self.pending.extend_from_slice(input);
        let full = self.pending.len() / self.block_size * self.block_size;
        for block in self.pending[..full].chunks(self.block_size) {
            Self::emit(block, output)?;
        }
        self.pending.drain(..full);
        Ok(input.len())
    }

    fn finish(&mut self, output: &mut Vec<u8>) -> Result<(), ModuleError> {
        if !self.pending.is_empty() {
            Self::emit(&self.pending, output)?;
            self.pending.clear();
        }
        Ok(())
    }
}

/// Decoder emitting at most one frame per step
#[derive(Default)]
pub struct Lz4Decoder {
    pending: Vec<u8>,
}

impl Lz4Decoder {
    /// Length of the complete frame at the front of the buffer, if any
    fn next_frame(&self) -> Result<Option<usize>, ModuleError> {
        let Some(prefix) = self.pending.get(..LEN_PREFIX) else {
            return Ok(None);
        };
        let mut raw = [0u8; LEN_PREFIX];
        raw.copy_from_slice(prefix);
        let len = u32::from_be_bytes(raw) as usize;
        if len > MAX_FRAME_LEN {
            return Err(ModuleError::codec(format!(
                "lz4 frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"
            )));
        }
        Ok((self.pending.len() - LEN_PREFIX >= len).then_some(len))
    }
}

impl ChunkCodec for Lz4Decoder {
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<usize, ModuleError> {
        self.pending.extend_from_slice(input);
        let Some(len) = self.next_frame()? else {
            return Ok(input.len());
        };

        let block = &self.pending[LEN_PREFIX..LEN_PREFIX + len];
        let Some(size) = block.get(..4) else {
            return Err(ModuleError::codec("lz4 frame too short for its size prefix"));
        };
        let size = u32::from_le_bytes([size[0], size[1], size[2], size[3]]) as usize;
        if size > MAX_BLOCK_SIZE {
            return Err(ModuleError::codec(format!(
                "lz4 block claims {size} bytes, above the {MAX_BLOCK_SIZE} byte limit"
            )));
        }

        let decoded = lz4_flex::decompress_size_prepended(block)
            .map_err(|e| ModuleError::codec(format!("lz4 decompression failed: {e}")))?;
        output.extend_from_slice(&decoded);
        self.pending.drain(..LEN_PREFIX + len);
        Ok(input.len())
    }

    fn has_pending(&self) -> bool {
        matches!(self.next_frame(), Ok(Some(_)))
    }

    fn finish(&mut self, _output: &mut Vec<u8>) -> Result<(), ModuleError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(ModuleError::codec(format!(
                "lz4 stream truncated: {} trailing bytes do not form a frame",
                self.pending.len()
            )))
        }
    }
}
