//! `zstd` - Zstandard streaming compression

use std::io::Write;

use contracts::{ModuleError, ModuleGroup, StageType};
use validator::Validate;
use zstd::stream::raw::{InBuffer, Operation, OutBuffer};

use crate::codec::{ChunkCodec, TransformKind};

pub const DEFAULT_LEVEL: i32 = 3;

/// Decoded bytes emitted per decoder step
const OUTPUT_CHUNK: usize = 32 * 1024;

contracts::config_record! {
    #[derive(Debug, Clone, Validate)]
    pub struct ZstdConfig {
        #[validate(range(min = 1, max = 22, message = "level must be between 1 and 22"))]
        pub level: i32,
    }
}

impl Default for ZstdConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
        }
    }
}

pub struct Zstd;

impl TransformKind for Zstd {
    const NAME: &'static str = "zstd";
    const STAGE: StageType = StageType::Compress;
    type Config = ZstdConfig;

    fn codec(config: &ZstdConfig, group: ModuleGroup) -> Result<Box<dyn ChunkCodec>, ModuleError> {
        Ok(match group {
            ModuleGroup::Backup => Box::new(ZstdEncoder::new(config.level)?),
            ModuleGroup::Restore => Box::new(ZstdDecoder::new()?),
        })
    }
}

pub struct ZstdEncoder {
    inner: Option<zstd::stream::write::Encoder<'static, Vec<u8>>>,
}

impl ZstdEncoder {
    pub fn new(level: i32) -> Result<Self, ModuleError> {
        let inner = zstd::stream::write::Encoder::new(Vec::new(), level)?;
        Ok(Self { inner: Some(inner) })
    }
}

impl ChunkCodec for ZstdEncoder {
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<usize, ModuleError> {
        let encoder = self
            .inner
            .as_mut()
            .ok_or_else(|| ModuleError::codec("zstd encoder already finished"))?;
        encoder.write_all(input)?;
        output.append(encoder.get_mut());
        Ok(input.len())
    }

    fn finish(&mut self, output: &mut Vec<u8>) -> Result<(), ModuleError> {
        let encoder = self
            .inner
            .take()
            .ok_or_else(|| ModuleError::codec("zstd encoder already finished"))?;
        output.extend_from_slice(&encoder.finish()?);
        Ok(())
    }
}

/// Streaming decoder that also detects a stream cut off mid-frame
///
/// Each step emits at most [`OUTPUT_CHUNK`] bytes; input is consumed only
/// as far as the decoder needed to produce them.
pub struct ZstdDecoder {
    inner: zstd::stream::raw::Decoder<'static>,
    buf: Vec<u8>,
    frame_open: bool,
    output_full: bool,
}

impl ZstdDecoder {
    pub fn new() -> Result<Self, ModuleError> {
        Ok(Self {
            inner: zstd::stream::raw::Decoder::new()?,
            buf: vec![0u8; OUTPUT_CHUNK],
            frame_open: false,
            output_full: false,
        })
    }
}

impl ChunkCodec for ZstdDecoder {
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<usize, ModuleError> {
        let (consumed, written, hint) = {
            let mut src = InBuffer::around(input);
            let mut dst = OutBuffer::around(&mut self.buf[..]);
            let hint = self
                .inner
                .run(&mut src, &mut dst)
                .map_err(|e| ModuleError::codec(format!("zstd decompression failed: {e}")))?;
            (src.pos(), dst.pos(), hint)
        };
        output.extend_from_slice(&self.buf[..written]);

        // hint == 0: frame fully decoded and flushed
        self.frame_open = hint != 0;
        // a full buffer may leave decoded bytes inside the decoder
        self.output_full = written == OUTPUT_CHUNK;
        Ok(consumed)
    }

    fn has_pending(&self) -> bool {
        self.output_full
    }

    fn finish(&mut self, _output: &mut Vec<u8>) -> Result<(), ModuleError> {
        if self.frame_open {
            Err(ModuleError::codec("zstd stream truncated mid-frame"))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{run_codec, run_codec_steps};

    fn sample() -> Vec<u8> {
        (0..200_000u32)
            .map(|i| (i % 251) as u8 ^ (i / 1000) as u8)
            .collect()
    }

    #[test]
    fn test_round_trip_in_small_steps() {
        let payload = sample();
        let encoded = run_codec(&mut ZstdEncoder::new(DEFAULT_LEVEL).unwrap(), &payload, 4096)
            .unwrap();
        assert!(encoded.len() < payload.len());

        let decoded = run_codec(&mut ZstdDecoder::new().unwrap(), &encoded, 100).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decoder_output_per_step_is_bounded() {
        // 64 MiB of zeros compresses to a few KiB
        let zeros = vec![0u8; 1 << 20];
        let mut encoder = ZstdEncoder::new(19).unwrap();
        let mut encoded = Vec::new();
        for _ in 0..64 {
            encoder.update(&zeros, &mut encoded).unwrap();
        }
        encoder.finish(&mut encoded).unwrap();
        assert!(encoded.len() < 64 * 1024, "encoded {} bytes", encoded.len());

        let (decoded, largest) =
            run_codec_steps(&mut ZstdDecoder::new().unwrap(), &encoded, encoded.len()).unwrap();
        assert_eq!(decoded.len(), 64 << 20);
        assert!(decoded.iter().all(|&b| b == 0));
        assert!(largest <= OUTPUT_CHUNK, "one step emitted {largest} bytes");
    }

    #[test]
    fn test_pending_output_is_drained_without_new_input() {
        let encoded = run_codec(&mut ZstdEncoder::new(3).unwrap(), &vec![7u8; 200_000], 200_000)
            .unwrap();
        let mut decoder = ZstdDecoder::new().unwrap();
        let mut output = Vec::new();

        let mut consumed = decoder.update(&encoded, &mut output).unwrap();
        assert_eq!(output.len(), OUTPUT_CHUNK);
        assert!(decoder.has_pending());

        while consumed < encoded.len() || decoder.has_pending() {
            consumed += decoder.update(&encoded[consumed..], &mut output).unwrap();
        }
        decoder.finish(&mut output).unwrap();
        assert_eq!(output, vec![7u8; 200_000]);
    }

    #[test]
    fn test_truncated_stream_is_detected() {
        let encoded = run_codec(&mut ZstdEncoder::new(3).unwrap(), &sample(), 65536).unwrap();
        let truncated = &encoded[..encoded.len() / 2];
        let err = run_codec(&mut ZstdDecoder::new().unwrap(), truncated, 4096).unwrap_err();
        assert!(err.to_string().contains("truncated"), "got: {err}");
    }

    #[test]
    fn test_garbage_input_fails() {
        let err = run_codec(&mut ZstdDecoder::new().unwrap(), b"definitely not zstd", 64)
            .unwrap_err();
        assert!(matches!(err, ModuleError::Codec(_)));
    }

    #[test]
    fn test_level_bounds() {
        assert!(ZstdConfig { level: 0 }.validate().is_err());
        assert!(ZstdConfig { level: 23 }.validate().is_err());
        assert!(ZstdConfig { level: 22 }.validate().is_ok());
    }
}
