//! `aesgcm` - AES-256-GCM authenticated encryption in sealed frames
//!
//! Stream layout:
//! ```text
//! "BPG1" | nonce prefix (7) | frame* | final frame
//! frame = u32 BE header (bit 31: final, bits 0..31: ciphertext length) | ciphertext
//! ```
//! The nonce of frame `i` is `prefix | i as u32 BE | final flag`, so
//! reordered, dropped or re-flagged frames fail authentication. Exactly
//! one final frame closes the stream; anything after it is rejected.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use contracts::{ModuleError, ModuleGroup, Secret, StageType};
use sha2::{Digest, Sha256};
use validator::Validate;

use crate::codec::{ChunkCodec, TransformKind};

pub const MAGIC: &[u8; 4] = b"BPG1";
pub const NONCE_PREFIX_LEN: usize = 7;
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

const HEADER_LEN: usize = MAGIC.len() + NONCE_PREFIX_LEN;
const FRAME_HEADER_LEN: usize = 4;
const TAG_LEN: usize = 16;
const FINAL_FLAG: u32 = 1 << 31;
const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

contracts::config_record! {
    #[derive(Debug, Clone, Validate)]
    pub struct AesGcmConfig {
        /// Passphrase; the cipher key is its SHA-256 digest
        pub key: Secret,
        #[validate(range(min = 1, max = 16777216, message = "chunk_size must be between 1 and 16 MiB"))]
        pub chunk_size: usize,
    }
}

impl Default for AesGcmConfig {
    fn default() -> Self {
        Self {
            key: Secret::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

pub struct AesGcm;

impl TransformKind for AesGcm {
    const NAME: &'static str = "aesgcm";
    const STAGE: StageType = StageType::Encrypt;
    type Config = AesGcmConfig;

    fn check(config: &AesGcmConfig) -> Result<(), ModuleError> {
        if config.key.is_empty() {
            return Err(ModuleError::InvalidConfig("key is required".into()));
        }
        Ok(())
    }

    fn codec(config: &AesGcmConfig, group: ModuleGroup) -> Result<Box<dyn ChunkCodec>, ModuleError> {
        let cipher = derive_cipher(&config.key)?;
        Ok(match group {
            ModuleGroup::Backup => Box::new(SealEncoder::new(cipher, config.chunk_size)),
            ModuleGroup::Restore => Box::new(OpenDecoder::new(cipher)),
        })
    }
}

fn derive_cipher(key: &Secret) -> Result<Aes256Gcm, ModuleError> {
    let digest = Sha256::digest(key.expose().as_bytes());
    Aes256Gcm::new_from_slice(&digest).map_err(|e| ModuleError::codec(format!("invalid key: {e}")))
}

fn nonce_bytes(prefix: &[u8; NONCE_PREFIX_LEN], counter: u32, last: bool) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[..NONCE_PREFIX_LEN].copy_from_slice(prefix);
    nonce[NONCE_PREFIX_LEN..NONCE_PREFIX_LEN + 4].copy_from_slice(&counter.to_be_bytes());
    nonce[11] = u8::from(last);
    nonce
}

pub struct SealEncoder {
    cipher: Aes256Gcm,
    chunk_size: usize,
    prefix: [u8; NONCE_PREFIX_LEN],
    counter: u32,
    header_written: bool,
    pending: Vec<u8>,
}

impl SealEncoder {
    pub fn new(cipher: Aes256Gcm, chunk_size: usize) -> Self {
        Self::with_prefix(cipher, chunk_size, rand::random())
    }

    fn with_prefix(cipher: Aes256Gcm, chunk_size: usize, prefix: [u8; NONCE_PREFIX_LEN]) -> Self {
        Self {
            cipher,
            chunk_size,
            prefix,
            counter: 0,
            header_written: false,
            pending: Vec::new(),
        }
    }

    fn write_header(&mut self, output: &mut Vec<u8>) {
        if !self.header_written {
            output.extend_from_slice(MAGIC);
            output.extend_from_slice(&self.prefix);
            self.header_written = true;
        }
    }

    fn seal(&mut self, plaintext: &[u8], last: bool, output: &mut Vec<u8>) -> Result<(), ModuleError> {
        let nonce = nonce_bytes(&self.prefix, self.counter, last);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| ModuleError::codec("aes-gcm encryption failed"))?;

        let mut header = ciphertext.len() as u32;
        if last {
            header |= FINAL_FLAG;
        }
        output.extend_from_slice(&header.to_be_bytes());
        output.extend_from_slice(&ciphertext);

        self.counter = self
            .counter
            .checked_add(1)
            .ok_or_else(|| ModuleError::codec("aes-gcm frame counter exhausted"))?;
        Ok(())
    }
}

impl ChunkCodec for SealEncoder {
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<usize, ModuleError> {
        self.write_header(output);
        self.pending.extend_from_slice(input);

        // Keep at least one byte back so the final frame is never empty
        // unless the whole payload is.
        let mut offset = 0;
        while self.pending.len() - offset > self.chunk_size {
            let chunk = self.pending[offset..offset + self.chunk_size].to_vec();
            self.seal(&chunk, false, output)?;
            offset += self.chunk_size;
        }
        self.pending.drain(..offset);
        Ok(input.len())
    }

    fn finish(&mut self, output: &mut Vec<u8>) -> Result<(), ModuleError> {
        self.write_header(output);
        let rest = std::mem::take(&mut self.pending);
        self.seal(&rest, true, output)
    }
}

pub struct OpenDecoder {
    cipher: Aes256Gcm,
    prefix: Option<[u8; NONCE_PREFIX_LEN]>,
    counter: u32,
    finished: bool,
    pending: Vec<u8>,
}

impl OpenDecoder {
    pub fn new(cipher: Aes256Gcm) -> Self {
        Self {
            cipher,
            prefix: None,
            counter: 0,
            finished: false,
            pending: Vec::new(),
        }
    }

    /// Parse the stream header; returns bytes consumed (0 if incomplete)
    fn read_header(&mut self) -> Result<usize, ModuleError> {
        if self.pending.len() < HEADER_LEN {
            return Ok(0);
        }
        if &self.pending[..MAGIC.len()] != MAGIC {
            return Err(ModuleError::codec("not an aesgcm stream (bad magic)"));
        }
        let mut prefix = [0u8; NONCE_PREFIX_LEN];
        prefix.copy_from_slice(&self.pending[MAGIC.len()..HEADER_LEN]);
        self.prefix = Some(prefix);
        Ok(HEADER_LEN)
    }
}

impl ChunkCodec for OpenDecoder {
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<usize, ModuleError> {
        if self.finished && !input.is_empty() {
            return Err(ModuleError::codec("trailing data after final aesgcm frame"));
        }
        self.pending.extend_from_slice(input);

        let mut offset = 0;
        let prefix = match self.prefix {
            Some(prefix) => prefix,
            None => {
                offset = self.read_header()?;
                match self.prefix {
                    Some(prefix) => prefix,
                    None => return Ok(input.len()),
                }
            }
        };

        while self.pending.len() - offset >= FRAME_HEADER_LEN {
            if self.finished {
                return Err(ModuleError::codec("trailing data after final aesgcm frame"));
            }
            let mut raw = [0u8; FRAME_HEADER_LEN];
            raw.copy_from_slice(&self.pending[offset..offset + FRAME_HEADER_LEN]);
            let header = u32::from_be_bytes(raw);
            let last = header & FINAL_FLAG != 0;
            let len = (header & !FINAL_FLAG) as usize;
            if !(TAG_LEN..=MAX_CHUNK_SIZE + TAG_LEN).contains(&len) {
                return Err(ModuleError::codec(format!("invalid aesgcm frame length {len}")));
            }

            let start = offset + FRAME_HEADER_LEN;
            if self.pending.len() - start < len {
                break;
            }
            let nonce = nonce_bytes(&prefix, self.counter, last);
            let plaintext = self
                .cipher
                .decrypt(Nonce::from_slice(&nonce), &self.pending[start..start + len])
                .map_err(|_| {
                    ModuleError::codec(format!(
                        "aesgcm authentication failed at frame {} (wrong key or corrupted data)",
                        self.counter
                    ))
                })?;
            output.extend_from_slice(&plaintext);

            offset = start + len;
            self.counter = self.counter.wrapping_add(1);
            self.finished = last;
        }

        if self.finished && offset < self.pending.len() {
            return Err(ModuleError::codec("trailing data after final aesgcm frame"));
        }
        self.pending.drain(..offset);
        Ok(input.len())
    }

    fn finish(&mut self, _output: &mut Vec<u8>) -> Result<(), ModuleError> {
        if self.finished {
            Ok(())
        } else {
            Err(ModuleError::codec("aesgcm stream truncated: final frame missing"))
        }
    }
}
