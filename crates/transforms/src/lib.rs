//! # Transforms
//!
//! Built-in compress and encrypt stages. Every transform registers an
//! encoding variant under the `backup` group and a decoding variant under
//! `restore`, with the same name and stage slot:
//!
//! | name     | slot     | format                                   |
//! |----------|----------|------------------------------------------|
//! | `lz4`    | compress | length-prefixed LZ4 blocks               |
//! | `zstd`   | compress | Zstandard stream                         |
//! | `aesgcm` | encrypt  | AES-256-GCM sealed frames                |

mod codec;
mod compress_lz4;
mod compress_zstd;
mod encrypt_aesgcm;

pub use codec::{ChunkCodec, TransformKind, TransformModule, MAX_STEP_OUTPUT, READ_CHUNK_SIZE};
pub use compress_lz4::{Lz4, Lz4Config, Lz4Decoder, Lz4Encoder};
pub use compress_zstd::{Zstd, ZstdConfig, ZstdDecoder, ZstdEncoder};
pub use encrypt_aesgcm::{AesGcm, AesGcmConfig, OpenDecoder, SealEncoder};

use contracts::ModuleGroup;
use module_registry::ModuleRegistry;

pub type Lz4Module = TransformModule<Lz4>;
pub type ZstdModule = TransformModule<Zstd>;
pub type AesGcmModule = TransformModule<AesGcm>;

/// Register every built-in transform, encoders under `backup` and
/// decoders under `restore`
pub fn register(registry: &mut ModuleRegistry) {
    for group in ModuleGroup::ALL {
        registry.register_fn(group, move || Lz4Module::new(group));
        registry.register_fn(group, move || ZstdModule::new(group));
        registry.register_fn(group, move || AesGcmModule::new(group));
    }
}
