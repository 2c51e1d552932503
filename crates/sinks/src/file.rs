//! FileSink - writes the stream to a local file
//!
//! A fresh file is written under a `.partial` name and renamed into place
//! once the stream ends cleanly. In append mode the file is cut back to its
//! previous length instead. Either way a failed run leaves no truncated
//! archive behind.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use contracts::{
    bind_sink, downcast_config, ConfigRecord, Module, ModuleError, PipeReader, PipeWriter,
    StageType,
};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};
use validator::Validate;

contracts::config_record! {
    #[derive(Debug, Clone, Default, Validate)]
    pub struct FileSinkConfig {
        #[validate(length(min = 1, message = "path is required"))]
        pub path: String,
        /// Append instead of truncating an existing file
        pub append: bool,
        /// Create missing parent directories
        pub create_dirs: bool,
        /// `fsync` the file before reporting success
        pub fsync: bool,
    }
}

/// Sink writing the stream to disk
#[derive(Default)]
pub struct FileSink {
    config: FileSinkConfig,
    reader: Option<PipeReader>,
}

impl FileSink {
    pub fn new() -> Self {
        Self::default()
    }

    async fn prepare_parent(path: &Path) -> std::io::Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).await?;
                debug!(dir = %parent.display(), "Created output directory");
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Module for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn stage_type(&self) -> StageType {
        StageType::Sink
    }

    fn default_config(&self) -> Box<dyn ConfigRecord> {
        Box::new(FileSinkConfig::default())
    }

    fn apply_config(&mut self, config: Box<dyn ConfigRecord>) -> Result<(), ModuleError> {
        let config: FileSinkConfig = downcast_config(config)?;
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
        let path = PathBuf::from(&self.config.path);

        if self.config.create_dirs {
            Self::prepare_parent(&path).await?;
        }

        if self.config.append {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            let original_len = file.metadata().await?.len();
            let mut out = BufWriter::new(file);
            match write_stream(reader, &mut out, self.config.fsync).await {
                Ok(bytes) => {
                    info!(path = %path.display(), bytes, append = true, "File written");
                    Ok(())
                }
                Err(e) => {
                    let _ = out.flush().await;
                    if let Err(cut) = out.get_ref().set_len(original_len).await {
                        warn!(path = %path.display(), error = %cut, "Could not roll back appended bytes");
                    }
                    Err(e)
                }
            }
        } else {
            let partial = partial_path(&path);
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&partial)
                .await?;
            let mut out = BufWriter::new(file);
            match write_stream(reader, &mut out, self.config.fsync).await {
                Ok(bytes) => {
                    drop(out);
                    fs::rename(&partial, &path).await?;
                    info!(path = %path.display(), bytes, append = false, "File written");
                    Ok(())
                }
                Err(e) => {
                    drop(out);
                    if let Err(rm) = fs::remove_file(&partial).await {
                        warn!(path = %partial.display(), error = %rm, "Could not remove partial file");
                    }
                    Err(e)
                }
            }
        }
    }
}

/// Copy the whole stream into `out` and make it durable if asked
async fn write_stream(
    reader: &mut PipeReader,
    out: &mut BufWriter<File>,
    fsync: bool,
) -> Result<u64, ModuleError> {
    let bytes = tokio::io::copy(reader, out).await?;
    out.flush().await?;
    if fsync {
        out.get_ref().sync_all().await?;
    }
    Ok(bytes)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
