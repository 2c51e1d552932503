use contracts::{pipe, Module, ModuleError};
use tokio::io::AsyncWriteExt;

/// Bind a sink to a fresh pipe, stream `payload` into it and run it
pub async fn feed_sink(module: &mut dyn Module, payload: Vec<u8>) -> Result<(), ModuleError> {
    let (mut writer, reader) = pipe(1024);
    module.bind_streams(None, Some(reader)).unwrap();

    // The sink may stop reading early, so producer errors are expected
    let producer = tokio::spawn(async move {
        let _ = writer.write_all(&payload).await;
        let _ = writer.shutdown().await;
    });

    let result = module.run().await;
    producer.abort();
    result
}

/// Like [`feed_sink`], but the producer drops its writer without finishing
/// the stream, as a failed upstream stage does
pub async fn feed_sink_aborted(
    module: &mut dyn Module,
    payload: Vec<u8>,
) -> Result<(), ModuleError> {
    let (mut writer, reader) = pipe(1024);
    module.bind_streams(None, Some(reader)).unwrap();

    let producer = tokio::spawn(async move {
        let _ = writer.write_all(&payload).await;
        drop(writer);
    });

    let result = module.run().await;
    producer.abort();
    result
}
