use contracts::{pipe, Module, ModuleError};
use tokio::io::AsyncReadExt;

/// Run a source against a fresh pipe and collect everything it writes
pub async fn drain_source(module: Box<dyn Module>) -> (Result<(), ModuleError>, Vec<u8>) {
    let (result, received, _) = drain_source_with_end(module).await;
    (result, received)
}

/// Like [`drain_source`], also returning how the reader saw the stream end
pub async fn drain_source_with_end(
    mut module: Box<dyn Module>,
) -> (Result<(), ModuleError>, Vec<u8>, std::io::Result<usize>) {
    let (writer, mut reader) = pipe(1024);
    module.bind_streams(Some(writer), None).unwrap();

    let task = tokio::spawn(async move {
        let result = module.run().await;
        drop(module);
        result
    });

    // a failed source aborts the stream; keep whatever arrived before that
    let mut received = Vec::new();
    let end = reader.read_to_end(&mut received).await;
    (task.await.unwrap(), received, end)
}
