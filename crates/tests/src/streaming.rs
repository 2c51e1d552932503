//! Stream behaviour across stage boundaries

use std::time::Duration;

use contracts::PipelineStage;
use stage_runtime::mock::{CollectSink, MemorySource, PassThrough};
use stage_runtime::CoordinatorConfig;

use crate::support::{payload, run_stages};

#[tokio::test]
async fn test_slow_sink_applies_backpressure_without_loss() {
    let data = payload(256 * 1024);
    let (sink, received) = CollectSink::new();
    let stages = vec![
        PipelineStage::new(Box::new(MemorySource::new(data.clone()).with_chunk_size(8192))),
        PipelineStage::new(Box::new(PassThrough::compress())),
        PipelineStage::new(Box::new(PassThrough::encrypt())),
        PipelineStage::new(Box::new(sink.slow(4096, Duration::from_millis(1)))),
    ];

    let report = run_stages(stages, 1024, CoordinatorConfig::default())
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(*received.lock().await, data);

    assert_eq!(report.streams.len(), 3);
    for stream in &report.streams {
        assert_eq!(stream.bytes_written, data.len() as u64, "{}", stream.label);
        assert_eq!(stream.bytes_read, data.len() as u64, "{}", stream.label);
    }
}

#[tokio::test]
async fn test_empty_input_closes_every_stage() {
    let (sink, received) = CollectSink::new();
    let stages = vec![
        PipelineStage::new(Box::new(MemorySource::new(Vec::new()))),
        PipelineStage::new(Box::new(PassThrough::compress())),
        PipelineStage::new(Box::new(PassThrough::encrypt())),
        PipelineStage::new(Box::new(sink)),
    ];

    let report = run_stages(stages, 64, CoordinatorConfig::default())
        .await
        .unwrap();
    assert!(report.is_success());
    assert!(received.lock().await.is_empty());
    assert!(report.duration < Duration::from_secs(5));
}

#[tokio::test]
async fn test_two_stage_pipeline_completes() {
    let data = payload(10_000);
    let (sink, received) = CollectSink::new();
    let stages = vec![
        PipelineStage::new(Box::new(MemorySource::new(data.clone()).with_chunk_size(333))),
        PipelineStage::new(Box::new(sink)),
    ];

    let report = run_stages(stages, 128, CoordinatorConfig::default())
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(*received.lock().await, data);
}
