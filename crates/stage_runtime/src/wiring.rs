//! Pipe wiring
//!
//! n stages get n - 1 pipes. Stage i writes into pipe i and reads from
//! pipe i - 1; the source gets no reader, the sink no writer.

use std::sync::Arc;

use contracts::{
    pipe, PipeReader, PipeWriter, PipelineError, PipelineStage, StageType, StreamStats,
};
use tracing::{debug, instrument};

/// One pipe between two adjacent stages
#[derive(Debug, Clone)]
pub struct StreamLink {
    /// `upstream->downstream`, e.g. `source/stdin->compress/zstd`
    pub label: String,
    pub stats: Arc<StreamStats>,
}

/// Stages bound to their endpoints, ready to run
#[derive(Debug)]
pub struct WiredPipeline {
    pub stages: Vec<PipelineStage>,
    pub streams: Vec<StreamLink>,
}

/// Check the stage list shape: one source first, one sink last, transforms between
pub fn check_shape(stages: &[PipelineStage]) -> Result<(), PipelineError> {
    if !(2..=4).contains(&stages.len()) {
        return Err(PipelineError::config_validation(
            "stages",
            format!("a pipeline needs 2 to 4 stages, got {}", stages.len()),
        ));
    }

    let last = stages.len() - 1;
    for (idx, stage) in stages.iter().enumerate() {
        let expected_ok = match idx {
            0 => stage.stage == StageType::Source,
            i if i == last => stage.stage == StageType::Sink,
            _ => matches!(stage.stage, StageType::Compress | StageType::Encrypt),
        };
        if !expected_ok {
            return Err(PipelineError::config_validation(
                format!("stages[{idx}]"),
                format!("{} cannot occupy position {idx}", stage.label()),
            ));
        }
    }
    Ok(())
}

/// Allocate pipes and bind every stage to its endpoints
///
/// # Errors
/// - [`PipelineError::ConfigValidation`] on an invalid stage list shape
/// - [`PipelineError::BindError`] when a module rejects its endpoints; every
///   endpoint allocated so far is closed on return
#[instrument(name = "stage_runtime_wire", skip(stages), fields(stages = stages.len()))]
pub fn wire(stages: Vec<PipelineStage>, capacity: usize) -> Result<WiredPipeline, PipelineError> {
    check_shape(&stages)?;

    let n = stages.len();
    let mut writers: Vec<Option<PipeWriter>> = Vec::with_capacity(n);
    let mut readers: Vec<Option<PipeReader>> = Vec::with_capacity(n);
    let mut streams = Vec::with_capacity(n - 1);

    readers.push(None);
    for pair in stages.windows(2) {
        let (writer, reader) = pipe(capacity);
        streams.push(StreamLink {
            label: format!("{}->{}", pair[0].label(), pair[1].label()),
            stats: writer.stats(),
        });
        writers.push(Some(writer));
        readers.push(Some(reader));
    }
    writers.push(None);

    let mut bound = Vec::with_capacity(n);
    for ((mut stage, writer), reader) in stages.into_iter().zip(writers).zip(readers) {
        stage
            .module
            .bind_streams(writer, reader)
            .map_err(|source| PipelineError::BindError {
                stage: stage.stage,
                name: stage.name.clone(),
                source,
            })?;
        debug!(stage = %stage.stage, module = %stage.name, "Stage bound");
        bound.push(stage);
    }

    Ok(WiredPipeline {
        stages: bound,
        streams,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{CollectSink, MemorySource, PassThrough};
    use contracts::ModuleError;

    #[test]
    fn test_wire_allocates_n_minus_one_pipes() {
        let (sink, _received) = CollectSink::new();
        let stages = vec![
            PipelineStage::new(Box::new(MemorySource::new(b"abc".to_vec()))),
            PipelineStage::new(Box::new(PassThrough::compress())),
            PipelineStage::new(Box::new(PassThrough::encrypt())),
            PipelineStage::new(Box::new(sink)),
        ];

        let wired = wire(stages, 16).unwrap();
        assert_eq!(wired.stages.len(), 4);
        let labels: Vec<_> = wired.streams.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            [
                "source/memory->compress/passthrough",
                "compress/passthrough->encrypt/passthrough",
                "encrypt/passthrough->sink/collect",
            ]
        );
    }

    #[test]
    fn test_two_stage_pipeline_is_legal() {
        let (sink, _received) = CollectSink::new();
        let stages = vec![
            PipelineStage::new(Box::new(MemorySource::new(Vec::new()))),
            PipelineStage::new(Box::new(sink)),
        ];
        let wired = wire(stages, 16).unwrap();
        assert_eq!(wired.streams.len(), 1);
    }

    #[test]
    fn test_shape_errors() {
        let (sink, _received) = CollectSink::new();
        let err = wire(vec![PipelineStage::new(Box::new(sink))], 16).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigValidation { .. }));

        let (sink, _received) = CollectSink::new();
        let err = wire(
            vec![
                PipelineStage::new(Box::new(sink)),
                PipelineStage::new(Box::new(MemorySource::new(Vec::new()))),
            ],
            16,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot occupy position 0"), "got: {err}");
    }

    #[test]
    fn test_bind_failure_is_bind_error() {
        let (sink, _received) = CollectSink::new();
        let stages = vec![
            PipelineStage::new(Box::new(MemorySource::new(Vec::new()))),
            PipelineStage::new(Box::new(PassThrough::compress().reject_bind())),
            PipelineStage::new(Box::new(sink)),
        ];

        match wire(stages, 16).unwrap_err() {
            PipelineError::BindError { stage, name, source } => {
                assert_eq!(stage, StageType::Compress);
                assert_eq!(name, "passthrough");
                assert!(matches!(source, ModuleError::Other(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
