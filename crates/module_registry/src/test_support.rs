//! Stub module for registry and builder tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use contracts::{
    bind_sink, bind_source, bind_transform, downcast_config, ConfigRecord, Module, ModuleError,
    PipeReader, PipeWriter, StageType,
};

contracts::config_record! {
    #[derive(Debug, Default)]
    pub struct StubConfig {
        pub level: i32,
        pub marker: String,
        pub ratio: f64,
    }
}

/// Applied `(name, level)` pairs, in apply order
pub type ApplyLog = Arc<Mutex<Vec<(String, i32)>>>;

pub struct StubModule {
    stage: StageType,
    name: String,
    marker: String,
    log: Option<ApplyLog>,
}

impl StubModule {
    pub fn new(stage: StageType, name: &str) -> Self {
        Self {
            stage,
            name: name.to_string(),
            marker: String::new(),
            log: None,
        }
    }

    pub fn with_marker(mut self, marker: &str) -> Self {
        self.marker = marker.to_string();
        self
    }

    pub fn with_log(mut self, log: ApplyLog) -> Self {
        self.log = Some(log);
        self
    }
}

#[async_trait]
impl Module for StubModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn stage_type(&self) -> StageType {
        self.stage
    }

    fn default_config(&self) -> Box<dyn ConfigRecord> {
        Box::new(StubConfig {
            marker: self.marker.clone(),
            ..Default::default()
        })
    }

    fn apply_config(&mut self, config: Box<dyn ConfigRecord>) -> Result<(), ModuleError> {
        let config: StubConfig = downcast_config(config)?;
        if config.level < 0 {
            return Err(ModuleError::InvalidConfig("level must be >= 0".into()));
        }
        if let Some(log) = &self.log {
            log.lock()
                .map_err(|_| ModuleError::Other("apply log poisoned".into()))?
                .push((self.name.clone(), config.level));
        }
        Ok(())
    }

    fn bind_streams(
        &mut self,
        writer: Option<PipeWriter>,
        reader: Option<PipeReader>,
    ) -> Result<(), ModuleError> {
        match self.stage {
            StageType::Source => bind_source(writer, reader).map(drop),
            StageType::Sink => bind_sink(writer, reader).map(drop),
            _ => bind_transform(writer, reader).map(drop),
        }
    }

    async fn run(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
}
