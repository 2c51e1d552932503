//! Selector and PipelineRequest - Config Loader output
//!
//! A selector names one module plus its raw string parameters. A request
//! groups the selectors of one pipeline run.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::{ModuleGroup, StageType};

/// Raw parameter map (`key -> value`)
pub type ParamMap = BTreeMap<String, String>;

/// Parsed module selector (`name::key=value::...`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Selector {
    pub name: String,
    pub params: ParamMap,
}

impl Selector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: ParamMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add parameters that are not already present
    pub fn merge_missing(&mut self, params: &ParamMap) {
        for (key, value) in params {
            self.params
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

impl fmt::Display for Selector {
    /// Parameter values are omitted, they may carry credentials
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for key in self.params.keys() {
            write!(f, "::{key}=…")?;
        }
        Ok(())
    }
}

/// Selectors for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineRequest {
    pub group: ModuleGroup,
    pub source: Selector,
    pub compress: Option<Selector>,
    pub encrypt: Option<Selector>,
    pub sink: Selector,
}

impl PipelineRequest {
    pub fn new(group: ModuleGroup, source: Selector, sink: Selector) -> Self {
        Self {
            group,
            source,
            compress: None,
            encrypt: None,
            sink,
        }
    }

    pub fn with_compress(mut self, selector: Selector) -> Self {
        self.compress = Some(selector);
        self
    }

    pub fn with_encrypt(mut self, selector: Selector) -> Self {
        self.encrypt = Some(selector);
        self
    }

    /// Selector occupying a stage slot, if present
    pub fn selector(&self, stage: StageType) -> Option<&Selector> {
        match stage {
            StageType::Source => Some(&self.source),
            StageType::Compress => self.compress.as_ref(),
            StageType::Encrypt => self.encrypt.as_ref(),
            StageType::Sink => Some(&self.sink),
        }
    }

    pub fn selector_mut(&mut self, stage: StageType) -> Option<&mut Selector> {
        match stage {
            StageType::Source => Some(&mut self.source),
            StageType::Compress => self.compress.as_mut(),
            StageType::Encrypt => self.encrypt.as_mut(),
            StageType::Sink => Some(&mut self.sink),
        }
    }

    /// Present stages in execution order, gaps removed
    pub fn ordered_stages(&self) -> Vec<(StageType, &Selector)> {
        self.group
            .stage_order()
            .into_iter()
            .filter_map(|stage| self.selector(stage).map(|selector| (stage, selector)))
            .collect()
    }
}
