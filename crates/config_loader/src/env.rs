//! Stage parameters from the environment
//!
//! `BACKPIPE_<STAGE>_<KEY>=value` contributes `key=value` to that stage.
//! Selector parameters take precedence over environment parameters.

use contracts::{ParamMap, PipelineRequest, StageType};
use tracing::debug;

/// Prefix shared by every backpipe environment variable
pub const ENV_PREFIX: &str = "BACKPIPE";

/// Environment prefix for one stage, e.g. `BACKPIPE_ENCRYPT_`
pub fn stage_env_prefix(stage: StageType) -> String {
    format!("{ENV_PREFIX}_{}_", stage.as_str().to_uppercase())
}

/// Collect parameters carrying `prefix` from `vars`
///
/// Keys are lowercased; empty keys are skipped.
pub fn params_from_env<I, K, V>(vars: I, prefix: &str) -> ParamMap
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    vars.into_iter()
        .filter_map(|(name, value)| {
            let key = name.as_ref().strip_prefix(prefix)?;
            (!key.is_empty()).then(|| (key.to_lowercase(), value.into()))
        })
        .collect()
}

/// Merge environment parameters into every present stage of `request`
pub fn apply_env_params<I>(request: &mut PipelineRequest, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(name, _)| name.starts_with(ENV_PREFIX))
        .collect();

    for stage in request.group.stage_order() {
        let prefix = stage_env_prefix(stage);
        let Some(selector) = request.selector_mut(stage) else {
            continue;
        };
        let params = params_from_env(vars.iter().map(|(k, v)| (k, v.clone())), &prefix);
        if !params.is_empty() {
            debug!(stage = %stage, count = params.len(), "Merging environment parameters");
            selector.merge_missing(&params);
        }
    }
}
