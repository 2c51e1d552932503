//! Selector parsing
//!
//! Grammar: `name` or `name::key=value::key2=value2...`
//! - the first `=` of a segment separates key from value; values may contain `=`
//! - duplicate keys: last occurrence wins
//! - a segment without `=` is rejected rather than truncated

use contracts::{ParamMap, PipelineError, Selector};

/// Separator between the module name and each parameter segment
pub const SEGMENT_SEPARATOR: &str = "::";

/// Parse a selector string into module name and parameters
///
/// # Errors
/// [`PipelineError::MalformedSpec`] on an empty name, an empty key, or a
/// parameter segment missing its `=` separator
pub fn parse_selector(input: &str) -> Result<Selector, PipelineError> {
    let mut segments = input.trim().split(SEGMENT_SEPARATOR);

    let name = segments.next().unwrap_or_default().trim();
    if name.is_empty() {
        return Err(PipelineError::malformed_spec(input, "module name is empty"));
    }

    let mut params = ParamMap::new();
    for segment in segments {
        let Some((key, value)) = segment.split_once('=') else {
            return Err(PipelineError::malformed_spec(
                input,
                format!("parameter '{segment}' is missing a value (expected key=value)"),
            ));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(PipelineError::malformed_spec(
                input,
                format!("parameter '{segment}' has an empty key"),
            ));
        }

        params.insert(key.to_string(), value.to_string());
    }

    Ok(Selector {
        name: name.to_string(),
        params,
    })
}

/// Parse an optional selector; absent or blank input means "stage not requested"
pub fn parse_optional_selector(input: Option<&str>) -> Result<Option<Selector>, PipelineError> {
    match input.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_selector(raw).map(Some),
    }
}
