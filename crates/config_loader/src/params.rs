//! Parameter loading into configuration records
//!
//! Keys are matched against field names case-insensitively, ignoring `_`
//! and `-`, so `block_size`, `blockSize` and `BLOCK-SIZE` all name the same
//! field. The first field whose normalized name matches wins. Keys matching
//! no field are ignored.

use contracts::{ConfigRecord, FieldError, FieldKind, FieldValue, ParamMap, PipelineError};
use tracing::debug;

/// Normalize a key or field name for matching
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Parse a boolean literal
///
/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Coerce one raw value into the declared field kind
pub fn coerce(key: &str, raw: &str, kind: FieldKind) -> Result<FieldValue, PipelineError> {
    let invalid = |reason: String| PipelineError::InvalidParamType {
        key: key.to_string(),
        value: raw.to_string(),
        expected: kind,
        reason,
    };

    match kind {
        FieldKind::String => Ok(FieldValue::String(raw.to_string())),
        FieldKind::Integer => raw
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|e| invalid(e.to_string())),
        FieldKind::Boolean => parse_bool(raw)
            .map(FieldValue::Boolean)
            .ok_or_else(|| invalid("not a boolean literal".into())),
        FieldKind::Float | FieldKind::List => Err(PipelineError::UnsupportedFieldType {
            key: key.to_string(),
            kind,
        }),
    }
}

/// Populate `record` from `params`
///
/// # Errors
/// - [`PipelineError::InvalidParamType`] when a value does not parse as its field kind
/// - [`PipelineError::UnsupportedFieldType`] when a key targets a float or list field
pub fn load_params(record: &mut dyn ConfigRecord, params: &ParamMap) -> Result<(), PipelineError> {
    let fields = record.fields();

    for (key, raw) in params {
        let normalized = normalize_key(key);
        let Some(field) = fields.iter().find(|f| normalize_key(f.name) == normalized) else {
            debug!(key = %key, "Ignoring parameter with no matching field");
            continue;
        };

        let value = coerce(key, raw, field.kind)?;
        record
            .set_field(field.name, value)
            .map_err(|e| map_field_error(key, raw, field.kind, e))?;
    }
    Ok(())
}

fn map_field_error(key: &str, raw: &str, kind: FieldKind, err: FieldError) -> PipelineError {
    match err {
        FieldError::Unsupported(kind) => PipelineError::UnsupportedFieldType {
            key: key.to_string(),
            kind,
        },
        other => PipelineError::InvalidParamType {
            key: key.to_string(),
            value: raw.to_string(),
            expected: kind,
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Secret;

    contracts::config_record! {
        #[derive(Debug, Default)]
        struct CodecConfig {
            level: i32,
            block_size: u32,
            checksum: bool,
            label: String,
            key: Secret,
            ratio: f64,
            tags: Vec<String>,
        }
    }

    fn params(pairs: &[(&str, &str)]) -> ParamMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("block_size"), "blocksize");
        assert_eq!(normalize_key("BlockSize"), "blocksize");
        assert_eq!(normalize_key("BLOCK-SIZE"), "blocksize");
    }

    #[test]
    fn test_integer_param_is_coerced() {
        let mut config = CodecConfig::default();
        load_params(&mut config, &params(&[("level", "9")])).unwrap();
        assert_eq!(config.level, 9);
    }

    #[test]
    fn test_non_numeric_integer_is_rejected() {
        let mut config = CodecConfig::default();
        let err = load_params(&mut config, &params(&[("level", "nine")])).unwrap_err();
        match err {
            PipelineError::InvalidParamType {
                key,
                value,
                expected,
                ..
            } => {
                assert_eq!(key, "level");
                assert_eq!(value, "nine");
                assert_eq!(expected, FieldKind::Integer);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_integer_is_not_trimmed() {
        let mut config = CodecConfig::default();
        assert!(load_params(&mut config, &params(&[("level", " 9")])).is_err());
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let mut config = CodecConfig::default();
        load_params(&mut config, &params(&[("unused_key", "x")])).unwrap();
        assert_eq!(config.level, 0);
        assert!(config.label.is_empty());
    }

    #[test]
    fn test_key_matching_is_normalized() {
        let mut config = CodecConfig::default();
        load_params(
            &mut config,
            &params(&[("BlockSize", "4096"), ("LABEL", "nightly")]),
        )
        .unwrap();
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.label, "nightly");
    }

    #[test]
    fn test_boolean_literals() {
        for raw in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(parse_bool("tRuE"), None);

        let mut config = CodecConfig::default();
        let err = load_params(&mut config, &params(&[("checksum", "yes")])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParamType { .. }));
    }

    #[test]
    fn test_string_is_verbatim() {
        let mut config = CodecConfig::default();
        load_params(&mut config, &params(&[("key", "  pass phrase ")])).unwrap();
        assert_eq!(config.key.expose(), "  pass phrase ");
    }

    #[test]
    fn test_unsupported_kinds() {
        let mut config = CodecConfig::default();
        let err = load_params(&mut config, &params(&[("ratio", "0.5")])).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnsupportedFieldType {
                kind: FieldKind::Float,
                ..
            }
        ));

        let err = load_params(&mut config, &params(&[("tags", "a,b")])).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnsupportedFieldType {
                kind: FieldKind::List,
                ..
            }
        ));
    }

    #[test]
    fn test_out_of_range_is_invalid_param() {
        let mut config = CodecConfig::default();
        let err = load_params(&mut config, &params(&[("block_size", "-1")])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParamType { .. }));
        assert!(err.to_string().contains("does not fit"), "got: {err}");
    }
}
