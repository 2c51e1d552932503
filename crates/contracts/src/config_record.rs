//! ConfigRecord - key-based configuration contract
//!
//! The orchestrator has no compile-time knowledge of a module's configuration
//! shape. Every record instead exposes its field table ([`ConfigRecord::fields`])
//! and a typed setter ([`ConfigRecord::set_field`]); the config loader coerces
//! raw parameter strings into [`FieldValue`]s using the declared [`FieldKind`].
//!
//! Records are usually declared with [`config_record!`](crate::config_record),
//! which derives both from the struct definition.

use std::any::Any;
use std::fmt;

use serde::Serialize;

/// Declared kind of a configuration field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
    Float,
    List,
}

impl FieldKind {
    /// Kinds the loader can populate from a parameter string
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::String | Self::Integer | Self::Boolean)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Float => "float",
            Self::List => "list",
        };
        f.write_str(name)
    }
}

/// Field table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// Coerced parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::String(_) => FieldKind::String,
            Self::Integer(_) => FieldKind::Integer,
            Self::Boolean(_) => FieldKind::Boolean,
        }
    }
}

/// Setter-level failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// No field with this name
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// Value kind differs from the field kind
    #[error("expected {expected} value, got {found}")]
    KindMismatch { expected: FieldKind, found: FieldKind },

    /// Integer does not fit the field's width
    #[error("{0}")]
    OutOfRange(String),

    /// Field kind cannot be set from a parameter
    #[error("fields of kind '{0}' cannot be set from parameters")]
    Unsupported(FieldKind),
}

/// Field types usable inside a [`ConfigRecord`]
pub trait ConfigField {
    const KIND: FieldKind;

    fn assign(&mut self, value: FieldValue) -> Result<(), FieldError>;
}

impl ConfigField for String {
    const KIND: FieldKind = FieldKind::String;

    fn assign(&mut self, value: FieldValue) -> Result<(), FieldError> {
        match value {
            FieldValue::String(s) => {
                *self = s;
                Ok(())
            }
            other => Err(FieldError::KindMismatch {
                expected: Self::KIND,
                found: other.kind(),
            }),
        }
    }
}

impl ConfigField for bool {
    const KIND: FieldKind = FieldKind::Boolean;

    fn assign(&mut self, value: FieldValue) -> Result<(), FieldError> {
        match value {
            FieldValue::Boolean(b) => {
                *self = b;
                Ok(())
            }
            other => Err(FieldError::KindMismatch {
                expected: Self::KIND,
                found: other.kind(),
            }),
        }
    }
}

macro_rules! impl_integer_field {
    ($($t:ty),* $(,)?) => {
        $(
            impl ConfigField for $t {
                const KIND: FieldKind = FieldKind::Integer;

                fn assign(&mut self, value: FieldValue) -> Result<(), FieldError> {
                    match value {
                        FieldValue::Integer(v) => {
                            *self = <$t>::try_from(v).map_err(|_| {
                                FieldError::OutOfRange(format!(
                                    "{v} does not fit in {}",
                                    stringify!($t)
                                ))
                            })?;
                            Ok(())
                        }
                        other => Err(FieldError::KindMismatch {
                            expected: Self::KIND,
                            found: other.kind(),
                        }),
                    }
                }
            }
        )*
    };
}

impl_integer_field!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl ConfigField for f64 {
    const KIND: FieldKind = FieldKind::Float;

    fn assign(&mut self, _value: FieldValue) -> Result<(), FieldError> {
        Err(FieldError::Unsupported(Self::KIND))
    }
}

impl ConfigField for Vec<String> {
    const KIND: FieldKind = FieldKind::List;

    fn assign(&mut self, _value: FieldValue) -> Result<(), FieldError> {
        Err(FieldError::Unsupported(Self::KIND))
    }
}

impl<T: ConfigField + Default> ConfigField for Option<T> {
    const KIND: FieldKind = T::KIND;

    fn assign(&mut self, value: FieldValue) -> Result<(), FieldError> {
        let mut inner = T::default();
        inner.assign(value)?;
        *self = Some(inner);
        Ok(())
    }
}

/// String field whose value never appears in logs
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("\"\"")
        } else {
            f.write_str("***")
        }
    }
}

impl ConfigField for Secret {
    const KIND: FieldKind = FieldKind::String;

    fn assign(&mut self, value: FieldValue) -> Result<(), FieldError> {
        self.0.assign(value)
    }
}

/// Per-module configuration record
pub trait ConfigRecord: fmt::Debug + Send + 'static {
    /// Field table, in declaration order
    fn fields(&self) -> &'static [FieldSpec];

    /// Set one field by its declared name
    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), FieldError>;

    /// Type-erased owned record, used by modules to recover their concrete type
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// Recover a module's concrete configuration type from a boxed record
pub fn downcast_config<T: ConfigRecord>(
    config: Box<dyn ConfigRecord>,
) -> Result<T, crate::ModuleError> {
    config
        .into_any()
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| crate::ModuleError::ConfigMismatch {
            expected: std::any::type_name::<T>(),
        })
}

/// Declare a configuration struct and derive its [`ConfigRecord`] implementation
///
/// Attributes on the struct and on each field are passed through, so derives
/// such as `Debug`, `Default` and `validator::Validate` compose with it.
///
/// # Usage
/// ```
/// contracts::config_record! {
///     #[derive(Debug, Default)]
///     pub struct ZstdConfig {
///         pub level: i32,
///         pub checksum: bool,
///     }
/// }
/// ```
#[macro_export]
macro_rules! config_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::ConfigRecord for $name {
            fn fields(&self) -> &'static [$crate::FieldSpec] {
                const FIELDS: &[$crate::FieldSpec] = &[
                    $(
                        $crate::FieldSpec {
                            name: stringify!($field),
                            kind: <$ty as $crate::ConfigField>::KIND,
                        },
                    )*
                ];
                FIELDS
            }

            #[allow(unused_variables)]
            fn set_field(
                &mut self,
                field: &str,
                value: $crate::FieldValue,
            ) -> ::std::result::Result<(), $crate::FieldError> {
                match field {
                    $(
                        stringify!($field) => $crate::ConfigField::assign(&mut self.$field, value),
                    )*
                    other => Err($crate::FieldError::UnknownField(other.to_string())),
                }
            }

            fn into_any(self: Box<Self>) -> Box<dyn ::std::any::Any + Send> {
                self
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    config_record! {
        #[derive(Debug, Default)]
        struct SampleConfig {
            name: String,
            level: u8,
            verbose: bool,
            ratio: f64,
            token: Secret,
            label: Option<String>,
        }
    }

    #[test]
    fn test_field_table_follows_declaration() {
        let config = SampleConfig::default();
        let names: Vec<_> = config.fields().iter().map(|f| f.name).collect();
        assert_eq!(names, ["name", "level", "verbose", "ratio", "token", "label"]);
        assert_eq!(config.fields()[1].kind, FieldKind::Integer);
        assert_eq!(config.fields()[3].kind, FieldKind::Float);
        assert_eq!(config.fields()[4].kind, FieldKind::String);
    }

    #[test]
    fn test_set_supported_fields() {
        let mut config = SampleConfig::default();
        config
            .set_field("name", FieldValue::String("db".into()))
            .unwrap();
        config.set_field("level", FieldValue::Integer(9)).unwrap();
        config
            .set_field("verbose", FieldValue::Boolean(true))
            .unwrap();
        config
            .set_field("label", FieldValue::String("nightly".into()))
            .unwrap();
        assert_eq!(config.name, "db");
        assert_eq!(config.level, 9);
        assert!(config.verbose);
        assert_eq!(config.label.as_deref(), Some("nightly"));
    }

    #[test]
    fn test_integer_out_of_range() {
        let mut config = SampleConfig::default();
        let err = config.set_field("level", FieldValue::Integer(300)).unwrap_err();
        assert!(matches!(err, FieldError::OutOfRange(_)));
        assert_eq!(config.level, 0);
    }

    #[test]
    fn test_unsupported_and_unknown_fields() {
        let mut config = SampleConfig::default();
        assert_eq!(
            config.set_field("ratio", FieldValue::String("0.5".into())),
            Err(FieldError::Unsupported(FieldKind::Float))
        );
        assert!(matches!(
            config.set_field("missing", FieldValue::Boolean(true)),
            Err(FieldError::UnknownField(_))
        ));
    }

    #[test]
    fn test_secret_is_masked() {
        let mut config = SampleConfig::default();
        config
            .set_field("token", FieldValue::String("hunter2".into()))
            .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"), "got: {rendered}");
        assert_eq!(config.token.expose(), "hunter2");
    }

    #[test]
    fn test_downcast_config() {
        let boxed: Box<dyn ConfigRecord> = Box::new(SampleConfig {
            level: 3,
            ..Default::default()
        });
        let config: SampleConfig = downcast_config(boxed).unwrap();
        assert_eq!(config.level, 3);
    }
}
