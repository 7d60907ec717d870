//! JSON decoding of response bodies.
//!
//! [`JsonDecoder`] is the decoder a [`Client`](crate::Client) applies to every
//! response body. [`Keyed`] helps hand-written `Deserialize` impls cope with
//! APIs that send the same field sometimes as a number and sometimes as a
//! string.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::str::FromStr;

/// How object keys are treated before typed decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyDecoding {
    /// Keys are used as sent.
    #[default]
    Verbatim,
    /// `snake_case` keys are converted to `camelCase`.
    FromSnakeCase,
}

/// The JSON decoder used by a client.
///
/// # Examples
///
/// ```
/// use laze::decode::{JsonDecoder, KeyDecoding};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Account {
///     #[serde(rename = "displayName")]
///     display_name: String,
/// }
///
/// let decoder = JsonDecoder::new().key_decoding(KeyDecoding::FromSnakeCase);
/// let account: Account = decoder.decode(br#"{"display_name":"Ann"}"#).unwrap();
/// assert_eq!(account.display_name, "Ann");
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonDecoder {
    keys: KeyDecoding,
}

impl JsonDecoder {
    /// Creates a decoder that uses keys verbatim.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key decoding strategy.
    pub fn key_decoding(mut self, keys: KeyDecoding) -> Self {
        self.keys = keys;
        self
    }

    /// Decodes `bytes` into `T`.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, serde_json::Error> {
        match self.keys {
            KeyDecoding::Verbatim => serde_json::from_slice(bytes),
            KeyDecoding::FromSnakeCase => {
                let value: Value = serde_json::from_slice(bytes)?;
                serde_json::from_value(convert_keys(value))
            }
        }
    }
}

fn convert_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (camel_case(&k), convert_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(convert_keys).collect()),
        other => other,
    }
}

/// Converts a `snake_case` key to `camelCase`, keeping leading and trailing
/// underscores.
fn camel_case(key: &str) -> String {
    let core = key.trim_matches('_');
    if core.is_empty() || !core.contains('_') {
        return key.to_string();
    }
    let leading = &key[..key.len() - key.trim_start_matches('_').len()];
    let trailing = &key[key.trim_end_matches('_').len()..];

    let mut parts = core.split('_').filter(|p| !p.is_empty());
    let mut out = String::with_capacity(key.len());
    out.push_str(leading);
    if let Some(first) = parts.next() {
        out.push_str(&first.to_lowercase());
    }
    for part in parts {
        let mut chars = part.chars();
        if let Some(c) = chars.next() {
            out.extend(c.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    out.push_str(trailing);
    out
}

/// Errors raised while reading fields out of a [`Keyed`] container.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// A required field is absent.
    #[error("missing field `{0}`")]
    MissingField(String),

    /// The field held a string that does not parse into the target type.
    #[error("data corrupted at `{field}`: found string {found:?} that cannot be converted to {target}")]
    DataCorrupted {
        /// Field name
        field: String,
        /// Target type name
        target: &'static str,
        /// The string that was found
        found: String,
    },

    /// The field did not match the target type.
    #[error("invalid type for `{field}`: {source}")]
    TypeMismatch {
        /// Field name
        field: String,
        /// The underlying decode error
        source: serde_json::Error,
    },
}

/// A JSON object read field by field.
///
/// # Examples
///
/// ```
/// use laze::decode::Keyed;
/// use serde::{de, Deserialize, Deserializer};
///
/// struct Stock {
///     count: i64,
///     price: Option<f64>,
/// }
///
/// impl<'de> Deserialize<'de> for Stock {
///     fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
///         let keyed = Keyed::deserialize(deserializer)?;
///         Ok(Stock {
///             count: keyed.unstable("count").map_err(de::Error::custom)?,
///             price: keyed.unstable_optional("price").map_err(de::Error::custom)?,
///         })
///     }
/// }
///
/// let stock: Stock = serde_json::from_str(r#"{"count": "12", "price": null}"#).unwrap();
/// assert_eq!(stock.count, 12);
/// assert_eq!(stock.price, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keyed {
    fields: Map<String, Value>,
}

impl Keyed {
    /// Wraps an already parsed object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Returns `true` if the field is present, even as `null`.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Decodes a required field.
    pub fn decode<T: DeserializeOwned>(&self, key: &str) -> Result<T, DecodeError> {
        let value = self
            .fields
            .get(key)
            .ok_or_else(|| DecodeError::MissingField(key.to_string()))?;
        native(key, value)
    }

    /// Decodes an optional field; missing and `null` both give `None`.
    pub fn decode_optional<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DecodeError> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => native(key, value).map(Some),
        }
    }

    /// Decodes a required field that may arrive either natively or as a
    /// string.
    pub fn unstable<T>(&self, key: &str) -> Result<T, DecodeError>
    where
        T: FromStr + DeserializeOwned,
    {
        let value = self
            .fields
            .get(key)
            .ok_or_else(|| DecodeError::MissingField(key.to_string()))?;
        unstable(key, value)
    }

    /// Optional counterpart of [`unstable`](Keyed::unstable); missing and
    /// `null` both give `None`.
    pub fn unstable_optional<T>(&self, key: &str) -> Result<Option<T>, DecodeError>
    where
        T: FromStr + DeserializeOwned,
    {
        match self.fields.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => unstable(key, value).map(Some),
        }
    }
}

impl<'de> Deserialize<'de> for Keyed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::<String, Value>::deserialize(deserializer).map(Self::new)
    }
}

fn native<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T, DecodeError> {
    T::deserialize(value).map_err(|source| DecodeError::TypeMismatch {
        field: key.to_string(),
        source,
    })
}

fn unstable<T>(key: &str, value: &Value) -> Result<T, DecodeError>
where
    T: FromStr + DeserializeOwned,
{
    match value {
        Value::String(s) => s.parse().map_err(|_| DecodeError::DataCorrupted {
            field: key.to_string(),
            target: std::any::type_name::<T>(),
            found: s.clone(),
        }),
        other => native(key, other),
    }
}
