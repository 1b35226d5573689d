//! Value encoding for the wire
//!
//! Values travel as text. Strings are stored verbatim, everything else as
//! JSON. Decoding is best-effort: text that isn't JSON comes back untouched.

use crate::errors::CacheError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Result of encoding a value for storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    /// JSON text of a non-string value
    Json(String),
    /// A string stored as-is
    Raw(String),
}

impl Encoded {
    pub fn as_str(&self) -> &str {
        match self {
            Encoded::Json(text) | Encoded::Raw(text) => text,
        }
    }

    pub fn into_payload(self) -> String {
        match self {
            Encoded::Json(text) | Encoded::Raw(text) => text,
        }
    }
}

/// A value read back from the store
///
/// The stored text is kept alongside the parsed JSON: a string stored verbatim
/// by `set` may itself look like JSON (`"42"`, `"true"`, `"null"`).
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    /// Stored text that parses as JSON
    Json { value: Value, text: String },
    /// Stored text that isn't JSON
    Raw(String),
}

impl CachedValue {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            CachedValue::Json { value, .. } => Some(value),
            CachedValue::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            CachedValue::Raw(text) => Some(text),
            CachedValue::Json { .. } => None,
        }
    }

    /// The text exactly as it was stored
    pub fn text(&self) -> &str {
        match self {
            CachedValue::Json { text, .. } | CachedValue::Raw(text) => text,
        }
    }

    /// Collapse into a JSON value; raw text becomes a JSON string
    pub fn into_value(self) -> Value {
        match self {
            CachedValue::Json { value, .. } => value,
            CachedValue::Raw(text) => Value::String(text),
        }
    }

    /// Deserialize into a concrete type
    ///
    /// When the parsed JSON doesn't fit `T`, the stored text is tried as a
    /// plain string, so `parse::<String>()` returns a verbatim `"42"` intact.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, CacheError> {
        match self {
            CachedValue::Json { value, text } => match serde_json::from_value(value.clone()) {
                Ok(parsed) => Ok(parsed),
                Err(e) => serde_json::from_value(Value::String(text.clone()))
                    .map_err(|_| CacheError::SerializationError(e)),
            },
            CachedValue::Raw(text) => Ok(serde_json::from_value(Value::String(text.clone()))?),
        }
    }
}

impl From<Value> for CachedValue {
    fn from(value: Value) -> Self {
        let text = value.to_string();
        CachedValue::Json { value, text }
    }
}

/// Encode a value for `set`: strings verbatim, anything else as JSON
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Encoded, CacheError> {
    match serde_json::to_value(value)? {
        Value::String(text) => Ok(Encoded::Raw(text)),
        other => Ok(Encoded::Json(other.to_string())),
    }
}

/// Encode a value for `mset`: always JSON, strings included
pub fn encode_json(value: &Value) -> Encoded {
    Encoded::Json(value.to_string())
}

/// Decode stored text, falling back to the raw text when it isn't JSON
pub fn decode(raw: String) -> CachedValue {
    match serde_json::from_str::<Value>(&raw) {
        Ok(value) => CachedValue::Json { value, text: raw },
        Err(_) => CachedValue::Raw(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn strings_are_stored_verbatim() {
        assert_eq!(encode("hello").unwrap(), Encoded::Raw("hello".to_string()));
        assert_eq!(
            encode(&"with \"quotes\"".to_string()).unwrap().as_str(),
            "with \"quotes\""
        );
    }

    #[test]
    fn structured_values_are_json() {
        assert_eq!(encode(&42).unwrap(), Encoded::Json("42".to_string()));
        assert_eq!(encode(&true).unwrap(), Encoded::Json("true".to_string()));
        assert_eq!(
            encode(&json!({"a": [1, 2]})).unwrap(),
            Encoded::Json(r#"{"a":[1,2]}"#.to_string())
        );
    }

    #[test]
    fn unserializable_values_are_reported() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], "composite key");
        assert!(matches!(
            encode(&map),
            Err(CacheError::SerializationError(_))
        ));
    }

    #[test]
    fn encode_json_quotes_strings() {
        assert_eq!(
            encode_json(&json!("text")),
            Encoded::Json("\"text\"".to_string())
        );
    }

    #[test]
    fn decode_falls_back_to_raw() {
        assert_eq!(decode("not json".to_string()), CachedValue::Raw("not json".to_string()));
        assert_eq!(decode("[1,2]".to_string()).as_json(), Some(&json!([1, 2])));
        assert_eq!(decode("\"quoted\"".to_string()).as_json(), Some(&json!("quoted")));
        assert_eq!(decode("[1, 2]".to_string()).text(), "[1, 2]");
    }

    #[test]
    fn json_looking_strings_parse_back_as_strings() {
        for text in ["42", "true", "null", "[1]"] {
            let value = decode(text.to_string());
            assert!(value.as_json().is_some());
            assert_eq!(value.parse::<String>().unwrap(), text);
        }
        assert_eq!(decode("42".to_string()).parse::<i64>().unwrap(), 42);
        assert!(matches!(
            decode("{\"a\":1}".to_string()).parse::<Vec<u8>>(),
            Err(CacheError::SerializationError(_))
        ));
    }

    #[test]
    fn cached_value_parse() {
        let value = decode(r#"{"name":"ada","age":36}"#.to_string());

        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Person {
            name: String,
            age: u32,
        }

        assert_eq!(
            value.parse::<Person>().unwrap(),
            Person {
                name: "ada".to_string(),
                age: 36
            }
        );
        assert_eq!(
            CachedValue::Raw("plain".to_string()).into_value(),
            json!("plain")
        );
    }
}
