//! Secure string handling with redacted display and serialization.
//!
//! Provides `RedactedString` for storing credentials like the database password and
//! object-storage keys while preventing accidental exposure in logs, debug output,
//! or serialized configuration.

use bon::Builder;
use derive_more::From;
use getset::Getters;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Debug, Formatter};
use std::result;
use zeroize::Zeroize;

/// Placeholder text shown instead of the actual secret in logs/debug output
pub static REDACTED_SECRET: &str = "###REDACTED_SECRET###";

/// Character used when a secret has to be shown as a same-length run
pub const MASK_CHAR: char = '*';

/// A string that gets redacted in debug output and serialization
///
/// Access to the real value goes through the `inner()` getter. Memory is
/// zeroed on drop.
#[derive(Clone, Default, Zeroize, From, Builder, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct RedactedString {
    #[builder(into)]
    inner: String,
}

impl RedactedString {
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// A run of `MASK_CHAR` as long as the secret, for "password: ****" style log lines.
    pub fn masked(&self) -> String {
        mask(&self.inner)
    }
}

pub fn mask<S: AsRef<str>>(secret: S) -> String {
    std::iter::repeat_n(MASK_CHAR, secret.as_ref().chars().count()).collect()
}

impl From<&str> for RedactedString {
    fn from(value: &str) -> Self {
        RedactedString::builder().inner(value).build()
    }
}

impl Debug for RedactedString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", REDACTED_SECRET)
    }
}

impl Serialize for RedactedString {
    fn serialize<S: Serializer>(&self, serializer: S) -> result::Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED_SECRET)
    }
}

impl<'de> Deserialize<'de> for RedactedString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> result::Result<Self, D::Error> {
        deserializer.deserialize_str(RedactedStringVisitor)
    }
}

impl Drop for RedactedString {
    fn drop(&mut self) {
        self.zeroize();
    }
}

pub struct RedactedStringVisitor;

impl Visitor<'_> for RedactedStringVisitor {
    type Value = RedactedString;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a string")
    }

    fn visit_str<E>(self, v: &str) -> result::Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(RedactedString::from(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_string_debug() {
        let redacted = RedactedString::from("s3cr3t");
        assert_eq!(format!("{:?}", redacted), REDACTED_SECRET);
    }

    #[test]
    fn test_redacted_string_serialize() {
        let redacted = RedactedString::from("s3cr3t");
        let serialized = serde_json::to_string(&redacted).unwrap();
        assert_eq!(serialized, format!("\"{}\"", REDACTED_SECRET));
    }

    #[test]
    fn test_redacted_string_deserialize_keeps_real_value() {
        let redacted: RedactedString = serde_json::from_str("\"actual_password\"").unwrap();
        assert_eq!(redacted.inner(), "actual_password");
    }

    #[test]
    fn test_masked_matches_char_count() {
        assert_eq!(RedactedString::from("s3cr3t").masked(), "******");
        assert_eq!(RedactedString::from("pässwörd").masked(), "********");
        assert_eq!(RedactedString::default().masked(), "");
    }

    #[test]
    fn test_redacted_string_zeroize() {
        let mut redacted = RedactedString::from("secret_password");
        redacted.zeroize();
        assert!(redacted.is_empty());
    }
}
