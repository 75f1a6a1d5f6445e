//! Validation functions for configuration values.
//!
//! Provides custom validation functions for the work directory, the age
//! recipient key and secret values that must not be blank.

use crate::backup::redacted::RedactedString;
use age::x25519::Recipient;
use std::path::Path;
use std::str::FromStr;
use validator::ValidationError;

/// Prefixes of SSH public keys the `age` CLI accepts as recipients.
static SSH_RECIPIENT_PREFIXES: &[&str] = &["ssh-ed25519 ", "ssh-rsa "];

pub fn validate_dir_exist_or_created<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return std::fs::create_dir_all(dir).map_err(|e| {
            ValidationError::new("InvalidDirectory").with_message(
                format!("cannot create or access work_dir path {:?}: {}", dir, e).into(),
            )
        });
    }

    Ok(())
}

pub fn validate_writable_dir<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    validate_dir_exist_or_created(dir)?;
    let md = std::fs::metadata(dir).map_err(|e| {
        ValidationError::new("InvalidDirectory")
            .with_message(format!("cannot access metadata for {:?}: {}", dir, e).into())
    })?;
    if md.permissions().readonly() {
        Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("cannot write to dir {:?}", dir).into()))
    } else {
        Ok(())
    }
}

pub fn validate_age_recipient<S: AsRef<str>>(key: S) -> Result<(), ValidationError> {
    let key = key.as_ref().trim();
    if SSH_RECIPIENT_PREFIXES.iter().any(|p| key.starts_with(p)) || is_plugin_recipient(key) {
        return Ok(());
    }

    Recipient::from_str(key).map(|_| ()).map_err(|e| {
        ValidationError::new("InvalidRecipient")
            .with_message(format!("not an age public key ({e}): {key:?}").into())
    })
}

/// `age1<plugin>1<data>`, handled by an `age-plugin-<plugin>` binary. Bech32
/// data never contains `1`, so a native X25519 key never matches.
fn is_plugin_recipient(key: &str) -> bool {
    key.strip_prefix("age1")
        .and_then(|rest| rest.split_once('1'))
        .is_some_and(|(plugin, data)| {
            !plugin.is_empty()
                && !data.is_empty()
                && plugin
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
                && data.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}

pub fn validate_not_blank(value: &RedactedString) -> Result<(), ValidationError> {
    if value.inner().trim().is_empty() {
        return Err(ValidationError::new("Required").with_message("must have a value".into()));
    }

    Ok(())
}
