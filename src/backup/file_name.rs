//! Destination object key rendering.
//!
//! Templates use `{{token}}` placeholders. Known tokens:
//!
//! | token             | value                         |
//! |-------------------|-------------------------------|
//! | `{{db-database}}` | database name                 |
//! | `{{db-user}}`     | database username             |
//! | `{{db-host}}`     | database host                 |
//! | `{{db-port}}`     | database port                 |
//! | `{{YYYY}}`        | four-digit UTC year           |
//! | `{{MM}}`          | two-digit UTC month           |
//! | `{{DD}}`          | two-digit UTC day             |
//! | `{{hh}}`          | two-digit UTC hour (24h)      |
//! | `{{mm}}`          | two-digit UTC minute          |
//! | `{{ss}}`          | two-digit UTC second          |
//!
//! Anything else between braces is copied through untouched.

use crate::backup::run_config::DatabaseConfig;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// The substitution table for one run.
#[derive(Debug, Clone)]
pub struct TemplateValues {
    values: HashMap<&'static str, String>,
}

impl TemplateValues {
    pub fn new(database: &DatabaseConfig, now: DateTime<Utc>) -> Self {
        let values = HashMap::from([
            ("db-database", database.database().clone()),
            ("db-user", database.username().clone()),
            ("db-host", database.host().clone()),
            ("db-port", database.port().to_string()),
            ("YYYY", now.format("%Y").to_string()),
            ("MM", now.format("%m").to_string()),
            ("DD", now.format("%d").to_string()),
            ("hh", now.format("%H").to_string()),
            ("mm", now.format("%M").to_string()),
            ("ss", now.format("%S").to_string()),
        ]);
        Self { values }
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.values.get(token).map(String::as_str)
    }
}

/// Substitutes every known token in a single left-to-right pass. Substituted
/// text is never rescanned.
///
/// At each `{{` a known token starting there is substituted; otherwise a single
/// `{` is copied and scanning resumes at the next byte, so `{{{YYYY}}}`
/// renders as `{2024}`.
pub fn render_file_name(template: &str, values: &TemplateValues) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        match known_token_at(rest, values) {
            Some((value, len)) => {
                out.push_str(value);
                rest = &rest[len..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);

    out
}

/// The value and byte length of the known token `s` starts with, if any.
fn known_token_at<'v>(s: &str, values: &'v TemplateValues) -> Option<(&'v str, usize)> {
    let inner = s.strip_prefix(OPEN)?;
    let end = inner.find(CLOSE)?;
    values
        .get(&inner[..end])
        .map(|value| (value, OPEN.len() + end + CLOSE.len()))
}

/// Joins a bucket and a rendered key into an `s3://` reference, dropping any
/// leading `/` from the key.
pub fn destination_url(bucket: &str, file_name: &str) -> String {
    format!("s3://{}/{}", bucket, file_name.trim_start_matches('/'))
}
