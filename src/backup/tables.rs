//! Table selection: narrows the database's table listing with the configured
//! allow and block lists.
//!
//! The result keeps the order the database reported the tables in. An allow
//! list only decides membership, never order.

use itertools::Itertools;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableSelectionError {
    #[error("No tables found to export.")]
    NoTablesFound,
    #[error("Required allowlist tables not found: {}", .0.join(", "))]
    TablesNotFound(Vec<String>),
    #[error("No tables found to export after filtering.")]
    NoTablesAfterFiltering,
}

/// Computes the ordered, duplicate-free set of tables to dump.
///
/// * an empty listing fails with [`TableSelectionError::NoTablesFound`]
/// * a non-empty `allow` list is authoritative: every entry must exist in `all`,
///   otherwise every missing name is reported in [`TableSelectionError::TablesNotFound`]
/// * a non-empty `block` list removes its members afterwards
/// * ending up with nothing fails with [`TableSelectionError::NoTablesAfterFiltering`]
pub fn select_tables<A, B, C>(
    all: &[A],
    allow: &[B],
    block: &[C],
) -> Result<Vec<String>, TableSelectionError>
where
    A: AsRef<str>,
    B: AsRef<str>,
    C: AsRef<str>,
{
    let mut tables = all
        .iter()
        .map(|t| t.as_ref().to_string())
        .unique()
        .collect_vec();
    let total = tables.len();

    if total == 0 {
        return Err(TableSelectionError::NoTablesFound);
    }
    debug!("  found {total} table(s) in scan");

    if !allow.is_empty() {
        let known: HashSet<&str> = tables.iter().map(String::as_str).collect();
        let missing = allow
            .iter()
            .map(|t| t.as_ref())
            .filter(|t| !known.contains(t))
            .unique()
            .inspect(|t| error!("  allowlist table not found: {t}"))
            .map(str::to_string)
            .collect_vec();
        if !missing.is_empty() {
            return Err(TableSelectionError::TablesNotFound(missing));
        }

        let allowed: HashSet<&str> = allow.iter().map(|t| t.as_ref()).collect();
        tables.retain(|t| {
            let keep = allowed.contains(t.as_str());
            if keep {
                debug!("  including allowlist table: {t}");
            }
            keep
        });
    }

    if !block.is_empty() {
        let blocked: HashSet<&str> = block.iter().map(|t| t.as_ref()).collect();
        tables.retain(|t| {
            let skip = blocked.contains(t.as_str());
            if skip {
                debug!("  skipping blocklist table: {t}");
            }
            !skip
        });
    }

    if tables.is_empty() {
        return Err(TableSelectionError::NoTablesAfterFiltering);
    }
    if tables.len() != total {
        debug!("  reduced to {} table(s) after filtering", tables.len());
    }

    Ok(tables)
}
