//! Bulk re-encryption of registered database columns on key rotation.
//!
//! The column registry is owned by configuration outside this module and
//! consumed read-only. A run takes one exclusive transaction (the coarse
//! write lock across every registered table, deliberately, so no value can
//! transition mid-flight) and wraps each table's pass in a savepoint. Any
//! single value that fails to decrypt aborts the entire run; the lock is
//! released unconditionally (commit on success, rollback on every failure
//! path). Intended as an off-path maintenance operation, not for use inside
//! an interactive request.

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Savepoint, ToSql, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::crypto::key::SystemKey;
use crate::crypto::value;
use crate::error::{CofferError, Result};

/// One registry entry: a table with encrypted columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedTable {
    pub table: String,
    pub primary_key: String,
    pub columns: Vec<String>,
}

/// What a successful run touched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReencryptReport {
    pub tables: usize,
    pub rows: usize,
    pub values: usize,
}

/// Re-encrypt every registered column from `old_key` to `new_key`.
pub fn run(
    conn: &mut Connection,
    registry: &[EncryptedTable],
    old_key: &SystemKey,
    new_key: &SystemKey,
) -> Result<ReencryptReport> {
    for entry in registry {
        validate_identifier(&entry.table)?;
        validate_identifier(&entry.primary_key)?;
        if entry.columns.is_empty() {
            return Err(CofferError::InvalidInput(format!(
                "table {} registers no encrypted columns",
                entry.table
            )));
        }
        for column in &entry.columns {
            validate_identifier(column)?;
        }
    }

    let mut report = ReencryptReport::default();
    let mut tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;

    for entry in registry {
        let sp = tx.savepoint()?;
        let (rows, values) = reencrypt_table(&sp, entry, old_key, new_key)?;
        sp.commit()?;

        report.tables += 1;
        report.rows += rows;
        report.values += values;
        debug!(table = %entry.table, rows, values, "table re-encrypted");
    }

    tx.commit()?;
    info!(
        tables = report.tables,
        rows = report.rows,
        values = report.values,
        "column re-encryption complete"
    );
    Ok(report)
}

fn reencrypt_table(
    sp: &Savepoint<'_>,
    entry: &EncryptedTable,
    old_key: &SystemKey,
    new_key: &SystemKey,
) -> Result<(usize, usize)> {
    let select_sql = format!(
        "SELECT {}, {} FROM {}",
        entry.primary_key,
        entry.columns.join(", "),
        entry.table
    );

    // Collect the rewritten rows first; the update pass runs after the
    // select cursor is closed.
    let mut rewrites: Vec<(SqlValue, Vec<Option<String>>)> = Vec::new();
    let mut values = 0usize;
    {
        let mut stmt = sp.prepare(&select_sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let pk: SqlValue = row.get(0)?;
            let mut rewritten = Vec::with_capacity(entry.columns.len());
            let mut changed = false;

            for (idx, column) in entry.columns.iter().enumerate() {
                let current: Option<String> = row.get(idx + 1)?;
                match current {
                    Some(ciphertext) if !ciphertext.is_empty() => {
                        let plaintext =
                            value::decrypt(&ciphertext, old_key).map_err(|e| {
                                CofferError::Rotation(format!(
                                    "table {}, column {}, row {:?}: {}",
                                    entry.table, column, pk, e
                                ))
                            })?;
                        let reencrypted = value::encrypt(&plaintext, new_key).map_err(|e| {
                            CofferError::Rotation(format!(
                                "table {}, column {}, row {:?}: {}",
                                entry.table, column, pk, e
                            ))
                        })?;
                        rewritten.push(Some(reencrypted));
                        changed = true;
                        values += 1;
                    }
                    // NULL and empty values pass through untouched.
                    other => rewritten.push(other),
                }
            }

            if changed {
                rewrites.push((pk, rewritten));
            }
        }
    }

    let assignments = entry
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| format!("{} = ?{}", column, idx + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let update_sql = format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        entry.table,
        assignments,
        entry.primary_key,
        entry.columns.len() + 1
    );

    let row_count = rewrites.len();
    let mut stmt = sp.prepare(&update_sql)?;
    for (pk, rewritten) in &rewrites {
        let mut params: Vec<&dyn ToSql> = rewritten.iter().map(|v| v as &dyn ToSql).collect();
        params.push(pk as &dyn ToSql);
        stmt.execute(params.as_slice())?;
    }

    Ok((row_count, values))
}

/// Registry identifiers are interpolated into SQL; restrict them to plain
/// SQL names.
fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.chars().next().is_some_and(|c| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(CofferError::InvalidInput(format!(
            "invalid identifier in column registry: {:?}",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("contacts").is_ok());
        assert!(validate_identifier("bank_account_2").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2fast").is_err());
        assert!(validate_identifier("drop table; --").is_err());
        assert!(validate_identifier("name with space").is_err());
    }
}
