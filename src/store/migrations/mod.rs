//! Linear schema migration chain.
//!
//! Each revision names the revision it applies on top of (`down_revision`),
//! so the registered list must form a single chain starting at a revision
//! with no parent. The applied revision lives in the single-row
//! `schema_version` table.
//!
//! Every step runs in its own transaction together with the version-row
//! update. Foreign-key enforcement is switched off for the duration of a
//! step because SQLite can only change column nullability by rebuilding the
//! table; `PRAGMA foreign_key_check` has to come back clean before the step
//! commits.

mod m18d04a76914f_billing_fixes;
mod m241a7b04a9ff_package_currency_format;
mod m28b23145af40_kube_default_flag;
mod m56f9182bf415_initial_schema;

use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::error::{Error, Result};

/// A single forward/backward schema edit.
pub trait Migration: Send + Sync {
    fn revision(&self) -> &'static str;
    fn down_revision(&self) -> Option<&'static str>;
    fn description(&self) -> &'static str;
    fn upgrade(&self, tx: &Transaction<'_>) -> Result<()>;
    fn downgrade(&self, tx: &Transaction<'_>) -> Result<()>;
}

/// All revisions shipped with this crate, oldest first.
#[must_use]
pub fn migrations() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(m56f9182bf415_initial_schema::Migration),
        Box::new(m28b23145af40_kube_default_flag::Migration),
        Box::new(m241a7b04a9ff_package_currency_format::Migration),
        Box::new(m18d04a76914f_billing_fixes::Migration),
    ]
}

const VERSION_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS schema_version (version_num TEXT NOT NULL PRIMARY KEY)";

pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new(migrations())
    }
}

impl Migrator {
    #[must_use]
    pub fn new(migrations: Vec<Box<dyn Migration>>) -> Self {
        Self { migrations }
    }

    /// Checks that the registered revisions form one linear chain.
    pub fn validate(&self) -> Result<()> {
        let mut expected_parent: Option<&str> = None;
        for (i, migration) in self.migrations.iter().enumerate() {
            if migration.down_revision() != expected_parent {
                return Err(Error::Migration(format!(
                    "revision {} at position {} expects parent {:?}, found {:?}",
                    migration.revision(),
                    i,
                    migration.down_revision(),
                    expected_parent,
                )));
            }
            if self.migrations[..i]
                .iter()
                .any(|m| m.revision() == migration.revision())
            {
                return Err(Error::Migration(format!(
                    "duplicate revision {}",
                    migration.revision()
                )));
            }
            expected_parent = Some(migration.revision());
        }
        Ok(())
    }

    #[must_use]
    pub fn head(&self) -> Option<&'static str> {
        self.migrations.last().map(|m| m.revision())
    }

    /// Revisions with descriptions, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<(&'static str, Option<&'static str>, &'static str)> {
        self.migrations
            .iter()
            .map(|m| (m.revision(), m.down_revision(), m.description()))
            .collect()
    }

    pub fn current(&self, conn: &Connection) -> Result<Option<String>> {
        conn.execute_batch(VERSION_TABLE)?;
        conn.query_row("SELECT version_num FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(Error::from)
    }

    fn position(&self, revision: &str) -> Result<usize> {
        self.migrations
            .iter()
            .position(|m| m.revision() == revision)
            .ok_or_else(|| Error::UnknownRevision(revision.to_string()))
    }

    /// Applies every revision after the current one up to and including
    /// `target` (head when `None`). Returns the applied revisions in order.
    pub fn upgrade(&self, conn: &mut Connection, target: Option<&str>) -> Result<Vec<&'static str>> {
        self.validate()?;

        let Some(head) = self.head() else {
            return Ok(Vec::new());
        };
        let target_pos = self.position(target.unwrap_or(head))?;

        let start = match self.current(conn)? {
            Some(current) => self.position(&current)? + 1,
            None => 0,
        };

        if target_pos + 1 < start {
            return Err(Error::Migration(format!(
                "target revision {} is older than the current one; downgrade instead",
                self.migrations[target_pos].revision()
            )));
        }

        let mut applied = Vec::new();
        for migration in &self.migrations[start..=target_pos] {
            tracing::info!(
                "Upgrading to {} ({})",
                migration.revision(),
                migration.description()
            );
            run_step(conn, Some(migration.revision()), |tx| migration.upgrade(tx))?;
            applied.push(migration.revision());
        }
        Ok(applied)
    }

    /// Reverts revisions newest first until `target` is the current one
    /// (`None` reverts everything). Returns the reverted revisions in order.
    pub fn downgrade(
        &self,
        conn: &mut Connection,
        target: Option<&str>,
    ) -> Result<Vec<&'static str>> {
        self.validate()?;

        let Some(current) = self.current(conn)? else {
            return Ok(Vec::new());
        };
        let current_pos = self.position(&current)?;

        let keep = match target {
            Some(target) => {
                let pos = self.position(target)?;
                if pos > current_pos {
                    return Err(Error::Migration(format!(
                        "target revision {target} is newer than the current one; upgrade instead"
                    )));
                }
                pos + 1
            }
            None => 0,
        };

        let mut reverted = Vec::new();
        for migration in self.migrations[keep..=current_pos].iter().rev() {
            tracing::info!(
                "Downgrading {} ({})",
                migration.revision(),
                migration.description()
            );
            run_step(conn, migration.down_revision(), |tx| migration.downgrade(tx))?;
            reverted.push(migration.revision());
        }
        Ok(reverted)
    }
}

fn run_step<F>(conn: &mut Connection, new_version: Option<&str>, step: F) -> Result<()>
where
    F: FnOnce(&Transaction<'_>) -> Result<()>,
{
    conn.pragma_update(None, "foreign_keys", "OFF")?;
    let outcome = apply_in_transaction(conn, new_version, step);
    conn.pragma_update(None, "foreign_keys", "ON")?;
    outcome
}

fn apply_in_transaction<F>(conn: &mut Connection, new_version: Option<&str>, step: F) -> Result<()>
where
    F: FnOnce(&Transaction<'_>) -> Result<()>,
{
    let tx = conn.transaction()?;
    step(&tx)?;
    check_foreign_keys(&tx)?;

    tx.execute("DELETE FROM schema_version", [])?;
    if let Some(version) = new_version {
        tx.execute(
            "INSERT INTO schema_version (version_num) VALUES (?1)",
            [version],
        )?;
    }

    tx.commit()?;
    Ok(())
}

fn check_foreign_keys(tx: &Transaction<'_>) -> Result<()> {
    let mut stmt = tx.prepare("PRAGMA foreign_key_check")?;
    let violation = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?, row.get::<_, String>(2)?))
        })?
        .next()
        .transpose()?;

    match violation {
        Some((table, rowid, parent)) => Err(Error::Migration(format!(
            "foreign key violation in {table} (rowid {rowid:?}) referencing {parent}"
        ))),
        None => Ok(()),
    }
}

/// Recreates `table` with a new column definition, copying `columns` over.
///
/// Indexes on the old table are dropped with it; callers recreate the ones
/// they still want.
pub(crate) fn rebuild_table(
    tx: &Transaction<'_>,
    table: &str,
    definition: &str,
    columns: &[&str],
) -> Result<()> {
    let staging = format!("_{table}_rebuild");
    let columns = columns.join(", ");
    tx.execute_batch(&format!(
        "CREATE TABLE {staging} ({definition});
         INSERT INTO {staging} ({columns}) SELECT {columns} FROM {table};
         DROP TABLE {table};
         ALTER TABLE {staging} RENAME TO {table};"
    ))?;
    Ok(())
}
