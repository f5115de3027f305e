use rusqlite::{OptionalExtension, Transaction};

use crate::error::Result;

pub struct Migration;

impl super::Migration for Migration {
    fn revision(&self) -> &'static str {
        "28b23145af40"
    }

    fn down_revision(&self) -> Option<&'static str> {
        Some("56f9182bf415")
    }

    fn description(&self) -> &'static str {
        "Add 'is_default' flag to kube types"
    }

    fn upgrade(&self, tx: &Transaction<'_>) -> Result<()> {
        tx.execute_batch(
            "ALTER TABLE kubes ADD COLUMN is_default BOOLEAN;
             CREATE UNIQUE INDEX kubes_is_default_key ON kubes(is_default);",
        )?;

        let first: Option<i64> = tx
            .query_row(
                "SELECT id FROM kubes WHERE id >= 0 ORDER BY id LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = first {
            tx.execute("UPDATE kubes SET is_default = 1 WHERE id = ?1", [id])?;
            tracing::info!("Kube {id} marked as default");
        }
        Ok(())
    }

    fn downgrade(&self, tx: &Transaction<'_>) -> Result<()> {
        tx.execute_batch(
            "DROP INDEX kubes_is_default_key;
             ALTER TABLE kubes DROP COLUMN is_default;",
        )?;
        Ok(())
    }
}
