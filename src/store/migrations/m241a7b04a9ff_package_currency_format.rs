use rusqlite::Transaction;

use crate::error::Result;

pub struct Migration;

impl super::Migration for Migration {
    fn revision(&self) -> &'static str {
        "241a7b04a9ff"
    }

    fn down_revision(&self) -> Option<&'static str> {
        Some("28b23145af40")
    }

    fn description(&self) -> &'static str {
        "Add price prefix and suffix to packages"
    }

    fn upgrade(&self, tx: &Transaction<'_>) -> Result<()> {
        tx.execute_batch(
            "ALTER TABLE packages ADD COLUMN prefix VARCHAR(16);
             ALTER TABLE packages ADD COLUMN suffix VARCHAR(16);
             UPDATE packages SET
                 prefix = CASE currency WHEN 'USD' THEN '$' ELSE '' END,
                 suffix = ' ' || currency;",
        )?;
        Ok(())
    }

    fn downgrade(&self, tx: &Transaction<'_>) -> Result<()> {
        tx.execute_batch(
            "ALTER TABLE packages DROP COLUMN suffix;
             ALTER TABLE packages DROP COLUMN prefix;",
        )?;
        Ok(())
    }
}
