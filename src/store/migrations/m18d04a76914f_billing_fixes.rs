use rusqlite::Transaction;

use super::rebuild_table;
use crate::error::Result;

pub struct Migration;

const KUBE_COLUMNS: &[&str] = &[
    "id",
    "name",
    "cpu",
    "cpu_units",
    "memory",
    "memory_units",
    "disk_space",
    "disk_space_units",
    "included_traffic",
    "is_default",
];

const PACKAGE_COLUMNS: &[&str] = &[
    "id",
    "name",
    "first_deposit",
    "currency",
    "period",
    "price_ip",
    "price_pstorage",
    "price_over_traffic",
    "prefix",
    "suffix",
];

const PACKAGE_KUBE_COLUMNS: &[&str] = &["id", "package_id", "kube_id", "kube_price"];

fn kubes_table(name_constraint: &str) -> String {
    format!(
        "id INTEGER PRIMARY KEY AUTOINCREMENT,
         name VARCHAR(64) {name_constraint} UNIQUE,
         cpu REAL NOT NULL DEFAULT 0,
         cpu_units VARCHAR(32) NOT NULL DEFAULT 'Cores',
         memory INTEGER NOT NULL DEFAULT 0,
         memory_units VARCHAR(3) NOT NULL DEFAULT 'MB',
         disk_space INTEGER NOT NULL DEFAULT 0,
         disk_space_units VARCHAR(3) NOT NULL DEFAULT 'GB',
         included_traffic INTEGER NOT NULL DEFAULT 0,
         is_default BOOLEAN"
    )
}

fn packages_table(constraint: &str) -> String {
    format!(
        "id INTEGER PRIMARY KEY AUTOINCREMENT,
         name VARCHAR(64) {constraint} UNIQUE,
         first_deposit REAL NOT NULL DEFAULT 0,
         currency VARCHAR(16) NOT NULL DEFAULT 'USD',
         period VARCHAR(16) NOT NULL DEFAULT 'month',
         price_ip REAL NOT NULL DEFAULT 0,
         price_pstorage REAL NOT NULL DEFAULT 0,
         price_over_traffic REAL NOT NULL DEFAULT 0,
         prefix VARCHAR(16) {constraint},
         suffix VARCHAR(16) {constraint}"
    )
}

fn package_kube_table(constraint: &str) -> String {
    format!(
        "id INTEGER PRIMARY KEY AUTOINCREMENT,
         package_id INTEGER {constraint} REFERENCES packages(id),
         kube_id INTEGER {constraint} REFERENCES kubes(id),
         kube_price REAL NOT NULL DEFAULT 0"
    )
}

impl super::Migration for Migration {
    fn revision(&self) -> &'static str {
        "18d04a76914f"
    }

    fn down_revision(&self) -> Option<&'static str> {
        Some("241a7b04a9ff")
    }

    fn description(&self) -> &'static str {
        "Package prefix and suffix length; nullable fix for Package, Kube, PackageKube"
    }

    fn upgrade(&self, tx: &Transaction<'_>) -> Result<()> {
        tx.execute("DROP INDEX IF EXISTS kubes_is_default_key", [])?;
        rebuild_table(tx, "kubes", &kubes_table("NOT NULL"), KUBE_COLUMNS)?;
        // Only the row flagged true is constrained; NULL/false rows are unlimited.
        tx.execute(
            "CREATE UNIQUE INDEX one_default ON kubes(is_default) WHERE is_default = 1",
            [],
        )?;

        rebuild_table(tx, "packages", &packages_table("NOT NULL"), PACKAGE_COLUMNS)?;

        let removed = tx.execute(
            "DELETE FROM package_kube WHERE package_id IS NULL OR kube_id IS NULL",
            [],
        )?;
        if removed > 0 {
            tracing::info!("Removed {removed} package_kube rows with missing keys");
        }

        rebuild_table(
            tx,
            "package_kube",
            &package_kube_table("NOT NULL"),
            PACKAGE_KUBE_COLUMNS,
        )?;
        Ok(())
    }

    fn downgrade(&self, tx: &Transaction<'_>) -> Result<()> {
        rebuild_table(tx, "package_kube", &package_kube_table(""), PACKAGE_KUBE_COLUMNS)?;
        rebuild_table(tx, "packages", &packages_table(""), PACKAGE_COLUMNS)?;

        tx.execute("DROP INDEX IF EXISTS one_default", [])?;
        rebuild_table(tx, "kubes", &kubes_table(""), KUBE_COLUMNS)?;
        // The plain unique constraint treats every false as a duplicate.
        tx.execute_batch(
            "UPDATE kubes SET is_default = NULL WHERE is_default = 0;
             CREATE UNIQUE INDEX kubes_is_default_key ON kubes(is_default);",
        )?;
        Ok(())
    }
}
