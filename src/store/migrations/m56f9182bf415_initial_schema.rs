use rusqlite::Transaction;

use crate::error::Result;

pub struct Migration;

const UPGRADE: &str = r#"
-- Accounts that own API tokens
CREATE TABLE users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Tokens are auth credentials; non-admin tokens must belong to a user
CREATE TABLE tokens (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,             -- argon2id hash with embedded salt
    token_lookup TEXT NOT NULL,           -- lookup segment of the raw token
    is_admin INTEGER NOT NULL DEFAULT 0,
    user_id TEXT REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,                      -- NULL = never
    last_used_at TEXT
);

CREATE UNIQUE INDEX idx_tokens_lookup ON tokens(token_lookup);
CREATE INDEX idx_tokens_user ON tokens(user_id);

CREATE TABLE system_settings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(255) NOT NULL UNIQUE,
    value TEXT,
    label TEXT,
    description TEXT
);

INSERT INTO system_settings (name, value, label, description) VALUES
    ('billing_type', 'No billing', 'Select your billing system',
     'Billing system that handles orders and payments'),
    ('maintenance', 'false', 'Maintenance mode',
     'Reject billing requests from users while enabled');

-- Billing plans
CREATE TABLE packages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(64) UNIQUE,
    first_deposit REAL NOT NULL DEFAULT 0,
    currency VARCHAR(16) NOT NULL DEFAULT 'USD',
    period VARCHAR(16) NOT NULL DEFAULT 'month',
    price_ip REAL NOT NULL DEFAULT 0,
    price_pstorage REAL NOT NULL DEFAULT 0,
    price_over_traffic REAL NOT NULL DEFAULT 0
);

-- Resource tiers; negative ids are reserved for internal tiers
CREATE TABLE kubes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(64) UNIQUE,
    cpu REAL NOT NULL DEFAULT 0,
    cpu_units VARCHAR(32) NOT NULL DEFAULT 'Cores',
    memory INTEGER NOT NULL DEFAULT 0,
    memory_units VARCHAR(3) NOT NULL DEFAULT 'MB',
    disk_space INTEGER NOT NULL DEFAULT 0,
    disk_space_units VARCHAR(3) NOT NULL DEFAULT 'GB',
    included_traffic INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE package_kube (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id INTEGER REFERENCES packages(id),
    kube_id INTEGER REFERENCES kubes(id),
    kube_price REAL NOT NULL DEFAULT 0
);
"#;

const DOWNGRADE: &str = r#"
DROP TABLE package_kube;
DROP TABLE kubes;
DROP TABLE packages;
DROP TABLE system_settings;
DROP TABLE tokens;
DROP TABLE users;
"#;

impl super::Migration for Migration {
    fn revision(&self) -> &'static str {
        "56f9182bf415"
    }

    fn down_revision(&self) -> Option<&'static str> {
        None
    }

    fn description(&self) -> &'static str {
        "Initial schema"
    }

    fn upgrade(&self, tx: &Transaction<'_>) -> Result<()> {
        tx.execute_batch(UPGRADE)?;
        Ok(())
    }

    fn downgrade(&self, tx: &Transaction<'_>) -> Result<()> {
        tx.execute_batch(DOWNGRADE)?;
        Ok(())
    }
}
