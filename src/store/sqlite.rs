use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::migrations::Migrator;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    migrator: Migrator,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
            migrator: Migrator::default(),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Raw connection for repairs the `Store` trait has no operation for,
    /// such as removing a settings row.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }

    #[must_use]
    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    pub fn current_revision(&self) -> Result<Option<String>> {
        self.migrator.current(&self.conn())
    }

    pub fn upgrade(&self, target: Option<&str>) -> Result<Vec<&'static str>> {
        self.migrator.upgrade(&mut self.conn(), target)
    }

    pub fn downgrade(&self, target: Option<&str>) -> Result<Vec<&'static str>> {
        self.migrator.downgrade(&mut self.conn(), target)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

const KUBE_COLUMNS: &str = "id, name, cpu, cpu_units, memory, memory_units, disk_space, \
                            disk_space_units, included_traffic, is_default";

const PACKAGE_COLUMNS: &str = "id, name, first_deposit, currency, period, prefix, suffix, \
                               price_ip, price_pstorage, price_over_traffic";

const TOKEN_COLUMNS: &str =
    "id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at, last_used_at";

fn kube_from_row(row: &Row<'_>) -> rusqlite::Result<Kube> {
    Ok(Kube {
        id: row.get(0)?,
        name: row.get(1)?,
        cpu: row.get(2)?,
        cpu_units: row.get(3)?,
        memory: row.get(4)?,
        memory_units: row.get(5)?,
        disk_space: row.get(6)?,
        disk_space_units: row.get(7)?,
        included_traffic: row.get(8)?,
        // false and NULL both mean "not the default"
        is_default: row.get::<_, Option<bool>>(9)?.filter(|d| *d),
    })
}

fn package_from_row(row: &Row<'_>) -> rusqlite::Result<Package> {
    Ok(Package {
        id: row.get(0)?,
        name: row.get(1)?,
        first_deposit: row.get(2)?,
        currency: row.get(3)?,
        period: row.get(4)?,
        prefix: row.get(5)?,
        suffix: row.get(6)?,
        price_ip: row.get(7)?,
        price_pstorage: row.get(8)?,
        price_over_traffic: row.get(9)?,
    })
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        is_admin: row.get(3)?,
        user_id: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        expires_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
        last_used_at: row.get::<_, Option<String>>(7)?.map(|s| parse_datetime(&s)),
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        created_at: parse_datetime(&row.get::<_, String>(2)?),
        updated_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        let applied = self.upgrade(None)?;
        if !applied.is_empty() {
            tracing::info!("Applied {} migration(s)", applied.len());
        }
        Ok(())
    }

    // System settings

    fn get_setting(&self, name: &str) -> Result<Option<String>> {
        Ok(self.get_setting_row(name)?.and_then(|s| s.value))
    }

    fn get_setting_row(&self, name: &str) -> Result<Option<SystemSetting>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT name, value, label, description FROM system_settings WHERE name = ?1",
            params![name],
            |row| {
                Ok(SystemSetting {
                    name: row.get(0)?,
                    value: row.get(1)?,
                    label: row.get(2)?,
                    description: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_settings(&self) -> Result<Vec<SystemSetting>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT name, value, label, description FROM system_settings ORDER BY id")?;

        let rows = stmt.query_map([], |row| {
            Ok(SystemSetting {
                name: row.get(0)?,
                value: row.get(1)?,
                label: row.get(2)?,
                description: row.get(3)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn set_setting(&self, name: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO system_settings (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            params![name, value],
        )?;
        Ok(())
    }

    // Package operations

    fn create_package(&self, package: &NewPackage) -> Result<Package> {
        let id = {
            let conn = self.conn();
            let result = conn.execute(
                "INSERT INTO packages (name, first_deposit, currency, period, prefix, suffix,
                                       price_ip, price_pstorage, price_over_traffic)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    package.name,
                    package.first_deposit,
                    package.currency,
                    package.period,
                    package.prefix,
                    package.suffix,
                    package.price_ip,
                    package.price_pstorage,
                    package.price_over_traffic,
                ],
            );
            match result {
                Ok(_) => conn.last_insert_rowid(),
                Err(e) if is_constraint_violation(&e) => return Err(Error::AlreadyExists),
                Err(e) => return Err(Error::from(e)),
            }
        };

        self.get_package(id)?.ok_or(Error::NotFound)
    }

    fn get_package(&self, id: i64) -> Result<Option<Package>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PACKAGE_COLUMNS} FROM packages WHERE id = ?1"),
            params![id],
            package_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_packages(&self) -> Result<Vec<Package>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {PACKAGE_COLUMNS} FROM packages ORDER BY id"))?;
        let rows = stmt.query_map([], package_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn get_default_package(&self) -> Result<Option<Package>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PACKAGE_COLUMNS} FROM packages ORDER BY id LIMIT 1"),
            [],
            package_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    // Kube operations

    fn create_kube(&self, kube: &NewKube) -> Result<Kube> {
        let id = {
            let conn = self.conn();
            let result = conn.execute(
                "INSERT INTO kubes (name, cpu, cpu_units, memory, memory_units, disk_space,
                                    disk_space_units, included_traffic)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    kube.name,
                    kube.cpu,
                    kube.cpu_units,
                    kube.memory,
                    kube.memory_units,
                    kube.disk_space,
                    kube.disk_space_units,
                    kube.included_traffic,
                ],
            );
            match result {
                Ok(_) => conn.last_insert_rowid(),
                Err(e) if is_constraint_violation(&e) => return Err(Error::AlreadyExists),
                Err(e) => return Err(Error::from(e)),
            }
        };

        self.get_kube(id)?.ok_or(Error::NotFound)
    }

    fn get_kube(&self, id: i64) -> Result<Option<Kube>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {KUBE_COLUMNS} FROM kubes WHERE id = ?1"),
            params![id],
            kube_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_kubes(&self) -> Result<Vec<Kube>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {KUBE_COLUMNS} FROM kubes ORDER BY id"))?;
        let rows = stmt.query_map([], kube_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn get_default_kube(&self) -> Result<Option<Kube>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {KUBE_COLUMNS} FROM kubes WHERE is_default = 1"),
            [],
            kube_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn set_default_kube(&self, id: i64) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row("SELECT id FROM kubes WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(Error::NotFound);
        }

        // Clear first: the partial unique index rejects two flagged rows
        // even momentarily.
        tx.execute(
            "UPDATE kubes SET is_default = NULL WHERE is_default = 1 AND id != ?1",
            params![id],
        )?;
        tx.execute("UPDATE kubes SET is_default = 1 WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }

    // Package-Kube links

    fn upsert_package_kube(
        &self,
        package_id: i64,
        kube_id: i64,
        price: f64,
    ) -> Result<PackageKube> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM package_kube WHERE package_id = ?1 AND kube_id = ?2",
                params![package_id, kube_id],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE package_kube SET kube_price = ?1 WHERE id = ?2",
                    params![price, id],
                )?;
                id
            }
            None => {
                let result = tx.execute(
                    "INSERT INTO package_kube (package_id, kube_id, kube_price) VALUES (?1, ?2, ?3)",
                    params![package_id, kube_id, price],
                );
                match result {
                    Ok(_) => tx.last_insert_rowid(),
                    // Foreign key failure: unknown package or kube
                    Err(e) if is_constraint_violation(&e) => return Err(Error::NotFound),
                    Err(e) => return Err(Error::from(e)),
                }
            }
        };

        tx.commit()?;
        Ok(PackageKube {
            id,
            package_id,
            kube_id,
            kube_price: price,
        })
    }

    fn list_package_kubes(&self, package_id: i64) -> Result<Vec<PricedKube>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT k.id, k.name, k.cpu, k.cpu_units, k.memory, k.memory_units, k.disk_space,
                    k.disk_space_units, k.included_traffic, k.is_default, pk.kube_price
             FROM package_kube pk
             JOIN kubes k ON k.id = pk.kube_id
             WHERE pk.package_id = ?1
             ORDER BY k.id",
        )?;

        let rows = stmt.query_map(params![package_id], |row| {
            Ok(PricedKube {
                kube: kube_from_row(row)?,
                price: row.get(10)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_package_kube(&self, package_id: i64, kube_id: i64) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM package_kube WHERE package_id = ?1 AND kube_id = ?2",
            params![package_id, kube_id],
        )?;
        Ok(rows > 0)
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO users (id, username, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id,
                user.username,
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, created_at, updated_at FROM users WHERE id = ?1",
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, created_at, updated_at FROM users WHERE username = ?1",
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, username, created_at, updated_at FROM users ORDER BY username")?;
        let rows = stmt.query_map([], user_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_user(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.is_admin,
                token.user_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::TokenLookupCollision),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_lookup = ?1"),
            params![lookup],
            token_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_user_tokens(&self, user_id: &str) -> Result<Vec<Token>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE user_id = ?1 ORDER BY created_at"
        ))?;
        let rows = stmt.query_map(params![user_id], token_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_token(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn has_admin_token(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM tokens WHERE is_admin = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
