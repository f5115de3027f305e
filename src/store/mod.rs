pub mod migrations;
mod sqlite;

pub use migrations::{Migration, Migrator};
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    /// Brings the schema up to the newest revision.
    fn initialize(&self) -> Result<()>;

    // System settings
    fn get_setting(&self, name: &str) -> Result<Option<String>>;
    fn get_setting_row(&self, name: &str) -> Result<Option<SystemSetting>>;
    fn list_settings(&self) -> Result<Vec<SystemSetting>>;
    fn set_setting(&self, name: &str, value: &str) -> Result<()>;

    // Package operations
    fn create_package(&self, package: &NewPackage) -> Result<Package>;
    fn get_package(&self, id: i64) -> Result<Option<Package>>;
    fn list_packages(&self) -> Result<Vec<Package>>;
    fn get_default_package(&self) -> Result<Option<Package>>;

    // Kube operations
    fn create_kube(&self, kube: &NewKube) -> Result<Kube>;
    fn get_kube(&self, id: i64) -> Result<Option<Kube>>;
    fn list_kubes(&self) -> Result<Vec<Kube>>;
    fn get_default_kube(&self) -> Result<Option<Kube>>;
    fn set_default_kube(&self, id: i64) -> Result<()>;

    // Package-Kube links
    fn upsert_package_kube(&self, package_id: i64, kube_id: i64, price: f64)
    -> Result<PackageKube>;
    fn list_package_kubes(&self, package_id: i64) -> Result<Vec<PricedKube>>;
    fn delete_package_kube(&self, package_id: i64, kube_id: i64) -> Result<bool>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;
    fn delete_user(&self, id: &str) -> Result<bool>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn list_user_tokens(&self, user_id: &str) -> Result<Vec<Token>>;
    fn delete_token(&self, id: &str) -> Result<bool>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;
    fn has_admin_token(&self) -> Result<bool>;

    /// Every package with the kubes it offers, in id order.
    fn list_packages_with_kubes(&self) -> Result<Vec<PackageWithKubes>> {
        self.list_packages()?
            .into_iter()
            .map(|package| {
                let kubes = self.list_package_kubes(package.id)?;
                Ok(PackageWithKubes { package, kubes })
            })
            .collect()
    }
}
