use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resource tier (CPU/memory/disk class) that packages price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kube {
    pub id: i64,
    pub name: String,
    pub cpu: f64,
    pub cpu_units: String,
    pub memory: i64,
    pub memory_units: String,
    pub disk_space: i64,
    pub disk_space_units: String,
    pub included_traffic: i64,
    /// `Some(true)` on the default kube and `None` everywhere else.
    /// Stored as NULL rather than false so the uniqueness constraint
    /// only ever bites on the default row.
    pub is_default: Option<bool>,
}

impl Kube {
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.is_default == Some(true)
    }
}

/// A billing plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: i64,
    pub name: String,
    pub first_deposit: f64,
    pub currency: String,
    pub period: String,
    pub prefix: String,
    pub suffix: String,
    pub price_ip: f64,
    pub price_pstorage: f64,
    pub price_over_traffic: f64,
}

/// Link between a package and one of its permitted kube tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageKube {
    pub id: i64,
    pub package_id: i64,
    pub kube_id: i64,
    pub kube_price: f64,
}

/// A kube as seen through one package, carrying that package's price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedKube {
    #[serde(flatten)]
    pub kube: Kube,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageWithKubes {
    #[serde(flatten)]
    pub package: Package,
    pub kubes: Vec<PricedKube>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSetting {
    pub name: String,
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Token {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }
}

/// Fields accepted when creating a kube; the id is assigned by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewKube {
    pub name: String,
    pub cpu: f64,
    #[serde(default = "default_cpu_units")]
    pub cpu_units: String,
    pub memory: i64,
    #[serde(default = "default_memory_units")]
    pub memory_units: String,
    pub disk_space: i64,
    #[serde(default = "default_disk_space_units")]
    pub disk_space_units: String,
    #[serde(default)]
    pub included_traffic: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPackage {
    pub name: String,
    #[serde(default)]
    pub first_deposit: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_period")]
    pub period: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_suffix")]
    pub suffix: String,
    #[serde(default)]
    pub price_ip: f64,
    #[serde(default)]
    pub price_pstorage: f64,
    #[serde(default)]
    pub price_over_traffic: f64,
}

fn default_cpu_units() -> String {
    "Cores".to_string()
}

fn default_memory_units() -> String {
    "MB".to_string()
}

fn default_disk_space_units() -> String {
    "GB".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_period() -> String {
    "month".to_string()
}

fn default_prefix() -> String {
    "$".to_string()
}

fn default_suffix() -> String {
    " USD".to_string()
}
