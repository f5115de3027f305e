mod models;

pub use models::*;

/// Settings row naming the active billing provider.
pub const BILLING_TYPE_SETTING: &str = "billing_type";

/// Settings row toggling maintenance mode (`"true"` / `"false"`).
pub const MAINTENANCE_SETTING: &str = "maintenance";
