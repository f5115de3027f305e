mod server;

pub use server::{BillingConfig, ServerConfig, WhmcsConfig};
