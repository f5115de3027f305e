mod admin;
pub mod billing;
pub mod dto;
pub mod maintenance;
pub mod params;
pub mod pricing;
pub mod response;
mod router;
pub mod validation;

pub use admin::admin_router;
pub use billing::billing_router;
pub use pricing::pricing_router;
pub use router::{AppState, create_router};
