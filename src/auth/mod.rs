mod helpers;
mod middleware;
mod token;

pub use middleware::{AuthError, Caller, RequireAdmin, RequireAuth};
pub use token::{RawToken, TokenGenerator};
