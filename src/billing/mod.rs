//! Pluggable billing backends.
//!
//! The active backend is chosen at request time by the `billing_type`
//! system setting; [`BillingFactory`] maps that name to a provider.

mod whmcs;

pub use whmcs::WhmcsProvider;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::BillingConfig;
use crate::types::User;

/// Settings value that means no billing backend is in use.
pub const NO_BILLING: &str = "No billing";

/// Request parameters forwarded to a provider untouched.
pub type Params = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("unknown billing provider: {0}")]
    UnknownProvider(String),

    /// The billing system answered and refused the operation.
    #[error("{0}")]
    Rejected(String),

    #[error("billing system unreachable: {0}")]
    Transport(String),

    #[error("invalid billing configuration: {0}")]
    Config(String),
}

/// Who is asking; providers use it to find the customer account.
#[derive(Debug, Clone, Default)]
pub struct BillingContext {
    pub user: Option<User>,
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Name matched against the `billing_type` setting.
    fn name(&self) -> &str;

    async fn get_kuberdock_info(
        &self,
        ctx: &BillingContext,
        params: Params,
    ) -> Result<Value, BillingError>;

    async fn get_payment_methods(&self, ctx: &BillingContext) -> Result<Value, BillingError>;

    async fn order_pod(&self, ctx: &BillingContext, params: Params) -> Result<Value, BillingError>;

    async fn order_product(
        &self,
        ctx: &BillingContext,
        params: Params,
    ) -> Result<Value, BillingError>;

    async fn order_kubes(&self, ctx: &BillingContext, params: Params)
    -> Result<Value, BillingError>;
}

/// Registry of the providers this process can talk to.
#[derive(Clone, Default)]
pub struct BillingFactory {
    providers: HashMap<String, Arc<dyn BillingProvider>>,
}

impl BillingFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a factory holding every provider configured in `config`.
    pub fn from_config(config: &BillingConfig) -> Result<Self, BillingError> {
        let mut factory = Self::new();
        if let Some(whmcs) = &config.whmcs {
            factory.register(Arc::new(WhmcsProvider::new(whmcs)?));
        }
        Ok(factory)
    }

    pub fn register(&mut self, provider: Arc<dyn BillingProvider>) {
        tracing::debug!("Registered billing provider {}", provider.name());
        self.providers.insert(provider.name().to_string(), provider);
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn BillingProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get_billing(&self, name: &str) -> Result<Arc<dyn BillingProvider>, BillingError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| BillingError::UnknownProvider(name.to_string()))
    }

    /// Registered provider names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}
