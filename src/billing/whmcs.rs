//! WHMCS backend.
//!
//! Every operation is one call to the WHMCS external API
//! (`<url>/includes/api.php`) with a KuberDock addon action name. The
//! addon answers with a JSON object whose `result` is either `"success"`
//! or `"error"` (with a `message`).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{BillingContext, BillingError, BillingProvider, Params};
use crate::config::WhmcsConfig;

const API_PATH: &str = "includes/api.php";

pub struct WhmcsProvider {
    client: reqwest::Client,
    endpoint: String,
    identifier: String,
    secret: String,
}

impl WhmcsProvider {
    pub const NAME: &'static str = "WHMCS";

    pub fn new(config: &WhmcsConfig) -> Result<Self, BillingError> {
        if config.url.trim().is_empty() {
            return Err(BillingError::Config("WHMCS url is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BillingError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/{API_PATH}", config.url.trim_end_matches('/')),
            identifier: config.identifier.clone(),
            secret: config.secret.clone(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(
        &self,
        action: &str,
        ctx: &BillingContext,
        params: Params,
    ) -> Result<Value, BillingError> {
        let fields = form_fields(action, ctx, params, &self.identifier, &self.secret);

        let response = self
            .client
            .post(&self.endpoint)
            .form(&fields)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("WHMCS {action} request failed: {e}");
                BillingError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            tracing::warn!("WHMCS {action} returned an unreadable body ({status}): {e}");
            BillingError::Transport(format!("invalid response ({status}): {e}"))
        })?;

        interpret(action, body)
    }
}

/// Flattens the call into WHMCS form fields. Nested values travel as JSON
/// strings, which is what the addon decodes.
fn form_fields(
    action: &str,
    ctx: &BillingContext,
    params: Params,
    identifier: &str,
    secret: &str,
) -> Vec<(String, String)> {
    let mut fields = vec![
        ("action".to_string(), action.to_string()),
        ("identifier".to_string(), identifier.to_string()),
        ("secret".to_string(), secret.to_string()),
        ("responsetype".to_string(), "json".to_string()),
    ];

    if let Some(user) = &ctx.user {
        if !params.contains_key("user") {
            fields.push(("user".to_string(), user.username.clone()));
        }
    }

    for (key, value) in params {
        if matches!(
            key.as_str(),
            "action" | "identifier" | "secret" | "responsetype"
        ) {
            continue;
        }
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s,
            other => other.to_string(),
        };
        fields.push((key, value));
    }

    fields
}

fn interpret(action: &str, body: Value) -> Result<Value, BillingError> {
    let Value::Object(mut map) = body else {
        return Err(BillingError::Transport(format!(
            "{action}: expected a JSON object"
        )));
    };

    match map.remove("result").as_ref().and_then(Value::as_str) {
        Some("error") => {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Billing system error")
                .to_string();
            tracing::warn!("WHMCS rejected {action}: {message}");
            Err(BillingError::Rejected(message))
        }
        _ => Ok(Value::Object(map)),
    }
}

#[async_trait]
impl BillingProvider for WhmcsProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn get_kuberdock_info(
        &self,
        ctx: &BillingContext,
        params: Params,
    ) -> Result<Value, BillingError> {
        self.call("getkuberdockinfo", ctx, params).await
    }

    async fn get_payment_methods(&self, ctx: &BillingContext) -> Result<Value, BillingError> {
        self.call("getpaymentmethods", ctx, Params::new()).await
    }

    async fn order_pod(&self, ctx: &BillingContext, params: Params) -> Result<Value, BillingError> {
        self.call("orderpod", ctx, params).await
    }

    async fn order_product(
        &self,
        ctx: &BillingContext,
        params: Params,
    ) -> Result<Value, BillingError> {
        self.call("orderproduct", ctx, params).await
    }

    async fn order_kubes(
        &self,
        ctx: &BillingContext,
        params: Params,
    ) -> Result<Value, BillingError> {
        self.call("orderkubes", ctx, params).await
    }
}
