#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use kubebill::auth::TokenGenerator;
use kubebill::billing::{BillingContext, BillingError, BillingFactory, BillingProvider, Params};
use kubebill::server::{AppState, create_router};
use kubebill::store::{SqliteStore, Store};
use kubebill::types::User;

pub const FAKE_PROVIDER: &str = "Fake";

/// One call received by [`RecordingProvider`].
#[derive(Debug, Clone)]
pub struct Call {
    pub operation: &'static str,
    pub username: Option<String>,
    pub params: Params,
}

/// Provider that remembers every call and answers with the operation name.
#[derive(Default)]
pub struct RecordingProvider {
    calls: Mutex<Vec<Call>>,
    reject_with: Option<String>,
}

impl RecordingProvider {
    pub fn rejecting(message: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reject_with: Some(message.to_string()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(
        &self,
        operation: &'static str,
        ctx: &BillingContext,
        params: Params,
    ) -> Result<Value, BillingError> {
        self.calls.lock().unwrap().push(Call {
            operation,
            username: ctx.user.as_ref().map(|u| u.username.clone()),
            params,
        });
        match &self.reject_with {
            Some(message) => Err(BillingError::Rejected(message.clone())),
            None => Ok(json!({ "operation": operation })),
        }
    }
}

#[async_trait]
impl BillingProvider for RecordingProvider {
    fn name(&self) -> &str {
        FAKE_PROVIDER
    }

    async fn get_kuberdock_info(
        &self,
        ctx: &BillingContext,
        params: Params,
    ) -> Result<Value, BillingError> {
        self.record("get_kuberdock_info", ctx, params)
    }

    async fn get_payment_methods(&self, ctx: &BillingContext) -> Result<Value, BillingError> {
        self.record("get_payment_methods", ctx, Params::new())
    }

    async fn order_pod(&self, ctx: &BillingContext, params: Params) -> Result<Value, BillingError> {
        self.record("order_pod", ctx, params)
    }

    async fn order_product(
        &self,
        ctx: &BillingContext,
        params: Params,
    ) -> Result<Value, BillingError> {
        self.record("order_product", ctx, params)
    }

    async fn order_kubes(
        &self,
        ctx: &BillingContext,
        params: Params,
    ) -> Result<Value, BillingError> {
        self.record("order_kubes", ctx, params)
    }
}

pub struct TestApp {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub provider: Arc<RecordingProvider>,
    pub admin_token: String,
    pub user_token: String,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_provider(RecordingProvider::default())
    }

    pub fn with_provider(provider: RecordingProvider) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = Arc::new(
            SqliteStore::new(temp_dir.path().join("kubebill.db")).expect("open store"),
        );
        store.initialize().expect("initialize store");

        let generator = TokenGenerator::new();
        let (admin, admin_token) = generator.issue_admin().expect("admin token");
        store.create_token(&admin).expect("store admin token");

        let now = chrono::Utc::now();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: "alice".to_string(),
            created_at: now,
            updated_at: now,
        };
        store.create_user(&user).expect("create user");
        let (token, user_token) = generator
            .issue_for_user(&user, None)
            .expect("user token");
        store.create_token(&token).expect("store user token");

        let provider = Arc::new(provider);
        let billing = BillingFactory::new().with_provider(provider.clone());
        let state = Arc::new(AppState::new(store.clone(), billing));

        Self {
            temp_dir,
            store,
            provider,
            admin_token,
            user_token,
            router: create_router(state),
        }
    }

    pub fn enable_billing(&self) {
        self.store
            .set_setting("billing_type", FAKE_PROVIDER)
            .expect("enable billing");
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request(Method::GET, uri, token, None)).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(request(Method::POST, uri, token, Some(body))).await
    }

    pub async fn put_json(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(request(Method::PUT, uri, token, Some(body))).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request(Method::DELETE, uri, token, None)).await
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    }
}
