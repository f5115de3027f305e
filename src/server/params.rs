//! Request parameter merging.
//!
//! Billing handlers forward whatever the client sent to the provider, so
//! they take query-string and body parameters as one untyped map.

use axum::{
    Form, Json,
    extract::{FromRequest, Query, Request},
    http::header::CONTENT_TYPE,
};
use serde_json::Value;

use super::response::ApiError;
use crate::billing::Params;

/// Query-string parameters overlaid with a JSON-object or form body.
/// Body keys win.
#[derive(Debug, Default)]
pub struct RequestParams(pub Params);

impl RequestParams {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn into_inner(self) -> Params {
        self.0
    }
}

impl<S: Send + Sync> FromRequest<S> for RequestParams {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut params = Params::new();

        let Query(query) = Query::<Vec<(String, String)>>::try_from_uri(req.uri())
            .map_err(|e| ApiError::bad_request(format!("Invalid query string: {e}")))?;
        for (key, value) in query {
            params.insert(key, Value::String(value));
        }

        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/json") {
            let Json(body) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?;
            match body {
                Value::Object(map) => params.extend(map),
                Value::Null => {}
                _ => return Err(ApiError::bad_request("JSON body must be an object")),
            }
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(form) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid form body: {e}")))?;
            for (key, value) in form {
                params.insert(key, Value::String(value));
            }
        }

        Ok(RequestParams(params))
    }
}

/// Truthiness the way the panel's clients expect it: missing, null, false,
/// zero and empty strings/arrays/objects are all false.
#[must_use]
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use serde_json::json;

    use super::*;

    async fn extract(req: Request) -> Result<RequestParams, ApiError> {
        RequestParams::from_request(req, &()).await
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&Value::Null)));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(0.0))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(Some(&json!([]))));
        assert!(!is_truthy(Some(&json!({}))));

        assert!(is_truthy(Some(&json!(true))));
        assert!(is_truthy(Some(&json!(1))));
        assert!(is_truthy(Some(&json!("0"))));
        assert!(is_truthy(Some(&json!("{\"name\": \"nginx\"}"))));
        assert!(is_truthy(Some(&json!({"name": "nginx"}))));
    }

    #[tokio::test]
    async fn test_json_body_overrides_query() {
        let req = Request::builder()
            .method("POST")
            .uri("/order?pod=query&period=month")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"pod": {"name": "nginx"}, "kubes": 2}"#))
            .unwrap();

        let params = extract(req).await.unwrap();
        assert_eq!(params.get("pod"), Some(&json!({"name": "nginx"})));
        assert_eq!(params.get("period"), Some(&json!("month")));
        assert_eq!(params.get("kubes"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_form_body() {
        let req = Request::builder()
            .method("POST")
            .uri("/orderKubes")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("pod_id=abc&kubes=3"))
            .unwrap();

        let params = extract(req).await.unwrap();
        assert_eq!(params.get("pod_id"), Some(&json!("abc")));
        assert_eq!(params.get("kubes"), Some(&json!("3")));
    }

    #[tokio::test]
    async fn test_query_only() {
        let req = Request::builder()
            .uri("/info?user=alice&domains=a.com")
            .body(Body::empty())
            .unwrap();

        let params = extract(req).await.unwrap().into_inner();
        assert_eq!(params.len(), 2);
        assert_eq!(params["user"], "alice");
    }

    #[tokio::test]
    async fn test_non_object_json_rejected() {
        let req = Request::builder()
            .method("POST")
            .uri("/order")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("[1, 2, 3]"))
            .unwrap();

        let err = extract(req).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
