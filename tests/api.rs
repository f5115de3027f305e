//! HTTP tests driving the router in-process.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::json;

use common::{FAKE_PROVIDER, RecordingProvider, TestApp};
use kubebill::store::Store;
use kubebill::types::{NewKube, NewPackage};

fn new_kube(name: &str) -> NewKube {
    serde_json::from_value(json!({
        "name": name,
        "cpu": 0.25,
        "memory": 128,
        "disk_space": 1,
    }))
    .unwrap()
}

fn new_package(name: &str) -> NewPackage {
    serde_json::from_value(json!({ "name": name })).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_billing_routes_require_auth() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/billing/info", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
    assert_eq!(body["type"], "NotAuthorized");

    let (status, _) = app.get("/api/billing/info", Some("kubebill_bogus_token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_without_billing_guard_is_uniform() {
    let app = TestApp::new();
    let token = Some(app.user_token.as_str());

    let responses = [
        app.get("/api/billing/paymentmethods", token).await,
        app.get("/api/billing/paymentmethods/", token).await,
        app.post_json("/api/billing/order", token, json!({ "pod": true })).await,
        app.post_json("/api/billing/order/", token, json!({})).await,
        app.post_json("/api/billing/orderKubes", token, json!({})).await,
        app.post_json("/api/billing/orderKubes/", token, json!({})).await,
    ];

    for (status, body) in responses {
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
        assert_eq!(body["data"], "Without billing");
        assert_eq!(body["type"], "APIError");
    }
    assert!(app.provider.calls().is_empty());
}

#[tokio::test]
async fn test_info_without_billing_returns_catalog_summary() {
    let app = TestApp::new();
    let standard = app.store.create_kube(&new_kube("Standard")).unwrap();
    let large = app.store.create_kube(&new_kube("Large")).unwrap();
    let basic = app.store.create_package(&new_package("Basic")).unwrap();
    app.store.create_package(&new_package("Pro")).unwrap();
    app.store.set_default_kube(large.id).unwrap();
    app.store
        .upsert_package_kube(basic.id, standard.id, 1.5)
        .unwrap();

    let (status, body) = app.get("/api/billing/info", Some(&app.user_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");

    let data = &body["data"];
    assert_eq!(data["billing"], "No billing");
    assert_eq!(data["packages"].as_array().unwrap().len(), 2);
    assert_eq!(data["packages"][0]["name"], "Basic");
    assert_eq!(data["packages"][0]["kubes"][0]["name"], "Standard");
    assert_eq!(data["packages"][0]["kubes"][0]["price"], 1.5);
    assert_eq!(data["default"]["kubeType"]["id"], large.id);
    assert_eq!(data["default"]["kubeType"]["is_default"], true);
    assert_eq!(data["default"]["packageId"]["id"], basic.id);
    assert!(app.provider.calls().is_empty());
}

#[tokio::test]
async fn test_info_without_billing_on_empty_catalog() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/billing/info/", Some(&app.user_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["packages"], json!([]));
    assert!(body["data"]["default"]["kubeType"].is_null());
    assert!(body["data"]["default"]["packageId"].is_null());
}

#[tokio::test]
async fn test_missing_billing_setting_counts_as_disabled() {
    let app = TestApp::new();
    app.store
        .connection()
        .execute("DELETE FROM system_settings WHERE name = 'billing_type'", [])
        .unwrap();

    let (status, body) = app
        .get("/api/billing/paymentmethods", Some(&app.user_token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"], "Without billing");
}

#[tokio::test]
async fn test_info_with_billing_delegates_to_provider() {
    let app = TestApp::new();
    app.enable_billing();

    let (status, body) = app
        .get("/api/billing/info?user=alice", Some(&app.user_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["operation"], "get_kuberdock_info");

    let calls = app.provider.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].username.as_deref(), Some("alice"));
    assert_eq!(calls[0].params["user"], "alice");
}

#[tokio::test]
async fn test_payment_methods_with_billing() {
    let app = TestApp::new();
    app.enable_billing();

    let (status, body) = app
        .get("/api/billing/paymentmethods/", Some(&app.user_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["operation"], "get_payment_methods");
}

#[tokio::test]
async fn test_order_dispatches_on_pod_truthiness() {
    let app = TestApp::new();
    app.enable_billing();
    let token = Some(app.user_token.as_str());

    let cases = [
        (json!({ "pod": "{\"name\": \"nginx\"}" }), "order_pod"),
        (json!({ "pod": 1 }), "order_pod"),
        (json!({ "pod": true }), "order_pod"),
        (json!({ "pkgid": 2 }), "order_product"),
        (json!({ "pod": "" }), "order_product"),
        (json!({ "pod": null }), "order_product"),
        (json!({ "pod": 0 }), "order_product"),
        (json!({ "pod": false }), "order_product"),
        (json!({ "pod": {} }), "order_product"),
    ];

    for (params, expected) in cases {
        let (status, body) = app.post_json("/api/billing/order", token, params.clone()).await;
        assert_eq!(status, StatusCode::OK, "params {params}");
        assert_eq!(body["data"]["operation"], expected, "params {params}");
    }
    assert_eq!(app.provider.calls().len(), 9);
}

#[tokio::test]
async fn test_order_accepts_form_body() {
    let app = TestApp::new();
    app.enable_billing();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/billing/order/")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.user_token))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("pod=nginx&pkgid=3"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["operation"], "order_pod");

    let calls = app.provider.calls();
    assert_eq!(calls[0].params["pkgid"], "3");
}

#[tokio::test]
async fn test_trailing_slash_reaches_provider() {
    let app = TestApp::new();
    app.enable_billing();
    let token = Some(app.user_token.as_str());

    let (status, body) = app.get("/api/billing/info/", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["operation"], "get_kuberdock_info");

    let (status, body) = app.get("/api/billing/paymentmethods/", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["operation"], "get_payment_methods");

    let (status, body) = app
        .post_json("/api/billing/order/", token, json!({ "pod": "x" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["operation"], "order_pod");

    let (status, body) = app
        .post_json("/api/billing/orderKubes/", token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["operation"], "order_kubes");
}

#[tokio::test]
async fn test_order_kubes_forwards_params() {
    let app = TestApp::new();
    app.enable_billing();

    let (status, body) = app
        .post_json(
            "/api/billing/orderKubes?pod_id=abc",
            Some(&app.user_token),
            json!({ "pod_id": "xyz", "kubes": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["operation"], "order_kubes");

    let calls = app.provider.calls();
    assert_eq!(calls[0].params["pod_id"], "xyz");
    assert_eq!(calls[0].params["kubes"], 3);
}

#[tokio::test]
async fn test_non_object_json_body_is_rejected() {
    let app = TestApp::new();
    app.enable_billing();

    let (status, body) = app
        .post_json("/api/billing/orderKubes", Some(&app.user_token), json!([1, 2]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_provider_rejection_maps_to_billing_error() {
    let app = TestApp::with_provider(RecordingProvider::rejecting("Insufficient funds"));
    app.enable_billing();

    let (status, body) = app
        .post_json("/api/billing/orderKubes", Some(&app.user_token), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "BillingError");
    assert_eq!(body["data"], "Insufficient funds");
}

#[tokio::test]
async fn test_unregistered_provider_is_server_error() {
    let app = TestApp::new();
    app.store.set_setting("billing_type", "Blesta").unwrap();

    let (status, body) = app
        .get("/api/billing/paymentmethods", Some(&app.user_token))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_maintenance_blocks_users_but_not_admins() {
    let app = TestApp::new();
    app.store.set_setting("maintenance", "true").unwrap();

    let (status, body) = app.get("/api/billing/info", Some(&app.user_token)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["type"], "ServicePaused");

    let (status, _) = app.get("/api/billing/info", Some(&app.admin_token)).await;
    assert_eq!(status, StatusCode::OK);

    app.store.set_setting("maintenance", "false").unwrap();
    let (status, _) = app.get("/api/billing/info", Some(&app.user_token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_maintenance_checks_auth_first() {
    let app = TestApp::new();
    app.store.set_setting("maintenance", "true").unwrap();

    let (status, _) = app.get("/api/billing/info", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_reject_user_tokens() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/v1/admin/settings", Some(&app.user_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["type"], "PermissionDenied");
}

#[tokio::test]
async fn test_admin_settings() {
    let app = TestApp::new();
    let token = Some(app.admin_token.as_str());

    let (status, body) = app.get("/api/v1/admin/settings", token).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert!(names.contains(&"billing_type"));
    assert!(names.contains(&"maintenance"));

    let (status, body) = app
        .put_json(
            "/api/v1/admin/settings/billing_type",
            token,
            json!({ "value": FAKE_PROVIDER }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["value"], FAKE_PROVIDER);

    let (status, body) = app
        .put_json(
            "/api/v1/admin/settings/billing_type",
            token,
            json!({ "value": "Unknown" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, _) = app
        .put_json(
            "/api/v1/admin/settings/billing_type",
            token,
            json!({ "value": "No billing" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/v1/admin/settings/nope", token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_users_and_tokens() {
    let app = TestApp::new();
    let token = Some(app.admin_token.as_str());

    let (status, body) = app
        .post_json("/api/v1/admin/users", token, json!({ "username": "bob" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post_json("/api/v1/admin/users", token, json!({ "username": "bob" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["data"], "Username is already taken");

    // The fixture user created straight through the store is seen too.
    let (status, _) = app
        .post_json("/api/v1/admin/users", token, json!({ "username": "alice" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post_json("/api/v1/admin/users", token, json!({ "username": "-bad" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post_json(
            &format!("/api/v1/admin/users/{user_id}/tokens"),
            token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let raw = body["data"]["token"].as_str().unwrap().to_string();
    assert!(raw.starts_with("kubebill_"));
    assert_eq!(body["data"]["metadata"]["is_admin"], false);
    assert!(body["data"]["metadata"].get("token_hash").is_none());

    // The new token works for billing routes as bob.
    app.enable_billing();
    let (status, _) = app.get("/api/billing/paymentmethods", Some(&raw)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.provider.calls()[0].username.as_deref(), Some("bob"));

    let (status, body) = app
        .get(&format!("/api/v1/admin/users/{user_id}/tokens"), token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .delete(&format!("/api/v1/admin/users/{user_id}"), token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get("/api/billing/paymentmethods", Some(&raw)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_catalog_and_pricing() {
    let app = TestApp::new();
    let admin = Some(app.admin_token.as_str());
    let user = Some(app.user_token.as_str());

    let (status, body) = app
        .post_json(
            "/api/v1/admin/packages",
            admin,
            json!({ "name": "Basic", "currency": "EUR", "prefix": "", "suffix": " EUR" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let package_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["suffix"], " EUR");

    let (status, body) = app
        .post_json(
            "/api/v1/admin/kubes",
            admin,
            json!({ "name": "Standard", "cpu": 0.5, "memory": 256, "disk_space": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let kube_id = body["data"]["id"].as_i64().unwrap();
    assert!(body["data"]["is_default"].is_null());

    let (status, _) = app
        .post_json(
            "/api/v1/admin/kubes",
            admin,
            json!({ "name": "  ", "cpu": 0.5, "memory": 256, "disk_space": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .put_json(&format!("/api/v1/admin/kubes/{kube_id}/default"), admin, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_default"], true);

    let (status, _) = app
        .put_json("/api/v1/admin/kubes/9999/default", admin, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .put_json(
            &format!("/api/v1/admin/packages/{package_id}/kubes/{kube_id}"),
            admin,
            json!({ "kube_price": 3.25 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["kube_price"], 3.25);

    let (status, _) = app
        .put_json(
            &format!("/api/v1/admin/packages/{package_id}/kubes/9999"),
            admin,
            json!({ "kube_price": 1.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/v1/pricing/packages", user).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], "Basic");
    assert_eq!(body["data"][0]["kubes"][0]["price"], 3.25);

    let (status, body) = app
        .get(&format!("/api/v1/pricing/packages/{package_id}"), user)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["kubes"][0]["id"], kube_id);

    let (status, body) = app.get("/api/v1/pricing/kubes", user).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .delete(
            &format!("/api/v1/admin/packages/{package_id}/kubes/{kube_id}"),
            admin,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .delete(
            &format!("/api/v1/admin/packages/{package_id}/kubes/{kube_id}"),
            admin,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/v1/pricing/packages/9999", user).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
