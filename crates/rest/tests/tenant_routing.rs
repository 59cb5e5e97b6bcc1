//! Integration tests for host-based tenant routing.
//!
//! Requests are routed by their `Host` header. Each test provisions tenants
//! over the admin API and then talks to their business endpoints.

mod common;

use std::sync::Arc;

use axum::http::{HeaderValue, StatusCode, header::LOCATION};
use serde_json::{Value, json};

use realty_rest::ServerConfig;

use common::*;

// =============================================================================
// Routing
// =============================================================================

#[tokio::test]
async fn test_provisioned_tenant_end_to_end() {
    let server = create_test_server().await;

    let created = provision(&server, "Acme Realty", "acme.example.com").await;
    assert_eq!(created["tenant_id"], "acme-realty");
    assert_eq!(created["partition_id"], "tenant_acme_realty");
    assert_eq!(created["status"], "ready");

    let response = on_host(server.get("/api/_tenant"), "acme.example.com").await;
    response.assert_status_ok();
    let bound = response.json::<Value>();
    assert_eq!(bound["tenant_id"], "acme-realty");
    assert_eq!(bound["partition_id"], "tenant_acme_realty");
    assert_eq!(bound["shared_partition"], "shared");

    let response = on_host(server.post("/api/properties/property"), "acme.example.com")
        .json(&json!({"id": "elm", "name": "Elm Court"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(
        response.header(LOCATION),
        HeaderValue::from_static("/api/properties/property/elm")
    );
    let property = response.json::<Value>();
    assert_eq!(property["name"], "Elm Court");
    assert!(property.get("partition_id").is_none());

    let response = on_host(server.get("/api/properties/property/elm"), "acme.example.com").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["name"], "Elm Court");
}

#[tokio::test]
async fn test_tenants_do_not_see_each_other() {
    let server = create_test_server().await;
    provision(&server, "Acme", "acme.example.com").await;
    provision(&server, "Globex", "globex.example.com").await;

    on_host(server.post("/api/properties/property"), "acme.example.com")
        .json(&json!({"id": "hq", "name": "Acme Tower"}))
        .await
        .assert_status(StatusCode::CREATED);

    let response = on_host(server.get("/api/properties/property/hq"), "globex.example.com").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = on_host(server.get("/api/properties/property"), "globex.example.com").await;
    response.assert_status_ok();
    let page = response.json::<Value>();
    assert_eq!(page["total"], 0);
    assert_eq!(page["items"], json!([]));

    // The same ID is free in another tenant's partition.
    on_host(server.post("/api/properties/property"), "globex.example.com")
        .json(&json!({"id": "hq", "name": "Globex Plaza"}))
        .await
        .assert_status(StatusCode::CREATED);

    let acme = on_host(server.get("/api/properties/property/hq"), "acme.example.com").await;
    assert_eq!(acme.json::<Value>()["name"], "Acme Tower");
}

#[tokio::test]
async fn test_unknown_host_is_not_found() {
    let server = create_test_server().await;
    provision(&server, "Acme", "acme.example.com").await;

    let response = on_host(server.get("/api/_tenant"), "initech.example.com").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body = response.json::<Value>();
    assert_eq!(body["error"], "unknown-tenant");
    assert_eq!(body["message"], "Not found");

    // Malformed hosts get the same answer.
    let response = on_host(server.get("/api/_tenant"), "-bad-.example.com").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"], "unknown-tenant");
}

#[tokio::test]
async fn test_host_is_normalized() {
    let server = create_test_server().await;
    provision(&server, "Acme", "acme.example.com").await;

    let response = on_host(server.get("/api/_tenant"), "ACME.Example.COM:8443").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["tenant_id"], "acme");
}

#[tokio::test]
async fn test_deprovisioned_tenant_stops_routing() {
    let server = create_test_server().await;
    provision(&server, "Acme", "acme.example.com").await;

    server
        .post("/_admin/tenants/acme/deprovision")
        .await
        .assert_status_ok();

    let response = on_host(server.get("/api/_tenant"), "acme.example.com").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"], "unknown-tenant");
}

#[tokio::test]
async fn test_forwarded_host_only_when_trusted() {
    let server = create_test_server().await;
    provision(&server, "Acme", "acme.example.com").await;
    provision(&server, "Globex", "globex.example.com").await;

    let response = on_host(server.get("/api/_tenant"), "acme.example.com")
        .add_header(X_FORWARDED_HOST, HeaderValue::from_static("globex.example.com"))
        .await;
    assert_eq!(response.json::<Value>()["tenant_id"], "acme");

    let trusted = create_test_server_with(ServerConfig {
        trust_forwarded_host: true,
        ..ServerConfig::for_testing()
    })
    .await;
    provision(&trusted, "Acme", "acme.example.com").await;
    provision(&trusted, "Globex", "globex.example.com").await;

    let response = on_host(trusted.get("/api/_tenant"), "proxy.internal.example.com")
        .add_header(X_FORWARDED_HOST, HeaderValue::from_static("globex.example.com"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["tenant_id"], "globex");
}

#[tokio::test]
async fn test_probes_skip_tenant_routing() {
    let server = create_test_server().await;

    let response = on_host(server.get("/health"), "nobody.example.com").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "sqlite");

    server.get("/_liveness").await.assert_status_ok();

    let response = server.get("/_readiness").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["checks"]["storage"], "ok");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let server = create_test_server().await;
    provision(&server, "Acme", "acme.example.com").await;

    let response = on_host(server.get("/api/_tenant"), "acme.example.com")
        .add_header(X_REQUEST_ID, HeaderValue::from_static("req-42"))
        .await;
    assert_eq!(response.header(X_REQUEST_ID), HeaderValue::from_static("req-42"));

    // One is generated when the client sends none.
    let response = on_host(server.get("/api/_tenant"), "acme.example.com").await;
    assert!(!response.header(X_REQUEST_ID).is_empty());
}

// =============================================================================
// Entities
// =============================================================================

#[tokio::test]
async fn test_create_errors() {
    let server = create_test_server().await;
    provision(&server, "Acme", "acme.example.com").await;
    let host = "acme.example.com";

    // Missing required field.
    let response = on_host(server.post("/api/properties/unit"), host)
        .json(&json!({"unit_number": "1A"}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    // Reference to a record that does not exist in this partition.
    let response = on_host(server.post("/api/properties/unit"), host)
        .json(&json!({"property_id": "nowhere", "unit_number": "1A"}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["error"], "processing");

    // Unknown entity, or an entity under the wrong module.
    on_host(server.get("/api/properties/spaceship"), host)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    on_host(server.get("/api/leasing/property"), host)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // Duplicate ID.
    on_host(server.post("/api/leasing/resident"), host)
        .json(&json!({"id": "r-1", "full_name": "Ada"}))
        .await
        .assert_status(StatusCode::CREATED);
    let response = on_host(server.post("/api/leasing/resident"), host)
        .json(&json!({"id": "r-1", "full_name": "Ada again"}))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    // Body that is not JSON.
    let response = on_host(server.post("/api/leasing/resident"), host)
        .text("not json")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_shared_plans_visible_to_every_tenant() {
    let server = create_test_server().await;
    provision(&server, "Acme", "acme.example.com").await;
    provision(&server, "Globex", "globex.example.com").await;

    on_host(server.post("/api/platform/subscription_plan"), "acme.example.com")
        .json(&json!({"id": "pro", "name": "Pro", "max_units": 500}))
        .await
        .assert_status(StatusCode::CREATED);

    let response = on_host(
        server.get("/api/platform/subscription_plan/pro"),
        "globex.example.com",
    )
    .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["max_units"], 500);

    on_host(server.post("/api/properties/property"), "globex.example.com")
        .json(&json!({"name": "Globex Plaza", "plan_id": "pro"}))
        .await
        .assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_list_pagination() {
    let server = create_test_server().await;
    provision(&server, "Acme", "acme.example.com").await;
    let host = "acme.example.com";

    for i in 0..5 {
        on_host(server.post("/api/maintenance/vendor"), host)
            .json(&json!({"id": format!("v-{}", i), "company_name": format!("Vendor {}", i)}))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let response = on_host(server.get("/api/maintenance/vendor?count=2&offset=2"), host).await;
    response.assert_status_ok();
    let page = response.json::<Value>();
    assert_eq!(page["total"], 5);
    assert_eq!(page["count"], 2);
    assert_eq!(page["offset"], 2);
    assert_eq!(page["has_more"], true);
    assert_eq!(page["items"][0]["id"], "v-2");
    assert_eq!(page["items"][1]["id"], "v-3");

    // Default and maximum sizes come from the configuration.
    let page = on_host(server.get("/api/maintenance/vendor"), host)
        .await
        .json::<Value>();
    assert_eq!(page["count"], 10);
    let page = on_host(server.get("/api/maintenance/vendor?count=1000"), host)
        .await
        .json::<Value>();
    assert_eq!(page["count"], 100);

    on_host(server.get("/api/maintenance/vendor?count=0"), host)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    on_host(server.get("/api/maintenance/vendor?count=abc"), host)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_stay_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(create_file_test_server(&dir).await);
    let tenants = ["acme", "globex", "initech"];
    for name in tenants {
        provision(&server, name, &format!("{}.example.com", name)).await;
    }

    let mut tasks = tokio::task::JoinSet::new();
    for name in tenants {
        for i in 0..8 {
            let server = Arc::clone(&server);
            tasks.spawn(async move {
                let host = format!("{}.example.com", name);
                let response = on_host(server.post("/api/leasing/resident"), &host)
                    .json(&json!({"full_name": format!("{} resident {}", name, i)}))
                    .await;
                response.assert_status(StatusCode::CREATED);

                let bound = on_host(server.get("/api/_tenant"), &host)
                    .await
                    .json::<Value>();
                assert_eq!(bound["tenant_id"], name);
            });
        }
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    for name in tenants {
        let host = format!("{}.example.com", name);
        let page = on_host(server.get("/api/leasing/resident?count=50"), &host)
            .await
            .json::<Value>();
        assert_eq!(page["total"], 8);
        for item in page["items"].as_array().unwrap() {
            assert!(item["full_name"].as_str().unwrap().starts_with(name));
        }
    }
}
