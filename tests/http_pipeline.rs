use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{Method, Request, StatusCode, header},
};
use cloudsave::{
    admission::{AdmissionController, AdmissionPolicy, BucketConfig},
    affinity::{CacheAffinityRouter, HmacSigner},
    profile::{Profile, ProfileItem, ProfileType},
    storage::InMemoryProfileStore,
    sync::ProfileSyncService,
    web::{AppState, build_router},
};
use serde_json::{Value, json};
use tower::ServiceExt;

const SYNC_URI: &str = "/api/game/v2/profile/player1/client";

async fn app_with_capacity(capacity: u32) -> (axum::Router, Arc<InMemoryProfileStore>) {
    app_behind_proxies(capacity, 0).await
}

async fn app_behind_proxies(
    capacity: u32,
    trusted_proxy_hops: usize,
) -> (axum::Router, Arc<InMemoryProfileStore>) {
    let store = Arc::new(InMemoryProfileStore::new());
    store
        .insert(
            Profile::new("player1", ProfileType::Athena)
                .with_revision(3, 3)
                .with_item("skin", ProfileItem::new("AthenaCharacter:cid_001")),
        )
        .await;

    let state = AppState::new(
        Arc::new(AdmissionController::in_memory()),
        AdmissionPolicy::new(BucketConfig::full(capacity, 0.0).unwrap()),
        CacheAffinityRouter::new(Arc::new(HmacSigner::new("http-test-secret").unwrap())),
        ProfileSyncService::new(store.clone()),
    )
    .with_trusted_proxy_hops(trusted_proxy_hops);
    (build_router(state), store)
}

struct Reply {
    status: StatusCode,
    set_cookie: Option<String>,
    body: Value,
}

async fn send(app: &axum::Router, request: Request<Body>) -> Reply {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("response expected");
    let status = response.status();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .map(|value| value.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");

    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&body).expect("body should be valid JSON")
    };
    Reply {
        status,
        set_cookie,
        body,
    }
}

fn operation(name: &str, query: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(Method::POST)
        .uri(format!("{SYNC_URI}/{name}{query}"))
}

fn query_from(peer: [u8; 4], port: u16) -> axum::http::request::Builder {
    operation("QueryProfile", "")
        .header("x-edge-location", "ABC")
        .extension(ConnectInfo(SocketAddr::from((peer, port))))
}

#[tokio::test]
async fn issues_region_cookie_then_reuses_it() {
    let (app, _store) = app_with_capacity(10).await;

    let first = send(
        &app,
        operation("QueryProfile", "?profileId=athena&rvn=3")
            .header("x-edge-location", "ABC")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["profileRevision"], 3);
    assert_eq!(first.body["profileId"], "athena");

    let set_cookie = first.set_cookie.expect("new session receives a cookie");
    assert!(set_cookie.starts_with("cacheIdentifier=ABC-"), "{set_cookie}");
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Path=/"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let second = send(
        &app,
        operation("QueryProfile", "")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(second.status, StatusCode::OK);
    assert!(second.set_cookie.is_none());
}

#[tokio::test]
async fn missing_region_metadata_is_bad_request() {
    let (app, _store) = app_with_capacity(10).await;

    let reply = send(
        &app,
        operation("QueryProfile", "").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "missing_region_metadata");
    assert!(reply.body["error"].is_string());
}

#[tokio::test]
async fn exhausted_bucket_is_too_many_requests() {
    let (app, _store) = app_with_capacity(2).await;

    // each request arrives on a new connection, so the port changes
    for port in [40_001, 40_002] {
        let reply = send(&app, query_from([198, 51, 100, 4], port).body(Body::empty()).unwrap()).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    let limited = send(
        &app,
        query_from([198, 51, 100, 4], 40_003).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body["code"], "rate_limited");

    let other_client = send(
        &app,
        query_from([198, 51, 100, 9], 40_001).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(other_client.status, StatusCode::OK);
}

#[tokio::test]
async fn forged_forwarded_for_does_not_mint_new_budgets() {
    let (app, _store) = app_with_capacity(1).await;

    let statuses: Vec<StatusCode> = futures::future::join_all((0..5).map(|n| {
        let app = app.clone();
        async move {
            let request = query_from([198, 51, 100, 4], 40_000 + n)
                .header("x-forwarded-for", format!("203.0.113.{n}"))
                .body(Body::empty())
                .unwrap();
            send(&app, request).await.status
        }
    }))
    .await;

    let admitted = statuses.iter().filter(|status| **status == StatusCode::OK).count();
    assert_eq!(admitted, 1, "{statuses:?}");
}

#[tokio::test]
async fn trusted_proxy_hop_identifies_the_client() {
    let (app, _store) = app_behind_proxies(1, 1).await;
    let proxy = [10, 0, 0, 2];

    // only the entry appended by the trusted proxy counts
    for (n, forged) in ["6.6.6.6", "7.7.7.7"].into_iter().enumerate() {
        let reply = send(
            &app,
            query_from(proxy, 40_000 + n as u16)
                .header("x-forwarded-for", format!("{forged}, 198.51.100.4"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let expected = if n == 0 {
            StatusCode::OK
        } else {
            StatusCode::TOO_MANY_REQUESTS
        };
        assert_eq!(reply.status, expected, "{forged}");
    }

    let other_client = send(
        &app,
        query_from(proxy, 40_010)
            .header("x-forwarded-for", "198.51.100.9")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(other_client.status, StatusCode::OK);
}

#[tokio::test]
async fn request_errors_map_to_client_statuses() {
    let (app, _store) = app_with_capacity(10).await;

    let cases = [
        ("QueryProfile", "?profileId=nonexistent", StatusCode::BAD_REQUEST, "invalid_profile_type"),
        ("DeleteEverything", "", StatusCode::BAD_REQUEST, "invalid_command"),
        ("QueryProfile", "?profileId=campaign", StatusCode::NOT_FOUND, "profile_not_found"),
    ];

    for (name, query, status, code) in cases {
        let reply = send(
            &app,
            operation(name, query)
                .header("x-edge-location", "ABC")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(reply.status, status, "{name}{query}");
        assert_eq!(reply.body["code"], code, "{name}{query}");
    }
}

#[tokio::test]
async fn mutation_returns_diff_and_persists() {
    let (app, store) = app_with_capacity(10).await;

    let reply = send(
        &app,
        operation("SetItemFavoriteStatus", "?profileId=athena&rvn=3")
            .header("x-edge-location", "ABC")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "targetItemId": "skin", "bFavorite": true }).to_string(),
            ))
            .unwrap(),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["profileRevision"], 4);
    assert_eq!(reply.body["profileChangesBaseRevision"], 3);
    assert_eq!(reply.body["profileCommandRevision"], 4);
    assert_eq!(
        reply.body["profileChanges"],
        json!([{
            "changeType": "itemAttrChanged",
            "itemId": "skin",
            "attributeName": "favorite",
            "attributeValue": true
        }])
    );

    let stored = store.get("player1", ProfileType::Athena).await.unwrap();
    assert_eq!(stored.revision, 4);
}

#[tokio::test]
async fn malformed_query_is_invalid_command() {
    let (app, _store) = app_with_capacity(10).await;

    let reply = send(
        &app,
        operation("QueryProfile", "?profileId=athena&rvn=abc")
            .header("x-edge-location", "ABC")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "invalid_command");
    assert!(reply.body["error"].as_str().unwrap().contains("QueryProfile"));
}

#[tokio::test]
async fn malformed_body_is_invalid_command() {
    let (app, _store) = app_with_capacity(10).await;

    let reply = send(
        &app,
        operation("SetMtxPlatform", "")
            .header("x-edge-location", "ABC")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "invalid_command");
}

#[tokio::test]
async fn health_bypasses_admission_and_affinity() {
    let (app, _store) = app_with_capacity(1).await;

    for _ in 0..3 {
        let reply = send(
            &app,
            Request::builder()
                .method(Method::GET)
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["status"], "ok");
    }
}
