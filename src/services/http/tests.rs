use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use super::{router, AppState};
use crate::models::admin::Stats;
use crate::models::ledger::{LedgerEntry, LedgerKind};
use crate::models::packages::InvestmentPackage;
use crate::models::users::{LoginSession, Profile, SessionUser};
use crate::rules::RuleViolation;
use crate::services::{
    admin::AdminRequest, deposits::DepositRequest, packages::PackageRequest,
    referrals::ReferralRequest, tasks::TaskRequest, users::UserRequest,
    withdrawals::WithdrawalRequest, ServiceError,
};

/// Answers every request on the returned channel with `answer`. Requests the
/// closure ignores drop their reply sender.
fn stub<R: Send + 'static>(mut answer: impl FnMut(R) + Send + 'static) -> mpsc::Sender<R> {
    let (tx, mut rx) = mpsc::channel(8);

    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            answer(request);
        }
    });

    tx
}

fn profile(id: &str) -> Profile {
    Profile {
        id: id.to_string(),
        email: "alice@example.com".into(),
        name: "alice".into(),
        balance_in_cents: 4_500,
        referral_code: "ABCD1234".into(),
        deposit_link: None,
        is_verified: true,
        is_admin: false,
        total_invested_in_cents: 3_000,
        created_at: Utc::now(),
    }
}

fn users() -> mpsc::Sender<UserRequest> {
    stub(|request: UserRequest| match request {
        UserRequest::ResolveSession { token, response } => {
            let user = match token.as_str() {
                "user-token" => Ok(SessionUser {
                    id: "user-1".into(),
                    is_admin: false,
                }),
                "admin-token" => Ok(SessionUser {
                    id: "admin-1".into(),
                    is_admin: true,
                }),
                _ => Err(ServiceError::Unauthorized("Unauthorized".into())),
            };
            let _ = response.send(user);
        }
        UserRequest::Login {
            credentials,
            response,
        } => {
            let session = if credentials.password == "secret1" {
                Ok(LoginSession {
                    token: "fresh-token".into(),
                    expires_at: Utc::now() + Duration::hours(1),
                    user: profile("user-1"),
                })
            } else {
                Err(ServiceError::Unauthorized("Invalid credentials".into()))
            };
            let _ = response.send(session);
        }
        UserRequest::Logout { response, .. } => {
            let _ = response.send(Ok(()));
        }
        UserRequest::GetProfile { user_id, response } => {
            let _ = response.send(Ok(profile(&user_id)));
        }
        _ => {}
    })
}

fn state() -> AppState {
    AppState {
        user_channel: users(),
        deposit_channel: stub(|_: DepositRequest| {}),
        withdrawal_channel: stub(|_: WithdrawalRequest| {}),
        task_channel: stub(|_: TaskRequest| {}),
        package_channel: stub(|_: PackageRequest| {}),
        referral_channel: stub(|_: ReferralRequest| {}),
        admin_channel: stub(|_: AdminRequest| {}),
    }
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn health_check_responds_ok() {
    let app = router(state());

    let response = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let (status, body) = send(router(state()), request("GET", "/api/tasks", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Unauthorized" }));

    let (status, _) = send(
        router(state()),
        request("GET", "/api/tasks", Some("expired-token"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let (status, body) = send(
        router(state()),
        request("GET", "/api/admin/stats", Some("user-token"), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn admin_stats_are_served_to_admins() {
    let mut state = state();
    state.admin_channel = stub(|request: AdminRequest| {
        if let AdminRequest::GetStats { response } = request {
            let _ = response.send(Ok(Stats {
                total_users: 3,
                pending_deposits: 1,
                ..Stats::default()
            }));
        }
    });

    let (status, body) = send(
        router(state),
        request("GET", "/api/admin/stats", Some("admin-token"), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_users"], 3);
    assert_eq!(body["pending_deposits"], 1);
    assert_eq!(body["total_withdrawals_in_cents"], 0);
}

#[tokio::test]
async fn admin_ledger_reads_user_from_path() {
    let mut state = state();
    state.admin_channel = stub(|request: AdminRequest| {
        if let AdminRequest::GetLedger { user_id, response } = request {
            let _ = response.send(Ok(vec![LedgerEntry {
                id: "entry-1".into(),
                user_id,
                amount_in_cents: 3_000,
                kind: LedgerKind::Deposit,
                reference_id: Some("deposit-1".into()),
                created_at: Utc::now(),
            }]));
        }
    });

    let (status, body) = send(
        router(state),
        request("GET", "/api/admin/users/user-7/ledger", Some("admin-token"), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"][0]["user_id"], "user-7");
    assert_eq!(body["entries"][0]["kind"], "deposit");
}

#[tokio::test]
async fn login_sets_the_session_cookie() {
    let app = router(state());

    let response = app
        .oneshot(request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "secret1" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("token=fresh-token;"));
    assert!(cookie.contains("HttpOnly"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["token"], "fresh-token");
    assert_eq!(body["user"]["id"], "user-1");
}

#[tokio::test]
async fn login_with_bad_credentials_is_unauthorized() {
    let (status, body) = send(
        router(state()),
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "wrong" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn logout_clears_the_cookie() {
    let app = router(state());
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .header(header::COOKIE, "token=user-token")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap();
    assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn me_returns_the_callers_profile() {
    let app = router(state());
    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::COOKIE, "theme=dark; token=user-token")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "user-1");
    assert_eq!(body["total_invested_in_cents"], 3_000);
}

#[tokio::test]
async fn rule_violations_are_bad_requests() {
    let mut state = state();
    state.deposit_channel = stub(|request: DepositRequest| {
        if let DepositRequest::CreateDeposit {
            user_id, response, ..
        } = request
        {
            let result = if user_id == "user-1" {
                Err(ServiceError::from(RuleViolation::DepositBelowMinimum))
            } else {
                Err(ServiceError::NotFound("User not found".into()))
            };
            let _ = response.send(result);
        }
    });

    let (status, body) = send(
        router(state),
        request(
            "POST",
            "/api/deposits",
            Some("user-token"),
            Some(json!({
                "amount_in_cents": 1_000,
                "transaction_id": "TX-1",
                "screenshot": "data:image/png;base64,AAAA",
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Minimum deposit is $30.00");
}

#[tokio::test]
async fn claim_requires_a_purchase_id() {
    let (status, body) = send(
        router(state()),
        request("POST", "/api/packages/claim", Some("user-token"), Some(json!({}))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Purchase ID is required");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = router(state());
    let request = Request::builder()
        .method("POST")
        .uri("/api/tasks/complete")
        .header(header::AUTHORIZATION, "Bearer user-token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn packages_are_listed_for_signed_in_users() {
    let mut state = state();
    state.package_channel = stub(|request: PackageRequest| {
        if let PackageRequest::ListPackages { response } = request {
            let _ = response.send(Ok(vec![InvestmentPackage {
                id: "starter".into(),
                name: "Starter".into(),
                price_in_cents: 1_000,
                daily_return_in_cents: 25,
                total_days: 30,
                is_active: true,
            }]));
        }
    });

    let (status, body) = send(
        router(state.clone()),
        request("GET", "/api/packages", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, body) = send(
        router(state),
        request("GET", "/api/packages", Some("user-token"), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["packages"][0]["name"], "Starter");
    assert_eq!(body["packages"][0]["price_in_cents"], 1_000);
    assert_eq!(body["packages"][0]["daily_return_in_cents"], 25);
}

#[tokio::test]
async fn task_list_is_keyed_by_resource() {
    let mut state = state();
    state.task_channel = stub(|request: TaskRequest| {
        if let TaskRequest::ListTasks { response, .. } = request {
            let _ = response.send(Ok(Vec::new()));
        }
    });

    let (status, body) = send(
        router(state),
        request("GET", "/api/tasks", Some("user-token"), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "tasks": [] }));
}

#[tokio::test]
async fn dropped_replies_become_internal_errors() {
    let (status, body) = send(
        router(state()),
        request("GET", "/api/referral", Some("user-token"), None),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Internal server error" }));
}
