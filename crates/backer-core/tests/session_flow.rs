use std::time::Duration as StdDuration;

use backer_core::{
    AuthError, AuthSessionManager, BackendAuthClient, Config, LoginMethod, OAuthCallbackHandler,
    OAuthCallbackResult, OAuthProvider, Provider, QueryParams, SessionState,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_expiring_in(offset: Duration) -> String {
    let exp = (Utc::now() + offset).timestamp();
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"a@b.com","exp":{}}}"#, exp))
    )
}

fn manager_for(base_url: &str, timeout_secs: u64) -> AuthSessionManager {
    let config = Config {
        backend_url: base_url.to_string(),
        request_timeout_secs: timeout_secs,
        last_email: None,
    };
    AuthSessionManager::new(BackendAuthClient::new(&config).expect("client"))
}

async fn mount_profile(server: &MockServer, token: &str, provider: &str) {
    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "picture": "https://img.example.com/ada.png",
            "provider": provider
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_password_login_sets_bearer_header() {
    let server = MockServer::start().await;
    let token = token_expiring_in(Duration::hours(1));
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"email": "a@b.com", "password": "secret"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"token": token, "role": "user"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut manager = manager_for(&server.uri(), 10);
    manager
        .login_with_password("a@b.com", "secret")
        .await
        .expect("login succeeds");

    assert!(manager.is_authenticated());
    assert_eq!(manager.state(), SessionState::Authenticated);
    assert_eq!(manager.role(), Some("user"));
    assert_eq!(manager.profile().map(|p| p.provider), Some(Provider::Password));
    assert_eq!(manager.profile().map(|p| p.email.as_str()), Some("a@b.com"));
    assert_eq!(manager.credential().map(|c| c.method()), Some(LoginMethod::Password));

    let headers = manager.auth_header();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers.get("Authorization"), Some(&format!("Bearer {}", token)));
}

#[tokio::test]
async fn test_password_login_role_defaults_to_user() {
    let server = MockServer::start().await;
    let token = token_expiring_in(Duration::hours(1));
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": token})))
        .mount(&server)
        .await;

    let mut manager = manager_for(&server.uri(), 10);
    manager.login_with_password("a@b.com", "secret").await.unwrap();
    assert_eq!(manager.role(), Some("user"));
}

#[tokio::test]
async fn test_password_login_with_unusable_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"token": "t1", "role": "user"})),
        )
        .mount(&server)
        .await;

    let mut manager = manager_for(&server.uri(), 10);
    assert_eq!(manager.login_with_password("a@b.com", "secret").await, Ok(()));

    // The exchange succeeded, but the token carries no readable expiry
    assert_eq!(manager.token_expiry(), Some(Err(AuthError::MalformedToken)));
    assert!(!manager.is_authenticated());
    assert!(manager.auth_header().is_empty());
    assert_eq!(manager.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_wrong_password_is_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "bad login"})))
        .mount(&server)
        .await;

    let mut manager = manager_for(&server.uri(), 10);
    let result = manager.login_with_password("a@b.com", "wrong").await;
    assert_eq!(result, Err(AuthError::InvalidCredentials));
    assert!(!manager.is_authenticated());
}

#[tokio::test]
async fn test_server_error_is_backend_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut manager = manager_for(&server.uri(), 10);
    let result = manager.login_with_password("a@b.com", "secret").await;
    assert_eq!(result, Err(AuthError::BackendUnreachable));
}

#[tokio::test]
async fn test_login_timeout_is_backend_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"token": "t1"}))
                .set_delay(StdDuration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut manager = manager_for(&server.uri(), 1);
    let result = manager.login_with_password("a@b.com", "secret").await;
    assert_eq!(result, Err(AuthError::BackendUnreachable));
    assert!(!manager.is_authenticated());
}

#[tokio::test]
async fn test_connection_refused_is_backend_unreachable() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let mut manager = manager_for(&uri, 2);
    let result = manager.login_with_password("a@b.com", "secret").await;
    assert_eq!(result, Err(AuthError::BackendUnreachable));
}

#[tokio::test]
async fn test_oauth_callback_authenticates_with_profile_provider() {
    let server = MockServer::start().await;
    let token = token_expiring_in(Duration::hours(1));
    mount_profile(&server, &token, "google").await;

    let mut manager = manager_for(&server.uri(), 10);
    manager.mark_oauth_pending(OAuthProvider::Google);
    assert_eq!(manager.state(), SessionState::OAuthPending(OAuthProvider::Google));

    let handler = OAuthCallbackHandler::new();
    let mut params = QueryParams::from_query(&format!("access_token={}&page=home", token));
    let outcome = handler.handle(&mut params, &mut manager).await;

    assert_eq!(outcome, Some(Ok(())));
    assert!(manager.is_authenticated());
    assert_eq!(manager.state(), SessionState::Authenticated);
    let profile = manager.profile().expect("profile stored");
    assert_eq!(profile.provider, Provider::Google);
    assert_eq!(profile.name, "Ada Lovelace");
    assert_eq!(
        manager.credential().map(|c| c.method()),
        Some(LoginMethod::OAuth(OAuthProvider::Google))
    );
    assert_eq!(manager.role(), Some("user"));
    assert_eq!(params.to_query_string(), "page=home");
}

#[tokio::test]
async fn test_redirect_is_processed_once() {
    let server = MockServer::start().await;
    let token = token_expiring_in(Duration::hours(1));
    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "email": "ada@example.com",
            "provider": "facebook"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut manager = manager_for(&server.uri(), 10);
    let handler = OAuthCallbackHandler::new();
    let mut params = QueryParams::from_query(&format!("access_token={}", token));

    assert_eq!(handler.handle(&mut params, &mut manager).await, Some(Ok(())));
    assert_eq!(handler.handle(&mut params, &mut manager).await, None);
    assert!(manager.is_authenticated());
}

#[tokio::test]
async fn test_oauth_with_expired_token_is_not_authenticated() {
    let server = MockServer::start().await;
    let token = token_expiring_in(Duration::minutes(-5));
    mount_profile(&server, &token, "facebook").await;

    let mut manager = manager_for(&server.uri(), 10);
    let result = manager
        .complete_oauth(OAuthCallbackResult::Token(token))
        .await;

    assert_eq!(result, Ok(()));
    assert!(!manager.is_authenticated());
    assert_eq!(manager.state(), SessionState::Anonymous);
    assert!(manager.auth_header().is_empty());
}

#[tokio::test]
async fn test_profile_fetch_failure_leaves_anonymous() {
    let server = MockServer::start().await;
    let old_token = token_expiring_in(Duration::hours(1));
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": old_token})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut manager = manager_for(&server.uri(), 10);
    manager.login_with_password("a@b.com", "secret").await.unwrap();
    assert!(manager.is_authenticated());

    let result = manager
        .complete_oauth(OAuthCallbackResult::Token(token_expiring_in(Duration::hours(1))))
        .await;

    assert_eq!(result, Err(AuthError::ProfileFetchFailed));
    assert!(!manager.is_authenticated());
    assert!(manager.credential().is_none());
    assert_eq!(manager.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_profile_fetch_server_error_is_backend_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let mut manager = manager_for(&server.uri(), 10);
    let result = manager
        .complete_oauth(OAuthCallbackResult::Token(token_expiring_in(Duration::hours(1))))
        .await;

    assert_eq!(result, Err(AuthError::BackendUnreachable));
    assert!(manager.credential().is_none());
}

#[tokio::test]
async fn test_profile_fetch_connection_refused_is_backend_unreachable() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let mut manager = manager_for(&uri, 2);
    let result = manager
        .complete_oauth(OAuthCallbackResult::Token(token_expiring_in(Duration::hours(1))))
        .await;

    assert_eq!(result, Err(AuthError::BackendUnreachable));
    assert!(manager.credential().is_none());
    assert_eq!(manager.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_profile_fetch_timeout_is_backend_unreachable() {
    let server = MockServer::start().await;
    let token = token_expiring_in(Duration::hours(1));
    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"email": "ada@example.com", "provider": "google"}))
                .set_delay(StdDuration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut manager = manager_for(&server.uri(), 1);
    let result = manager
        .complete_oauth(OAuthCallbackResult::Token(token))
        .await;

    assert_eq!(result, Err(AuthError::BackendUnreachable));
    assert!(manager.credential().is_none());
    assert!(!manager.is_authenticated());
}

#[tokio::test]
async fn test_profile_with_unknown_provider_fails() {
    let server = MockServer::start().await;
    let token = token_expiring_in(Duration::hours(1));
    mount_profile(&server, &token, "myspace").await;

    let mut manager = manager_for(&server.uri(), 10);
    let result = manager
        .complete_oauth(OAuthCallbackResult::Token(token))
        .await;
    assert_eq!(result, Err(AuthError::ProfileFetchFailed));
    assert!(manager.credential().is_none());
}

#[tokio::test]
async fn test_provider_denied_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut manager = manager_for(&server.uri(), 10);
    let handler = OAuthCallbackHandler::new();
    let mut params = QueryParams::from_query("error=access_denied");

    let outcome = handler.handle(&mut params, &mut manager).await;
    assert_eq!(
        outcome,
        Some(Err(AuthError::ProviderDenied("access_denied".to_string())))
    );
    assert!(!manager.is_authenticated());
    assert!(manager.credential().is_none());
}

#[tokio::test]
async fn test_logout_notifies_backend_and_clears() {
    let server = MockServer::start().await;
    let token = token_expiring_in(Duration::hours(1));
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": token})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut manager = manager_for(&server.uri(), 10);
    manager.login_with_password("a@b.com", "secret").await.unwrap();
    manager.logout().await;

    assert!(!manager.is_authenticated());
    assert_eq!(manager.state(), SessionState::Anonymous);
    assert!(manager.auth_header().is_empty());
}

#[tokio::test]
async fn test_logout_succeeds_when_backend_fails() {
    let server = MockServer::start().await;
    let token = token_expiring_in(Duration::hours(1));
    mount_profile(&server, &token, "google").await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let mut manager = manager_for(&server.uri(), 10);
    manager
        .complete_oauth(OAuthCallbackResult::Token(token))
        .await
        .unwrap();
    assert!(manager.is_authenticated());

    manager.logout().await;
    assert!(!manager.is_authenticated());
}

#[tokio::test]
async fn test_logout_without_login_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut manager = manager_for(&server.uri(), 10);
    manager.logout().await;
    manager.logout().await;
    assert!(!manager.is_authenticated());
}

#[tokio::test]
async fn test_provider_status_degrades_to_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let manager = manager_for(&server.uri(), 10);
    let status = manager.provider_status().await;
    assert!(!status.google_available);
    assert!(!status.facebook_available);
}

#[tokio::test]
async fn test_provider_status_reports_available() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "google_available": true,
            "facebook_available": false
        })))
        .mount(&server)
        .await;

    let manager = manager_for(&server.uri(), 10);
    let status = manager.provider_status().await;
    assert_eq!(status.available(), vec![OAuthProvider::Google]);
}

#[tokio::test]
async fn test_provider_status_unreachable_backend() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let manager = manager_for(&uri, 2);
    assert!(manager.provider_status().await.available().is_empty());
}
