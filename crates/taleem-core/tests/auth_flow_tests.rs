mod common;

use std::sync::Arc;

use reqwest::Method;
use serde_json::json;
use taleem_core::api::RequestBody;
use taleem_core::auth::{AuthError, AuthService, FileStore, SessionStore, SignupForm, StoreKey};
use taleem_core::models::Role;
use taleem_core::{ApiClient, ApiConfig};

use common::*;

fn auth_payload(role: &str) -> serde_json::Value {
    json!({
        "message": "Login successful!",
        "tokens": {"access": "acc-1", "refresh": "ref-1"},
        "user": {"id": 5, "full_name": "Zainab Noor", "email": "zainab@example.com", "role": role}
    })
}

#[tokio::test]
async fn login_persists_tokens_and_profile() {
    let transport = ScriptedTransport::new(|req| {
        assert_eq!(relative_path(req), "auth/login/");
        assert_eq!(req.method, Method::POST);
        // Any stale session is dropped before the credentials go out
        assert!(bearer(req).is_none());
        match &req.body {
            RequestBody::Json(body) => {
                assert_eq!(body, &json!({"email": "zainab@example.com", "password": "pw"}))
            }
            other => panic!("unexpected body {:?}", other),
        }
        json_response(200, auth_payload("admin"))
    });
    let store = store_with(Some("stale"), Some("stale-refresh"));
    let listener = Arc::new(CountingListener::default());
    let auth = AuthService::new(client(transport, store.clone(), listener));

    let outcome = auth.login("zainab@example.com", "pw").await.unwrap();

    assert_eq!(outcome.user.name, "Zainab Noor");
    assert_eq!(outcome.user.role, Role::Admin);
    assert_eq!(outcome.landing_path(), "/admin");
    assert_eq!(outcome.message.as_deref(), Some("Login successful!"));
    assert_eq!(store.get(StoreKey::AccessToken).unwrap().as_deref(), Some("acc-1"));
    assert_eq!(store.get(StoreKey::RefreshToken).unwrap().as_deref(), Some("ref-1"));
    assert_eq!(auth.current_user().unwrap(), Some(outcome.user));
}

#[tokio::test]
async fn login_recovers_from_corrupt_session_file() {
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("session.json");
    std::fs::write(&session_file, r#"{"access_token": "ab"#).unwrap();

    let transport = ScriptedTransport::new(|req| {
        assert!(bearer(req).is_none());
        json_response(200, auth_payload("student"))
    });
    let store = Arc::new(FileStore::new(dir.path().to_path_buf()));
    let config = ApiConfig::new(BASE_URL).unwrap();
    let auth = AuthService::new(ApiClient::with_transport(config, transport, store.clone()));

    let outcome = auth.login("zainab@example.com", "pw").await.unwrap();

    assert_eq!(outcome.landing_path(), "/dashboard");
    assert_eq!(store.get(StoreKey::AccessToken).unwrap().as_deref(), Some("acc-1"));
    assert!(session_file.exists());

    auth.logout().unwrap();
    assert!(!session_file.exists());
}

#[tokio::test]
async fn login_rejects_incomplete_response() {
    let transport = ScriptedTransport::new(|_| json_response(200, json!({"message": "ok"})));
    let store = store_with(None, None);
    let listener = Arc::new(CountingListener::default());
    let auth = AuthService::new(client(transport, store.clone(), listener));

    let err = auth.login("a@example.com", "pw").await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidResponse(_)));
    assert_eq!(store.get(StoreKey::AccessToken).unwrap(), None);
    assert_eq!(auth.current_user().unwrap(), None);
}

#[tokio::test]
async fn login_surfaces_server_message() {
    let transport = ScriptedTransport::new(|_| {
        json_response(400, json!({"non_field_errors": ["Invalid email or password"]}))
    });
    let listener = Arc::new(CountingListener::default());
    let auth = AuthService::new(client(transport, store_with(None, None), listener));

    let err = auth.login("a@example.com", "wrong").await.unwrap_err();

    assert_eq!(err.user_message(), "Invalid email or password");
}

#[tokio::test]
async fn login_requires_credentials_before_sending() {
    let transport = ScriptedTransport::new(|_| panic!("nothing should be sent"));
    let listener = Arc::new(CountingListener::default());
    let auth = AuthService::new(client(transport.clone(), store_with(None, None), listener));

    let err = auth.login("  ", "pw").await.unwrap_err();

    assert!(matches!(err, AuthError::Validation(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn signup_posts_form_and_persists_session() {
    let transport = ScriptedTransport::new(|req| {
        assert_eq!(relative_path(req), "auth/register/");
        match &req.body {
            RequestBody::Json(body) => {
                assert_eq!(body["school_name"], "Govt. High School");
                assert_eq!(body["role"], "student");
            }
            other => panic!("unexpected body {:?}", other),
        }
        json_response(201, auth_payload("student"))
    });
    let store = store_with(None, None);
    let listener = Arc::new(CountingListener::default());
    let auth = AuthService::new(client(transport, store.clone(), listener));

    let form = SignupForm {
        full_name: "Zainab Noor".to_string(),
        email: "zainab@example.com".to_string(),
        password: "pw12345".to_string(),
        confirm_password: "pw12345".to_string(),
        school_name: "Govt. High School".to_string(),
        role: Role::Student,
    };
    let outcome = auth.signup(&form).await.unwrap();

    assert_eq!(outcome.landing_path(), "/dashboard");
    assert_eq!(store.get(StoreKey::RefreshToken).unwrap().as_deref(), Some("ref-1"));
}

#[tokio::test]
async fn signup_validation_blocks_request() {
    let transport = ScriptedTransport::new(|_| panic!("nothing should be sent"));
    let listener = Arc::new(CountingListener::default());
    let auth = AuthService::new(client(transport.clone(), store_with(None, None), listener));

    let form = SignupForm {
        full_name: "X".to_string(),
        email: "x@example.com".to_string(),
        password: "one".to_string(),
        confirm_password: "two".to_string(),
        school_name: "S".to_string(),
        role: Role::Student,
    };
    let err = auth.signup(&form).await.unwrap_err();

    assert_eq!(err.user_message(), "Passwords do not match");
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn logout_clears_every_key() {
    let transport = ScriptedTransport::new(|_| json_response(200, json!({})));
    let store = store_with(Some("acc"), Some("ref"));
    let listener = Arc::new(CountingListener::default());
    let auth = AuthService::new(client(transport, store.clone(), listener.clone()));
    assert!(auth.current_user().unwrap().is_some());

    auth.logout().unwrap();

    for key in StoreKey::ALL {
        assert_eq!(store.get(key).unwrap(), None);
    }
    assert_eq!(auth.current_user().unwrap(), None);
    // Logging out is not a forced redirect
    assert_eq!(listener.count(), 0);
}
