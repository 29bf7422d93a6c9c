use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;

use super::*;
use crate::test_utils::{
    ScriptedHttpClient, TEST_IAM_ENDPOINT, iam_token_body, init_dummy_tracing_subscriber,
    response,
};
use crate::types::error::find_cos_error;

const LOOKAHEAD: Duration = Duration::from_secs(300);

fn make_manager(http: &ScriptedHttpClient) -> TokenManager {
    TokenManager::new(
        ApiKey::new("my key/with+specials"),
        TEST_IAM_ENDPOINT,
        LOOKAHEAD,
        Arc::new(http.clone()),
    )
}

fn token_expiring_in(token: &str, secs: i64) -> AccessToken {
    AccessToken {
        token: token.to_string(),
        expires_at: Utc::now() + chrono::Duration::seconds(secs),
    }
}

#[test]
fn empty_token_is_never_fresh() {
    let token = AccessToken::empty();
    assert!(!token.is_fresh(Utc::now(), LOOKAHEAD));
}

#[test]
fn token_freshness_respects_lookahead() {
    let now = Utc::now();
    let token = AccessToken {
        token: "t".to_string(),
        expires_at: now + chrono::Duration::seconds(301),
    };
    assert!(token.is_fresh(now, LOOKAHEAD));

    let token = AccessToken {
        token: "t".to_string(),
        expires_at: now + chrono::Duration::seconds(300),
    };
    assert!(!token.is_fresh(now, LOOKAHEAD));
}

#[test]
fn debug_redacts_token() {
    let token = token_expiring_in("eyJraWQiOiIyMDIwMDMyNjE0MTkiLCJhbGciOiJSUzI1NiJ9", 3600);
    let printed = format!("{token:?}");
    assert!(printed.contains("eyJraWQi..."));
    assert!(!printed.contains("RS256"));
    assert!(!printed.contains("MjAyMDAz"));
}

#[tokio::test]
async fn first_call_exchanges_api_key() {
    init_dummy_tracing_subscriber();

    let http = ScriptedHttpClient::new(|_| Ok(response(200, iam_token_body("token-1", 3600))));
    let manager = make_manager(&http);

    let token = manager.ensure_valid_token().await.unwrap();
    assert_eq!(token, "token-1");
    assert_eq!(http.count_matching(TEST_IAM_ENDPOINT), 1);

    let requests = http.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url, TEST_IAM_ENDPOINT);
    assert_eq!(
        request.header_value("Content-Type"),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(request.header_value("Accept"), Some("application/json"));
    assert_eq!(
        std::str::from_utf8(&request.body).unwrap(),
        "apikey=my+key%2Fwith%2Bspecials&response_type=cloud_iam&grant_type=urn%3Aibm%3Aparams%3Aoauth%3Agrant-type%3Aapikey"
    );
}

#[tokio::test]
async fn fresh_token_makes_no_network_call() {
    init_dummy_tracing_subscriber();

    let http = ScriptedHttpClient::new(|_| Ok(response(200, iam_token_body("unused", 3600))));
    let manager = make_manager(&http);
    manager.set_token(token_expiring_in("held", 3600));

    for _ in 0..5 {
        assert_eq!(manager.ensure_valid_token().await.unwrap(), "held");
    }
    assert!(http.requests().is_empty());
    assert_eq!(http.count_matching(TEST_IAM_ENDPOINT), 0);
}

#[tokio::test]
async fn token_inside_lookahead_is_refreshed() {
    init_dummy_tracing_subscriber();

    let http = ScriptedHttpClient::new(|_| Ok(response(200, iam_token_body("renewed", 3600))));
    let manager = make_manager(&http);
    manager.set_token(token_expiring_in("old", 120));

    assert_eq!(manager.ensure_valid_token().await.unwrap(), "renewed");
    assert_eq!(http.count_matching(TEST_IAM_ENDPOINT), 1);
    assert_eq!(manager.current().token, "renewed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_exchange() {
    init_dummy_tracing_subscriber();

    let http = ScriptedHttpClient::new(|_| Ok(response(200, iam_token_body("shared", 3600))))
        .with_delay(Duration::from_millis(50));
    let manager = Arc::new(make_manager(&http));
    manager.set_token(token_expiring_in("stale", 10));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager.ensure_valid_token().await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "shared");
    }

    assert_eq!(http.count_matching(TEST_IAM_ENDPOINT), 1);
}

#[tokio::test]
async fn service_error_message_keeps_old_token() {
    init_dummy_tracing_subscriber();

    let http = ScriptedHttpClient::new(|_| {
        Ok(response(
            400,
            r#"{"errorCode":"BXNIM0415E","errorMessage":"Provided API key could not be found.","context":{}}"#,
        ))
    });
    let manager = make_manager(&http);
    manager.set_token(token_expiring_in("old", 60));

    let err = manager.ensure_valid_token().await.unwrap_err();
    assert_eq!(
        find_cos_error(&err),
        Some(&CosError::AuthExchangeFailed(
            "Provided API key could not be found.".to_string()
        ))
    );
    assert_eq!(manager.current().token, "old");
}

#[tokio::test]
async fn malformed_response_is_auth_failure() {
    init_dummy_tracing_subscriber();

    let http = ScriptedHttpClient::new(|_| Ok(response(200, "<html>gateway</html>")));
    let manager = make_manager(&http);

    let err = manager.ensure_valid_token().await.unwrap_err();
    assert!(matches!(
        find_cos_error(&err),
        Some(CosError::AuthExchangeFailed(message)) if message.contains("error parsing response")
    ));
}

#[tokio::test]
async fn network_failure_is_auth_failure_and_lock_is_released() {
    init_dummy_tracing_subscriber();

    let fail = Arc::new(std::sync::atomic::AtomicBool::new(true));
    let fail_in_handler = fail.clone();
    let http = ScriptedHttpClient::new(move |_| {
        if fail_in_handler.load(std::sync::atomic::Ordering::SeqCst) {
            Err(anyhow!("connection reset by peer"))
        } else {
            Ok(response(200, iam_token_body("recovered", 3600)))
        }
    });
    let manager = make_manager(&http);

    let err = manager.ensure_valid_token().await.unwrap_err();
    assert!(matches!(
        find_cos_error(&err),
        Some(CosError::AuthExchangeFailed(message)) if message.contains("connection reset by peer")
    ));

    // a later caller must be able to take the refresh lock again
    fail.store(false, std::sync::atomic::Ordering::SeqCst);
    assert_eq!(manager.ensure_valid_token().await.unwrap(), "recovered");
    assert_eq!(http.count_matching(TEST_IAM_ENDPOINT), 2);
}

#[tokio::test]
async fn missing_access_token_is_rejected() {
    init_dummy_tracing_subscriber();

    let http = ScriptedHttpClient::new(|_| Ok(response(200, r#"{"expiration":1999999999}"#)));
    let manager = make_manager(&http);

    let err = manager.ensure_valid_token().await.unwrap_err();
    assert_eq!(
        find_cos_error(&err),
        Some(&CosError::AuthExchangeFailed(
            "response has no access_token".to_string()
        ))
    );
}

#[test]
fn redact_keeps_short_prefix() {
    assert_eq!(redact("abcdefghijklmnop"), "abcdefgh...");
    assert_eq!(redact(""), "");
}
