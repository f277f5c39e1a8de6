use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param, query_param_is_missing},
};

use mail_verdict::error::SourceError;
use mail_verdict::mail::extract::extract_summary;
use mail_verdict::mail::{GmailSource, MessageSource, ResilientSource};
use mail_verdict::retry::RetryConfig;

const MESSAGES: &str = "/gmail/v1/users/me/messages";

async fn source(server: &MockServer) -> GmailSource {
    GmailSource::new(
        format!("{}/gmail/v1", server.uri()),
        SecretString::from("test-token".to_string()),
    )
    .unwrap()
}

#[tokio::test]
async fn listing_sends_paging_params_and_bearer() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MESSAGES))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("maxResults", "50"))
        .and(query_param("q", "-in:spam"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [
                { "id": "m9", "threadId": "t9" },
                { "id": "m8", "threadId": "t8" }
            ],
            "nextPageToken": "p3",
            "resultSizeEstimate": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = source(&server)
        .await
        .list_page("-in:spam", 50, Some("p2"))
        .await
        .unwrap();

    let ids: Vec<&str> = page.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m9", "m8"]);
    assert_eq!(page.messages[0].thread_id.as_deref(), Some("t9"));
    assert_eq!(page.next_page_token.as_deref(), Some("p3"));
}

#[tokio::test]
async fn empty_mailbox_lists_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MESSAGES))
        .and(query_param_is_missing("pageToken"))
        .and(query_param_is_missing("q"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "resultSizeEstimate": 0 })))
        .mount(&server)
        .await;

    let page = source(&server).await.list_page("", 10, None).await.unwrap();
    assert!(page.messages.is_empty());
    assert!(page.next_page_token.is_none());
}

#[tokio::test]
async fn fetch_requests_full_format_and_extracts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{MESSAGES}/m1")))
        .and(query_param("format", "full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "m1",
            "threadId": "t1",
            "internalDate": "1700000000000",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [
                    { "name": "From", "value": "Acme Recruiting <jobs@acme.test>" },
                    { "name": "Subject", "value": "Your application" }
                ],
                "body": { "size": 0 },
                "parts": [
                    {
                        "partId": "0",
                        "mimeType": "text/plain",
                        "headers": [],
                        // "We are pleased to move forward with you."
                        "body": { "size": 41, "data": "V2UgYXJlIHBsZWFzZWQgdG8gbW92ZSBmb3J3YXJkIHdpdGggeW91Lg" }
                    }
                ]
            }
        })))
        .mount(&server)
        .await;

    let raw = source(&server).await.fetch_message("m1").await.unwrap();
    assert_eq!(raw.timestamp_millis(), 1_700_000_000_000);

    let summary = extract_summary(&raw, 2000).unwrap();
    assert_eq!(summary.sender, "Acme Recruiting <jobs@acme.test>");
    assert_eq!(summary.subject, "Your application");
    assert_eq!(summary.full_text, "We are pleased to move forward with you.");
    assert_eq!(summary.thread_id, "t1");
}

#[tokio::test]
async fn status_codes_map_to_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{MESSAGES}/limited")))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{MESSAGES}/down")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{MESSAGES}/denied")))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{MESSAGES}/gone")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{MESSAGES}/garbled")))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let source = source(&server).await;

    let err = source.fetch_message("limited").await.unwrap_err();
    assert!(matches!(err, SourceError::RateLimited { .. }));
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    assert!(err.is_transient());

    let err = source.fetch_message("down").await.unwrap_err();
    assert!(matches!(err, SourceError::Unavailable { status: 503 }));
    assert!(err.is_transient());

    let err = source.fetch_message("denied").await.unwrap_err();
    assert!(matches!(err, SourceError::Auth(ref msg) if msg.contains("invalid token")));
    assert!(!err.is_transient());

    let err = source.fetch_message("gone").await.unwrap_err();
    assert!(matches!(err, SourceError::NotFound(ref id) if id == "gone"));

    let err = source.fetch_message("garbled").await.unwrap_err();
    assert!(matches!(err, SourceError::InvalidResponse(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn resilient_source_retries_transient_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{MESSAGES}/m1")))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{MESSAGES}/m1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "m1",
            "threadId": "t1"
        })))
        .mount(&server)
        .await;

    let retry = RetryConfig {
        max_retries: 3,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        jitter_fraction: 0.0,
    };
    let resilient = ResilientSource::new(Arc::new(source(&server).await), retry);

    let raw = resilient.fetch_message("m1").await.unwrap();
    assert_eq!(raw.id, "m1");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn resilient_source_does_not_retry_auth_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MESSAGES))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let resilient = ResilientSource::new(Arc::new(source(&server).await), RetryConfig::default());
    let err = resilient.list_page("", 10, None).await.unwrap_err();
    assert!(matches!(err, SourceError::Auth(_)));
}

#[tokio::test]
async fn forbidden_with_rate_limit_reason_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MESSAGES))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "User-rate limit exceeded.",
                "errors": [{
                    "domain": "usageLimits",
                    "reason": "userRateLimitExceeded",
                    "message": "User-rate limit exceeded."
                }],
                "status": "PERMISSION_DENIED"
            }
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(MESSAGES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{ "id": "m1", "threadId": "t1" }]
        })))
        .mount(&server)
        .await;

    let direct = source(&server).await.list_page("", 10, None).await.unwrap_err();
    assert!(matches!(direct, SourceError::RateLimited { retry_after: None }));
    assert!(direct.is_transient());

    let retry = RetryConfig {
        max_retries: 2,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        jitter_fraction: 0.0,
    };
    let resilient = ResilientSource::new(Arc::new(source(&server).await), retry);
    let page = resilient.list_page("", 10, None).await.unwrap();
    assert_eq!(page.messages[0].id, "m1");
    // one direct call, then one rate-limited attempt and one success
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}
