//! Disguised-failure detection end to end: tunnel error pages must never
//! reach the caller as real content


use origin_shield::config::HealthConfig;
use origin_shield::{
    HealthEvent, Request, Response, ServedFrom, ServerHealthClassifier, UnhealthyReason, Verdict,
};
use test_helpers::{engine_with, html, MockTransport};

const NGROK_OFFLINE_PAGE: &str =
    "<html><body><h1>ngrok</h1><p>The endpoint example.ngrok.app is offline. \
     ERR_NGROK_3200</p></body></html>";

#[test]
fn test_classifier_matrix() {
    let classifier = ServerHealthClassifier::new(HealthConfig::default());
    let big_page = format!("<html>{}</html>", "content ".repeat(300));

    let cases: Vec<(Response, bool)> = vec![
        (Response::new(200).with_body("plain"), true),
        (html(200, &big_page), true),
        (Response::new(500), false),
        (Response::new(502), false),
        (Response::new(503), false),
        (Response::new(504), false),
        (html(200, NGROK_OFFLINE_PAGE), false),
        // JSON bodies are not fingerprint-inspected
        (
            Response::new(200)
                .with_header("content-type", "application/json")
                .with_body("{\"text\": \"ERR_NGROK_3200\"}"),
            true,
        ),
    ];

    for (response, expect_healthy) in cases {
        let verdict = classifier.classify(&response);
        assert_eq!(
            verdict.is_healthy(),
            expect_healthy,
            "status {} body {:?}",
            response.status,
            response.body_text()
        );
    }
}

#[test]
fn test_gateway_codes_report_gateway_reason() {
    let classifier = ServerHealthClassifier::new(HealthConfig::default());
    for status in [502, 503, 504] {
        match classifier.classify(&Response::new(status)) {
            Verdict::Unhealthy(UnhealthyReason::GatewayError(code)) => assert_eq!(code, status),
            other => panic!("expected gateway error for {}, got {:?}", status, other),
        }
    }
}

#[tokio::test]
async fn test_tunnel_error_page_is_swallowed_and_cache_served() {
    let transport = MockTransport::with_script(vec![
        Ok(Response::new(200)
            .with_header("content-type", "application/json")
            .with_body("{\"rooms\": [1, 2]}")),
        Ok(html(200, NGROK_OFFLINE_PAGE)),
    ]);
    let engine = engine_with(transport);
    let request = Request::get("/api/rooms/");

    let fresh = engine.handle_request(&request).await;
    assert_eq!(fresh.served_from, ServedFrom::Network);

    // The tunnel's 200 error page arrives; the caller gets cached data
    let fallback = engine.handle_request(&request).await;
    assert_eq!(fallback.served_from, ServedFrom::CacheServerOffline);
    assert_eq!(fallback.body, b"{\"rooms\": [1, 2]}");
    assert!(!engine.health().is_healthy());
}

#[tokio::test]
async fn test_health_events_follow_origin_state() {
    let transport = MockTransport::with_script(vec![
        Ok(html(200, NGROK_OFFLINE_PAGE)),
        Ok(Response::new(200).with_body("recovered")),
    ]);
    let engine = engine_with(transport);
    let mut events = engine.health().subscribe();

    engine.handle_request(&Request::get("/api/a/")).await;
    engine.handle_request(&Request::get("/api/a/")).await;

    assert_eq!(events.recv().await.unwrap(), HealthEvent::ServerOffline);
    assert_eq!(events.recv().await.unwrap(), HealthEvent::ServerRecovered);
    assert!(engine.health().is_healthy());
}

#[tokio::test]
async fn test_repeated_failures_emit_a_single_offline_event() {
    let transport = MockTransport::with_script(vec![
        Ok(Response::new(503)),
        Ok(Response::new(503)),
        Ok(Response::new(503)),
    ]);
    let engine = engine_with(transport);
    let mut events = engine.health().subscribe();

    for _ in 0..3 {
        engine.handle_request(&Request::get("/api/a/")).await;
    }

    assert_eq!(events.recv().await.unwrap(), HealthEvent::ServerOffline);
    assert!(events.try_recv().is_err());
}

#[test]
fn test_custom_vendor_rules() {
    let config = HealthConfig {
        error_tokens: vec!["ERR_TUNNEL_DOWN".to_string()],
        vendor_keyword: "cloudflared".to_string(),
        vendor_phrases: vec![vec!["argo".to_string(), "unavailable".to_string()]],
        small_body_threshold: 500,
    };
    let classifier = ServerHealthClassifier::new(config);

    let page = format!(
        "<html>cloudflared argo tunnel unavailable {}</html>",
        "pad ".repeat(200)
    );
    assert!(!classifier.classify(&html(200, &page)).is_healthy());

    // Default ngrok fingerprints no longer apply
    let ngrok = format!("<html>ngrok endpoint offline {}</html>", "pad ".repeat(200));
    assert!(classifier.classify(&html(200, &ngrok)).is_healthy());
}
