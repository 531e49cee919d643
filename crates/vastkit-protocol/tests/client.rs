//! End-to-end orchestration through the ad client

use std::sync::Arc;
use std::time::Duration;

use vastkit_protocol::{
    AdClient, AdRequest, ClientConfig, HandlerRegistry, HttpTransport, MemoryTransport,
    OpenRtbCodec, OpenRtbHandler, Protocol, ProtocolError, SessionContext, TrackingDispatcher,
    Transport, Upstream, VastChainConfig, VastCodec, VastHandler, VastResolver,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INLINE: &str = r#"<VAST version="4.0"><Ad><InLine>
      <Impression>https://ads.test/imp</Impression>
      <MediaFiles><MediaFile bitrate="900">https://cdn.test/a.mp4</MediaFile></MediaFiles>
    </InLine></Ad></VAST>"#;

fn vast_client(transport: &Arc<MemoryTransport>, endpoint: &str) -> AdClient {
    let primary = Upstream::new(
        Arc::clone(transport) as Arc<dyn Transport>,
        Arc::new(VastCodec),
        endpoint,
    );
    let resolver = VastResolver::new(
        primary,
        VastChainConfig {
            enable_fallbacks: false,
            ..VastChainConfig::default()
        },
    );
    let dispatcher = Arc::new(TrackingDispatcher::new(
        Arc::clone(transport) as Arc<dyn Transport>,
        4,
        Duration::from_secs(1),
    ));
    let registry = HandlerRegistry::new().with(Arc::new(VastHandler::new(
        resolver,
        Vec::new(),
        dispatcher,
    )));
    AdClient::new(ClientConfig::default(), registry).expect("client should build")
}

#[tokio::test]
async fn test_identical_requests_hit_the_cache() {
    let transport = Arc::new(MemoryTransport::new());
    transport.respond("https://ads.test/vast", INLINE);
    let client = vast_client(&transport, "https://ads.test/vast");
    let ctx = SessionContext::new();
    let request = AdRequest::new().param("user_id", "alice").param("w", 1280);

    let first = client
        .resolve(Protocol::Vast, &request, &ctx)
        .await
        .expect("resolution should succeed")
        .granted()
        .expect("delivery should be granted");
    assert_eq!(
        first.creative.as_ref().map(|m| m.url.as_str()),
        Some("https://cdn.test/a.mp4")
    );
    assert_eq!(transport.send_count(), 1);

    let second = client
        .resolve(Protocol::Vast, &request, &ctx)
        .await
        .expect("resolution should succeed")
        .granted()
        .expect("delivery should be granted");
    // Served from cache; the upstream saw nothing new.
    assert_eq!(transport.send_count(), 1);
    assert_eq!(second.chain, first.chain);
    assert_eq!(second.tracking_urls, first.tracking_urls);
}

#[tokio::test]
async fn test_different_parameters_miss_the_cache() {
    let transport = Arc::new(MemoryTransport::new());
    transport.respond("https://ads.test/vast", INLINE);
    let client = vast_client(&transport, "https://ads.test/vast");
    let ctx = SessionContext::new();

    client
        .resolve(Protocol::Vast, &AdRequest::new().param("w", 640), &ctx)
        .await
        .expect("resolution should succeed");
    client
        .resolve(Protocol::Vast, &AdRequest::new().param("w", 1280), &ctx)
        .await
        .expect("resolution should succeed");

    assert_eq!(transport.send_count(), 2);
}

#[tokio::test]
async fn test_failed_resolutions_are_not_cached() {
    let transport = Arc::new(MemoryTransport::new());
    transport.fail(
        "https://ads.test/vast",
        vastkit_protocol::transport::CannedFailure::ServiceUnavailable,
    );
    let client = vast_client(&transport, "https://ads.test/vast");
    let ctx = SessionContext::new();
    let request = AdRequest::new().param("user_id", "alice");

    for _ in 0..2 {
        let result = client.resolve(Protocol::Vast, &request, &ctx).await;
        assert!(matches!(result, Err(ProtocolError::ServiceUnavailable)));
    }
    // Both attempts reached the upstream.
    assert_eq!(transport.send_count(), 2);
}

#[tokio::test]
async fn test_openrtb_round_trip_extracts_win_notices() {
    let transport = Arc::new(MemoryTransport::new());
    transport.respond(
        "https://dsp.test/bid",
        r#"{"id":"req-1","seatbid":[{"bid":[{"price":1.2,"nurl":"https://dsp.test/win"}]}]}"#,
    );

    let upstream = Upstream::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::new(OpenRtbCodec),
        "https://dsp.test/bid",
    );
    let dispatcher = Arc::new(TrackingDispatcher::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        4,
        Duration::from_secs(1),
    ));
    let registry = HandlerRegistry::new().with(Arc::new(OpenRtbHandler::new(
        upstream,
        Vec::new(),
        dispatcher,
    )));
    let client = AdClient::new(ClientConfig::default(), registry).expect("client should build");

    let request = AdRequest::new().param("id", "req-1").param("user_id", "alice");
    let response = client
        .resolve(Protocol::OpenRtb, &request, &SessionContext::new())
        .await
        .expect("resolution should succeed")
        .granted()
        .expect("delivery should be granted");

    assert_eq!(response.protocol, Protocol::OpenRtb);
    assert_eq!(response.tracking_urls, ["https://dsp.test/win"]);
    assert_eq!(response.payload["id"], "req-1");

    // The bid request body carried the request parameters.
    let sends = transport.sends();
    let body = sends[0].payload.as_ref().expect("bid request should POST a body");
    let body: serde_json::Value =
        serde_json::from_slice(body).expect("bid request body should be JSON");
    assert_eq!(body["id"], "req-1");
}

#[tokio::test]
async fn test_openrtb_requires_an_id() {
    let transport = Arc::new(MemoryTransport::new());
    let upstream = Upstream::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::new(OpenRtbCodec),
        "https://dsp.test/bid",
    );
    let dispatcher = Arc::new(TrackingDispatcher::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        4,
        Duration::from_secs(1),
    ));
    let registry = HandlerRegistry::new().with(Arc::new(OpenRtbHandler::new(
        upstream,
        Vec::new(),
        dispatcher,
    )));
    let client = AdClient::new(ClientConfig::default(), registry).expect("client should build");

    let result = client
        .resolve(Protocol::OpenRtb, &AdRequest::new(), &SessionContext::new())
        .await;
    assert!(matches!(result, Err(ProtocolError::MissingParameter("id"))));
}

#[tokio::test]
async fn test_vast_over_http_with_query_parameters() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vast"))
        .and(query_param("w", "1280"))
        .and(query_param("user_id", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INLINE))
        .mount(&mock_server)
        .await;

    let transport = Arc::new(HttpTransport::new().expect("transport should build"));
    let primary = Upstream::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::new(VastCodec),
        format!("{}/vast", mock_server.uri()),
    );
    let resolver = VastResolver::new(primary, VastChainConfig::default());
    let dispatcher = Arc::new(TrackingDispatcher::new(
        transport as Arc<dyn Transport>,
        4,
        Duration::from_secs(1),
    ));
    let registry = HandlerRegistry::new().with(Arc::new(VastHandler::new(
        resolver,
        Vec::new(),
        dispatcher,
    )));
    let client = AdClient::new(ClientConfig::default(), registry).expect("client should build");
    client.start();

    let request = AdRequest::new().param("user_id", "alice").param("w", 1280);
    let response = client
        .resolve(Protocol::Vast, &request, &SessionContext::new())
        .await
        .expect("resolution should succeed")
        .granted()
        .expect("delivery should be granted");
    assert_eq!(
        response.creative.map(|m| m.url),
        Some("https://cdn.test/a.mp4".to_string())
    );

    client.shutdown().await;
}
