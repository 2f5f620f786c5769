mod support;

use anyhow::Result;
use relaycache::settings::DEFAULT_USER_AGENT;

use support::*;

#[tokio::test]
async fn second_request_is_served_from_cache() -> Result<()> {
    let body = vec![b'a'; 500];
    let response = http_ok_response(&body);
    let upstream = TestUpstream::http_response(response.clone()).await?;
    let harness = ProxyHarnessBuilder::new().spawn().await?;

    let request = format!(
        "GET http://origin:{}/page HTTP/1.1\r\nHost: origin\r\nUser-Agent: curl/8.0\r\n\r\n",
        upstream.port()
    );

    let first = ProxyClient::exchange(harness.addr, &request).await?;
    assert_eq!(first, response);
    assert_eq!(upstream.hits(), 1);

    let forwarded = String::from_utf8(upstream.requests()[0].clone())?;
    assert_eq!(
        forwarded,
        format!(
            "GET /page HTTP/1.1\r\nHost: origin\r\nUser-Agent: {DEFAULT_USER_AGENT}\r\nConnection: close\r\nProxy-Connection: close\r\n\r\n"
        )
    );

    let second = ProxyClient::exchange(harness.addr, &request).await?;
    assert_eq!(second, response);
    assert_eq!(upstream.hits(), 1, "cache hit must not contact the origin");

    let stats = harness.cache.stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.total_size, response.len());

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn oversized_response_is_relayed_but_not_cached() -> Result<()> {
    let body = vec![b'z'; 2_000_000];
    let response = http_ok_response(&body);
    let upstream = TestUpstream::http_response(response.clone()).await?;
    let harness = ProxyHarnessBuilder::new().spawn().await?;

    let request = format!(
        "GET http://origin:{}/big HTTP/1.0\r\n\r\n",
        upstream.port()
    );

    let first = ProxyClient::exchange(harness.addr, &request).await?;
    assert_eq!(first.len(), response.len());
    assert_eq!(status_of(&first), Some(200));
    assert_eq!(body_of(&first), &body[..]);
    assert_eq!(harness.cache.stats().entries, 0);

    let second = ProxyClient::exchange(harness.addr, &request).await?;
    assert_eq!(second.len(), response.len());
    assert_eq!(upstream.hits(), 2);

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn malformed_request_line_gets_bad_request() -> Result<()> {
    let harness = ProxyHarnessBuilder::new().spawn().await?;

    for request in [
        "GET http://origin/\r\n\r\n",
        "GET\r\n\r\n",
        "GET http://origin/ HTTP/1.1 extra\r\n\r\n",
    ] {
        let response = ProxyClient::exchange(harness.addr, request).await?;
        assert_eq!(response, BAD_REQUEST, "request {request:?}");
    }

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn empty_request_gets_bad_request() -> Result<()> {
    let harness = ProxyHarnessBuilder::new().spawn().await?;

    let mut client = ProxyClient::connect(harness.addr).await?;
    client.finish_request().await?;
    let response = client.read_response().await?;
    assert_eq!(response, BAD_REQUEST);

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn unreachable_upstream_gets_bad_request() -> Result<()> {
    let port = unused_local_port()?;
    let harness = ProxyHarnessBuilder::new().spawn().await?;

    let request = format!("GET http://origin:{port}/ HTTP/1.1\r\n\r\n");
    let response = ProxyClient::exchange(harness.addr, &request).await?;
    assert_eq!(response, BAD_REQUEST);
    assert_eq!(harness.cache.stats().entries, 0);

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn client_identity_headers_are_replaced() -> Result<()> {
    let upstream = TestUpstream::http_response(http_ok_response(b"ok")).await?;
    let harness = ProxyHarnessBuilder::new()
        .with_settings(|settings| settings.user_agent = "relaycache-test/1.0".into())
        .spawn()
        .await?;

    let request = format!(
        "GET http://origin:{}/headers HTTP/1.1\r\nuser-agent: sneaky\r\nCONNECTION: keep-alive\r\nProxy-Connection: keep-alive\r\nAccept: */*\r\n\r\n",
        upstream.port()
    );
    ProxyClient::exchange(harness.addr, &request).await?;

    let forwarded = String::from_utf8(upstream.requests()[0].clone())?;
    assert!(!forwarded.contains("sneaky"), "{forwarded}");
    assert!(!forwarded.contains("keep-alive"), "{forwarded}");
    assert!(forwarded.contains("Accept: */*\r\n"));
    assert!(forwarded.ends_with(
        "User-Agent: relaycache-test/1.0\r\nConnection: close\r\nProxy-Connection: close\r\n\r\n"
    ));

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn empty_upstream_response_is_not_cached() -> Result<()> {
    let upstream = TestUpstream::close().await?;
    let harness = ProxyHarnessBuilder::new().spawn().await?;

    let request = format!("GET http://origin:{}/void HTTP/1.1\r\n\r\n", upstream.port());
    let response = ProxyClient::exchange(harness.addr, &request).await?;
    assert!(response.is_empty());
    assert_eq!(harness.cache.stats().entries, 0);

    ProxyClient::exchange(harness.addr, &request).await?;
    assert_eq!(upstream.hits(), 2);

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn shutdown_releases_cached_objects() -> Result<()> {
    let upstream = TestUpstream::http_response(http_ok_response(b"short-lived")).await?;
    let harness = ProxyHarnessBuilder::new().spawn().await?;
    let cache = harness.cache.clone();

    let request = format!("GET http://origin:{}/x HTTP/1.1\r\n\r\n", upstream.port());
    ProxyClient::exchange(harness.addr, &request).await?;
    assert_eq!(cache.stats().entries, 1);

    harness.shutdown().await?;
    let stats = cache.stats();
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.total_size, 0);
    Ok(())
}
