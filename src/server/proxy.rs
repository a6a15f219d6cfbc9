//! Upstream proxying
//!
//! Forwards every request that is not a live reload route to the upstream
//! site and injects the reload client into HTML responses.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::reload::inject_client;
use super::ServerState;

/// Largest request body forwarded upstream
const MAX_BODY: usize = 64 * 1024 * 1024;

/// Request headers not forwarded upstream
const SKIPPED_REQUEST_HEADERS: [header::HeaderName; 3] = [
    header::HOST,
    header::CONTENT_LENGTH,
    // Ask for an identity body so HTML can be rewritten
    header::ACCEPT_ENCODING,
];

/// Forward a request to the upstream site
pub async fn proxy_request(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    let Some(upstream) = state.upstream.as_deref() else {
        return (StatusCode::NOT_FOUND, "No upstream configured").into_response();
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", upstream.trim_end_matches('/'), path_and_query);
    let local_host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.to_string());

    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response();
        }
    };

    let mut headers = parts.headers.clone();
    for name in &SKIPPED_REQUEST_HEADERS {
        headers.remove(name);
    }

    debug!("Proxying {} {}", parts.method, url);

    let upstream_response = match state
        .client
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!("Upstream request to {} failed: {}", url, e);
            return (StatusCode::BAD_GATEWAY, format!("Upstream unavailable: {}", e))
                .into_response();
        }
    };

    let status = upstream_response.status();
    let mut headers = upstream_response.headers().clone();
    let html_response = is_html(&headers);
    // Hop-by-hop; the body below is re-framed by the server
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::CONNECTION);

    // Redirects are passed through; keep the browser on the proxy
    if let Some(host) = &local_host {
        rewrite_location(&mut headers, upstream, host);
    }

    let bytes = match upstream_response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (StatusCode::BAD_GATEWAY, format!("Upstream body error: {}", e))
                .into_response();
        }
    };

    if !html_response {
        return (status, headers, Body::from(bytes)).into_response();
    }

    let html = String::from_utf8_lossy(&bytes);
    let html = match &local_host {
        Some(host) => rewrite_links(&html, upstream, host),
        None => html.into_owned(),
    };
    let html = if state.inject {
        inject_client(&html)
    } else {
        html
    };

    headers.remove(header::CONTENT_LENGTH);
    (status, headers, Body::from(html)).into_response()
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/html"))
        .unwrap_or(false)
}

/// Rewrite a `Location` header aimed at the upstream origin
fn rewrite_location(headers: &mut HeaderMap, upstream: &str, local_host: &str) {
    let Some(location) = headers.get(header::LOCATION).and_then(|v| v.to_str().ok()) else {
        return;
    };

    let rewritten = rewrite_links(location, upstream, local_host);
    if rewritten != location {
        if let Ok(value) = HeaderValue::from_str(&rewritten) {
            headers.insert(header::LOCATION, value);
        }
    }
}

/// Point absolute links at the upstream origin back to the proxy
pub fn rewrite_links(html: &str, upstream: &str, local_host: &str) -> String {
    let Ok(url) = url::Url::parse(upstream) else {
        return html.to_string();
    };
    let Some(host) = url.host_str() else {
        return html.to_string();
    };

    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    html.replace(&format!("https://{}", authority), &format!("//{}", local_host))
        .replace(&format!("http://{}", authority), &format!("//{}", local_host))
}
