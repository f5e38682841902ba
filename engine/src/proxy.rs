//! Same-origin image proxy.
//!
//! Provider image URLs usually live on a CDN that doesn't send CORS headers,
//! so a browser front end can't read them directly. `GET /api/image-proxy?url=<target>`
//! fetches the target server side and streams it back:
//!
//! - no `url` parameter: `400 Missing url`
//! - upstream non-success: same status, upstream body as plain text
//! - success: upstream body with its content type and `Access-Control-Allow-Origin: *`
//! - anything else: `500 Proxy error: <message>`

use axum::{
    Router,
    body::Body,
    extract::{Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use log::{debug, error, info};
use reqwest::Client;
use serde::Deserialize;
use tokio::net::TcpListener;

pub const PROXY_PATH: &str = "/api/image-proxy";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const DEFAULT_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Deserialize)]
struct ProxyQuery {
    url: Option<String>,
}

pub fn router(client: Client) -> Router {
    Router::new()
        .route(PROXY_PATH, get(proxy_image))
        .with_state(client)
}

pub async fn serve(listener: TcpListener, client: Client) -> std::io::Result<()> {
    info!(
        "Image proxy listening on http://{}{PROXY_PATH}",
        listener.local_addr()?
    );
    axum::serve(listener, router(client)).await
}

async fn proxy_image(State(client): State<Client>, Query(query): Query<ProxyQuery>) -> Response {
    let Some(target) = query.url.filter(|url| !url.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing url").into_response();
    };

    match forward(&client, &target).await {
        Ok(resp) => resp,
        Err(e) => {
            error!("Proxying {target} failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE, TEXT_PLAIN)],
                format!("Proxy error: {e}"),
            )
                .into_response()
        }
    }
}

async fn forward(client: &Client, target: &str) -> Result<Response, reqwest::Error> {
    let upstream = client.get(target).send().await?;
    let status = upstream.status();
    debug!("{target} answered {status}");

    if !status.is_success() {
        let body = upstream.text().await?;
        return Ok((status, [(CONTENT_TYPE, TEXT_PLAIN)], body).into_response());
    }

    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or(HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    Ok((
        StatusCode::OK,
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            (CONTENT_TYPE, content_type),
        ],
        Body::from_stream(upstream.bytes_stream()),
    )
        .into_response())
}
