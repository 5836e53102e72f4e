use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::EndpointConfig;
use crate::metrics::DeliveryMetrics;

/// Serve `app` on an ephemeral local port and return its base URL.
pub(crate) async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    format!("http://{addr}")
}

#[derive(Clone, Copy)]
pub(crate) enum Reply {
    Json(&'static str),
    Status(StatusCode),
    Empty,
    Hang,
}

/// A stub upstream that replies the same way every time and counts hits.
pub(crate) struct StubService {
    pub base_url: String,
    pub hits: Arc<AtomicU32>,
}

impl StubService {
    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn respond(reply: Reply) -> (StatusCode, String) {
    match reply {
        Reply::Json(body) => (StatusCode::OK, body.to_string()),
        Reply::Status(status) => (status, String::new()),
        Reply::Empty => (StatusCode::OK, String::new()),
        Reply::Hang => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            (StatusCode::OK, String::new())
        }
    }
}

pub(crate) async fn order_status_service(reply: Reply) -> StubService {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/orders/{order_id}/status",
        get(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            respond(reply)
        }),
    );

    StubService {
        base_url: spawn_server(app).await,
        hits,
    }
}

pub(crate) async fn tax_service(reply: Reply) -> StubService {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/tax/invoices",
        post(move |body: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            let request: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
            assert!(request.get("orderId").is_some(), "invoice request without orderId");
            assert!(request.get("invoiceDate").is_some(), "invoice request without invoiceDate");
            respond(reply)
        }),
    );

    StubService {
        base_url: spawn_server(app).await,
        hits,
    }
}

pub(crate) fn endpoint(base_url: &str, retry_attempts: u32) -> EndpointConfig {
    EndpointConfig {
        base_url: base_url.to_string(),
        timeout: Duration::from_millis(200),
        retry_attempts,
        retry_backoff: Duration::ZERO,
    }
}

pub(crate) fn metrics() -> Arc<DeliveryMetrics> {
    Arc::new(DeliveryMetrics::new().expect("metrics registry"))
}
