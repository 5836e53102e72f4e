use actix_web::{web, App, HttpResponse, HttpServer};
use prometheus::{Encoder, Registry, TextEncoder};

const SERVICE_NAME: &str = "order-delivery-service";

/// Serve `/metrics` and `/health` on `port` until the server is stopped.
/// Runs on its own runtime, separate from the consumer loop.
pub async fn start_metrics_server(registry: Registry, port: u16) -> std::io::Result<()> {
    tracing::info!(port = port, "📊 Metrics available at http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(registry.clone()))
            .configure(routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(scrape))
        .route("/health", web::get().to(health));
}

fn render(registry: &Registry) -> Result<Vec<u8>, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(buffer)
}

async fn scrape(registry: web::Data<Registry>) -> HttpResponse {
    match render(&registry) {
        Ok(body) => HttpResponse::Ok()
            .content_type(TextEncoder::new().format_type())
            .body(body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{DeliveryMetrics, MessageOutcome};
    use actix_web::test;

    #[actix_web::test]
    async fn test_scrape_exposes_recorded_outcomes() {
        let metrics = DeliveryMetrics::new().unwrap();
        metrics.record_message(MessageOutcome::Processed, 0.01);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(metrics.registry().clone()))
                .configure(routes),
        )
        .await;

        let body = test::call_and_read_body(
            &app,
            test::TestRequest::get().uri("/metrics").to_request(),
        )
        .await;
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains(r#"delivery_messages_total{outcome="processed"} 1"#));
    }

    #[actix_web::test]
    async fn test_health_reports_service() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Registry::new()))
                .configure(routes),
        )
        .await;

        let body: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/health").to_request(),
        )
        .await;

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], SERVICE_NAME);
    }
}
