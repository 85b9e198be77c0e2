//! REST API endpoints using Actix-Web
//!
//! The scrape submission endpoint is the hub's only externally callable
//! operation: it validates the request body, hands it to the dispatcher, and
//! blocks until the chosen node's response (or a structured error) comes
//! back.

use actix_web::{web, HttpResponse};
use serde_json::Value;

use crate::api::responses::ApiResponse;
use crate::hub::RequestDispatcher;
use crate::models::ScrapeRequest;

use super::health::configure_health_routes;

/// Shared application state
#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: RequestDispatcher,
}

impl ApiState {
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self { dispatcher }
    }
}

/// Configure all REST API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // Health endpoints at root
    configure_health_routes(cfg);

    // API v1 routes
    cfg.service(web::scope("/api/v1").configure(configure_v1_routes));
}

/// Configure API v1 routes
fn configure_v1_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/scrape").route("", web::post().to(submit_scrape)),
    )
    .service(web::scope("/nodes").route("", web::get().to(list_nodes)));
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit one scrape request and wait for a node's result
async fn submit_scrape(
    state: web::Data<ApiState>,
    body: web::Json<ScrapeRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    let payload: Value = serde_json::to_value(body.into_inner())
        .map_err(actix_web::error::ErrorBadRequest)?;

    match state.dispatcher.dispatch(payload).await {
        Ok(result) => Ok(HttpResponse::Ok().json(ApiResponse::success(result))),
        Err(e) => Ok(HttpResponse::from(e)),
    }
}

/// List currently connected nodes
async fn list_nodes(state: web::Data<ApiState>) -> Result<HttpResponse, actix_web::Error> {
    let nodes = state.dispatcher.registry().snapshot();
    Ok(HttpResponse::Ok().json(ApiResponse::success(nodes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{ConnectionRegistry, DispatcherConfig};
    use actix_web::{test, App};
    use serde_json::json;

    fn test_state() -> ApiState {
        ApiState::new(RequestDispatcher::new(
            ConnectionRegistry::new(),
            DispatcherConfig::default(),
        ))
    }

    #[actix_web::test]
    async fn test_scrape_with_no_nodes_returns_503() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(|cfg| {
                    cfg.service(web::scope("/api/v1").configure(configure_v1_routes));
                }),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/api/v1/scrape")
            .set_json(json!({"url": "http://example.com"}))
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), 503);
    }

    #[actix_web::test]
    async fn test_nodes_listing_is_empty_without_connections() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(|cfg| {
                    cfg.service(web::scope("/api/v1").configure(configure_v1_routes));
                }),
        )
        .await;

        let request = test::TestRequest::get().uri("/api/v1/nodes").to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;

        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"], json!([]));
    }

    #[actix_web::test]
    async fn test_scrape_rejects_body_without_url() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(|cfg| {
                    cfg.service(web::scope("/api/v1").configure(configure_v1_routes));
                }),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/api/v1/scrape")
            .set_json(json!({"browser": "chromium"}))
            .to_request();
        let response = test::call_service(&app, request).await;

        assert!(response.status().is_client_error());
    }
}
