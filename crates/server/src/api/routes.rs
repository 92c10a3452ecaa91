use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{cashiers, handlers, middleware::metrics_middleware, services, tickets, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Services
        .route(
            "/services",
            post(services::create_service).get(services::list_services),
        )
        .route("/services/{id}", get(services::get_service))
        .route("/services/{id}/active", put(services::set_service_active))
        // Cashiers
        .route(
            "/cashiers",
            post(cashiers::create_cashier).get(cashiers::list_cashiers),
        )
        .route("/cashiers/{id}", get(cashiers::get_cashier))
        .route("/cashiers/{id}/service", put(cashiers::assign_service))
        .route("/cashiers/{id}/active", put(cashiers::set_cashier_active))
        .route("/cashiers/{id}/queue", get(cashiers::visible_queue))
        .route("/cashiers/{id}/pause", post(cashiers::pause))
        .route("/cashiers/{id}/out-of-service", post(cashiers::out_of_service))
        .route("/cashiers/{id}/resume", post(cashiers::resume))
        .route("/cashiers/{id}/status-history", get(cashiers::status_history))
        // Tickets
        .route("/tickets", post(tickets::create_ticket))
        .route("/tickets/sweep", post(tickets::sweep))
        .route("/tickets/{id}", get(tickets::get_ticket))
        .route("/tickets/{id}/history", get(tickets::get_history))
        .route("/tickets/{id}/spans", get(tickets::get_spans))
        .route("/tickets/{id}/transfers", get(tickets::get_transfers))
        .route("/tickets/{id}/transition", post(tickets::transition))
        .route("/tickets/{id}/transfer", post(tickets::transfer))
        .route("/tickets/{id}/handoff", post(tickets::handoff))
        .route("/tickets/{id}/reservation", put(tickets::reserve));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws", get(ws::ws_handler))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
