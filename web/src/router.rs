use crate::controller::{event_controller, health_check_controller};
use crate::socket::handler::socket_handler;
use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Reflector Relay API"
        ),
        paths(
            event_controller::handle,
            health_check_controller::health_check,
        ),
        components(
            schemas(
                domain::event::Envelope,
                domain::ConnectionClass,
            )
        ),
        tags(
            (name = "reflector", description = "Agent / counterpart message relay")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(event_routes(app_state.clone()))
        .merge(health_routes())
        .merge(socket_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn event_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events", post(event_controller::handle))
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn socket_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(socket_handler))
        .with_state(app_state)
}
