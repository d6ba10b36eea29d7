use crate::{AppState, Error};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::event::Envelope;
use domain::relay;
use log::*;

/// POST one raw gateway event (connect, disconnect or message) to the relay
#[utoipa::path(
    post,
    path = "/events",
    request_body = Envelope,
    responses(
        (status = 200, description = "The event was handled", body = String),
        (status = 400, description = "The route key is not one the relay handles", body = String),
        (status = 500, description = "The event could not be processed", body = String)
    )
)]
pub async fn handle(
    State(app_state): State<AppState>,
    Json(envelope): Json<Envelope>,
) -> Result<impl IntoResponse, Error> {
    let outcome = relay::handle_envelope(
        &app_state.registry,
        app_state.transport.as_ref(),
        &app_state.settings,
        envelope,
    )
    .await?;

    debug!("Event outcome: {outcome:?}");

    Ok((StatusCode::OK, "Message sent"))
}
