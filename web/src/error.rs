use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::*;

use domain::error::{DomainErrorKind, Error as DomainError, EventErrorKind};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

// Only an unrecognized route is the caller's fault; everything else is a 500.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self.0.error_kind {
            DomainErrorKind::Event(EventErrorKind::UnrecognizedRoute(route_key)) => {
                warn!("Rejected event with unexpected route {route_key}");
                (
                    StatusCode::BAD_REQUEST,
                    format!("unexpected route: {route_key}"),
                )
                    .into_response()
            }
            _ => {
                error!("Failed to process event: {}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to process message",
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::error::InternalErrorKind;

    #[test]
    fn unrecognized_route_is_a_bad_request() {
        let err = Error(DomainError {
            source: None,
            error_kind: DomainErrorKind::Event(EventErrorKind::UnrecognizedRoute(
                "$ping".to_string(),
            )),
        });

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn other_failures_are_internal_errors() {
        for error_kind in [
            DomainErrorKind::Event(EventErrorKind::MissingConnectionId),
            DomainErrorKind::Internal(InternalErrorKind::Config),
        ] {
            let err = Error(DomainError {
                source: None,
                error_kind,
            });

            assert_eq!(
                err.into_response().status(),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }
}
