//! Error types for the `domain` layer.
use entity_api::error::Error as EntityApiError;
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. `web` only looks at the `error_kind` tree to decide which HTTP
/// status to answer the hosting transport with.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
    Event(EventErrorKind),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Registry(RegistryErrorKind),
    Config,
    Other(String),
}

/// Which side of the registry contract failed. Reads and writes fail over to
/// different behavior in the relay, so the distinction is kept all the way up.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum RegistryErrorKind {
    Read,
    Write,
}

/// Enum representing the various kinds of external errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    Network,
}

/// Problems with an inbound event envelope.
#[derive(Debug, PartialEq)]
pub enum EventErrorKind {
    /// The route key is not one the relay handles.
    UnrecognizedRoute(String),
    /// A known route arrived without the connection id it applies to.
    MissingConnectionId,
}

impl Error {
    pub(crate) fn registry(kind: RegistryErrorKind, err: EntityApiError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Registry(kind)),
        }
    }

    pub(crate) fn event(kind: EventErrorKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Event(kind),
        }
    }

    pub(crate) fn config(message: &str) -> Self {
        Error {
            source: Some(message.into()),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    }

    pub fn is_registry(&self, kind: RegistryErrorKind) -> bool {
        self.error_kind == DomainErrorKind::Internal(InternalErrorKind::Registry(kind))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Errors that result from issues building the reqwest::Client instance. This
        // type of error will occur prior to any network calls being made.
        if err.is_builder() {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Failed to build reqwest client".to_string(),
                )),
            }
        // Errors that result from issues with the network call itself.
        } else {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
            }
        }
    }
}
