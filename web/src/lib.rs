use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use domain::error::Error as DomainError;
use domain::registry::RegistryBackend;
use domain::relay::Settings;
use domain::transport::{self, Transport};
use log::*;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

mod controller;
mod error;
pub mod router;
mod socket;

pub use error::{Error, Result};

/// Router state: the service-level infrastructure plus the relay's registry
/// backend, push transport and event-handling settings.
#[derive(Clone)]
pub struct AppState {
    pub service_state: service::AppState,
    pub registry: RegistryBackend,
    pub transport: Arc<dyn Transport>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(service_state: service::AppState) -> core::result::Result<Self, DomainError> {
        let registry = RegistryBackend::from_app_state(&service_state)?;
        let transport = transport::from_app_state(&service_state)?;
        let settings = Arc::new(Settings::from(&service_state.config));

        Ok(Self {
            service_state,
            registry,
            transport,
            settings,
        })
    }
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let config = &app_state.service_state.config;
    let interface = config.interface.as_deref().unwrap_or("127.0.0.1");
    let listen_addr = format!("{interface}:{}", config.port);

    info!(
        "Server starting... listening for connections on http://{listen_addr} ({} registry)",
        config.registry_backend
    );

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {origin}");
                None
            }
        })
        .collect();

    let cors_layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(AllowOrigin::list(allowed_origins));

    let listener = TcpListener::bind(listen_addr).await?;
    let router = router::define_routes(app_state).layer(cors_layer);

    axum::serve(listener, router).await
}
