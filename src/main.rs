use domain::registry::spawn_eviction;
use log::{error, info};
use migration::{Migrator, MigratorTrait};
use service::{
    config::{Config, RegistryBackend},
    logging::Logger,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting reflector relay [{}] with the {} registry",
        config.runtime_env(),
        config.registry_backend
    );

    let db = match config.registry_backend {
        RegistryBackend::Postgres => {
            let db = match service::init_database(&config).await {
                Ok(db) => Arc::new(db),
                Err(e) => {
                    error!("Failed to establish database connection: {e}");
                    std::process::exit(1);
                }
            };

            if let Err(e) = Migrator::up(db.as_ref(), None).await {
                error!("Failed to apply database migrations: {e}");
                std::process::exit(1);
            }

            Some(db)
        }
        RegistryBackend::Memory => None,
    };

    let eviction_interval = config.eviction_interval_secs;
    let service_state = service::AppState::new(config, db.as_ref());

    let app_state = match web::AppState::new(service_state) {
        Ok(app_state) => app_state,
        Err(e) => {
            error!("Failed to set up the relay: {e}");
            std::process::exit(1);
        }
    };

    if eviction_interval > 0 {
        spawn_eviction(
            app_state.registry.clone(),
            Duration::from_secs(eviction_interval),
        );
    }

    if let Err(e) = web::init_server(app_state).await {
        error!("Server exited with an error: {e}");
        std::process::exit(1);
    }
}
