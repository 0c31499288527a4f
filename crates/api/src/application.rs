#[cfg(unix)]
use std::{fs, path::Path};

use actix_web::{middleware::Logger, web, App, HttpServer};
use fixit_domain::config::{ApiConfig, ConfigError};
use fixit_domain::services::telemetry::{init_telemetry, TelemetryConfig, TelemetryError};
use fixit_domain::storage::StorageError;
use fixit_storage::SeaOrmStorage;
use thiserror::Error;
use tracing::info;

use crate::{
    handlers::{
        admin_stats_handler, list_config_handler, metrics_handler, redirect_handler,
        reveal_contact_handler, update_config_handler, verify_provider_handler,
    },
    state::{AppState, StateOptions},
};

pub async fn run() -> Result<(), BootstrapError> {
    let config = ApiConfig::load_from_env()?;

    let telemetry_config = TelemetryConfig::from_env("API");
    let telemetry = init_telemetry(&telemetry_config)?;

    let storage = SeaOrmStorage::builder()
        .database_url(config.database_url())
        .max_connections(config.db_max_connections())
        .connect_timeout(config.db_connect_timeout())
        .build()
        .await?;

    let state = AppState::new(storage, telemetry, StateOptions::from_config(&config));
    info!(
        config_ttl_secs = state.config_cache().ttl().as_secs(),
        "config cache ready"
    );
    if config.admin_sessions().is_empty() {
        info!("no admin sessions configured, admin endpoints will reject every request");
    }

    // With a dedicated internal listener, metrics stay off the public one.
    let include_metrics_on_public = !config.has_internal_listener();

    let public_state = state.clone();
    let mut public_server = HttpServer::new(move || {
        let mut app = App::new()
            .app_data(web::Data::new(public_state.clone()))
            .wrap(Logger::default())
            .configure(public_routes);

        if include_metrics_on_public {
            app = app.route("/metrics", web::get().to(metrics_handler));
        }

        app
    });

    #[cfg(unix)]
    {
        if let Some(socket) = config.api_unix_socket() {
            cleanup_socket(socket)?;
            public_server = public_server.bind_uds(socket)?;
        } else {
            public_server = public_server.bind(config.api_bind_address())?;
        }
    }

    #[cfg(not(unix))]
    {
        if let Some(socket) = config.api_unix_socket() {
            return Err(BootstrapError::Io(std::io::Error::other(format!(
                "unix socket '{socket}' requested but this platform does not support it"
            ))));
        }
        public_server = public_server.bind(config.api_bind_address())?;
    }

    let public_server = public_server.run();

    let internal_server = if config.has_internal_listener() {
        let internal_state = state.clone();
        let mut internal_server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(internal_state.clone()))
                .wrap(Logger::default())
                .route("/metrics", web::get().to(metrics_handler))
        });

        #[cfg(unix)]
        {
            if let Some(socket) = config.internal_unix_socket() {
                cleanup_socket(socket)?;
                internal_server = internal_server.bind_uds(socket)?;
            } else if let Some(addr) = config.internal_bind_address() {
                internal_server = internal_server.bind(addr)?;
            } else {
                return Err(BootstrapError::Io(std::io::Error::other(
                    "internal listener configured but no bind target provided",
                )));
            }
        }

        #[cfg(not(unix))]
        {
            if let Some(socket) = config.internal_unix_socket() {
                return Err(BootstrapError::Io(std::io::Error::other(format!(
                    "internal unix socket '{socket}' requested but this platform does not support it"
                ))));
            }
            if let Some(addr) = config.internal_bind_address() {
                internal_server = internal_server.bind(addr)?;
            } else {
                return Err(BootstrapError::Io(std::io::Error::other(
                    "internal listener configured but no bind target provided",
                )));
            }
        }

        Some(internal_server.run())
    } else {
        None
    };

    info!(
        bind = config.api_unix_socket().unwrap_or(config.api_bind_address()),
        internal = config.has_internal_listener(),
        "api listening"
    );

    if let Some(internal) = internal_server {
        tokio::try_join!(public_server, internal)?;
    } else {
        public_server.await?;
    }

    Ok(())
}

/// Routes served on the public listener, minus `/metrics`.
pub fn public_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/reveal-contact", web::get().to(reveal_contact_handler))
        .route("/go", web::get().to(redirect_handler))
        .route("/admin/config", web::get().to(list_config_handler))
        .route("/admin/config", web::post().to(update_config_handler))
        .route("/admin/stats", web::get().to(admin_stats_handler))
        .route(
            "/admin/providers/verify",
            web::post().to(verify_provider_handler),
        );
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A stale socket file from an unclean shutdown makes `bind_uds` fail.
#[cfg(unix)]
fn cleanup_socket(path: &str) -> std::io::Result<()> {
    let socket_path = Path::new(path);
    if socket_path.exists() {
        fs::remove_file(socket_path)?;
    }
    Ok(())
}
