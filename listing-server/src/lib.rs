//! Listing Server - real-estate listing backend
//!
//! Property CRUD plus the image lifecycle: uploads, storage in the database
//! or the legacy upload folder, reconciliation of each listing's image set
//! and delivery.
//!
//! ```text
//! listing-server/src/
//! ├── core/          # config, state, server, background tasks
//! ├── auth/          # JWT validation, role middleware
//! ├── images/        # storage backends, reconciliation, upload intake
//! ├── services/      # background services (staged image cleanup)
//! ├── api/           # HTTP routes and handlers
//! ├── utils/         # errors, logging, input validation
//! ├── db/            # SQLite pool, repositories, image migration
//! └── bin/           # migrate-images
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod images;
pub mod services;
pub mod utils;

// Re-export public types
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

// Security logging macro
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

/// Load `.env`, read the configuration and initialize logging from it
pub fn setup_environment() -> Config {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    init_logger_with_file(
        Some(&config.log_level),
        config.log_json,
        config.log_dir.as_deref(),
    );
    if config.jwt_secret_generated {
        tracing::warn!("JWT_SECRET not set, using a temporary development key");
    }

    config
}
