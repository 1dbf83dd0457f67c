//! # grouptab: shared group activities and expenses
//!
//! `grouptab` is the backend for groups of people who plan things together: they share events,
//! documents and photos, and they keep a ledger of who paid for what. Every action on a group's
//! contents is gated by a group-scoped role check, and the membership lifecycle (invite, accept,
//! promote, remove) decides who holds which role.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer. State
//! lives either in process memory (development and tests) or in PostgreSQL.
//!
//! ### Request Flow
//!
//! A trusted proxy authenticates the caller and forwards the identity in a header. The
//! [`CurrentUser`](api::models::users::CurrentUser) extractor resolves it to a registered user,
//! the handler calls one service operation, and the service runs that operation as one unit of
//! work: it opens a store transaction, asks the [`AccessPolicy`](auth::policy::AccessPolicy)
//! whether the caller may proceed, validates the input, writes, and commits. A failure at any
//! step drops the transaction, so nothing is left half-done.
//!
//! ### Core Components
//!
//! - The **API layer** ([`api`]) maps routes under `/api/v1` onto service calls.
//! - The **authentication layer** ([`auth`]) resolves the caller and holds the authorization
//!   predicates.
//! - The **service layer** ([`services`]) implements the operations: groups, invitations,
//!   memberships, the expense ledger and group resources.
//! - The **database layer** ([`db`]) defines the [`Store`](db::Store) abstraction with in-memory
//!   and PostgreSQL implementations.
//!
//! ## Configuration
//!
//! Configuration is loaded from a YAML file (`config.yaml` by default) and environment variables
//! prefixed with `GROUPTAB_`. See [`config`] for the available options.
//!
//! ## Getting Started
//!
//! ```no_run
//! use grouptab::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let app = Application::new(config).await?;
//!     app.serve(std::future::pending()).await
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod services;
pub mod telemetry;
#[cfg(test)]
mod test_utils;
pub mod types;

use std::sync::Arc;

use axum::{
    Router, ServiceExt,
    extract::Request,
    routing::{get, patch, post},
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower::Layer;
use tower_http::{
    normalize_path::NormalizePathLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};

pub use config::Config;
pub use errors::{Error, Result};
pub use types::{ExpenseId, GroupId, ResourceId, UserId};

use crate::auth::policy::MembershipPolicy;
use crate::config::{DatabaseConfig, PoolSettings};
use crate::db::{InMemoryStore, PostgresStore, Store};
use crate::services::Services;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub services: Services,
}

impl AppState {
    pub fn new(config: Config, services: Services) -> Self {
        Self { config, services }
    }
}

/// Get the grouptab database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Build the application router with every route and the tracing layer.
pub fn build_router(state: AppState) -> Router {
    use api::handlers::{expenses, groups, invitations, memberships, resources, users};

    let api_routes = Router::new()
        // Users
        .route("/users", post(users::register_user))
        .route("/users/me", get(users::get_current_user))
        .route("/users/{user_id}", get(users::get_user).patch(users::update_user))
        .route("/users/{user_id}/groups", get(users::get_user_groups))
        .route("/users/{user_id}/invitations", get(users::get_user_invitations))
        // Groups
        .route("/groups", post(groups::create_group))
        .route(
            "/groups/{group_id}",
            get(groups::get_group).patch(groups::update_group).delete(groups::delete_group),
        )
        .route("/groups/{group_id}/members", get(groups::get_group_members))
        .route("/groups/{group_id}/members/{user_id}", axum::routing::delete(memberships::remove_member))
        .route("/groups/{group_id}/members/{user_id}/promote", post(memberships::promote_member))
        // Invitations
        .route("/groups/{group_id}/invitations", post(invitations::create_invitation))
        .route(
            "/groups/{group_id}/invitations/{user_id}",
            axum::routing::delete(invitations::delete_invitation),
        )
        .route(
            "/groups/{group_id}/invitations/{user_id}/accept",
            post(invitations::accept_invitation),
        )
        // Expenses
        .route(
            "/groups/{group_id}/expenses",
            get(expenses::list_expenses).post(expenses::create_expense),
        )
        .route("/groups/{group_id}/expenses/{expense_id}", get(expenses::get_expense))
        .route(
            "/expenses/{expense_id}",
            axum::routing::put(expenses::update_expense).delete(expenses::delete_expense),
        )
        // Events, documents and photos
        .route(
            "/groups/{group_id}/resources/{collection}",
            get(resources::list_resources).post(resources::create_resource),
        )
        .route(
            "/resources/{collection}/{id}",
            patch(resources::rename_resource).delete(resources::delete_resource),
        );

    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Connect to PostgreSQL and bring the schema up to date.
async fn setup_database(url: &str, settings: &PoolSettings) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout())
        .idle_timeout(settings.idle_timeout())
        .max_lifetime(settings.max_lifetime())
        .connect(url)
        .await?;

    info!("Running database migrations...");
    migrator().run(&pool).await?;
    Ok(pool)
}

pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    /// Create a new application instance with its store and services initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting grouptab with configuration: {:#?}", config);

        let (store, pool): (Arc<dyn Store>, Option<PgPool>) = match &config.database {
            DatabaseConfig::Memory => {
                info!("Using in-memory store; data will not survive a restart");
                (Arc::new(InMemoryStore::new()), None)
            }
            DatabaseConfig::External { url, pool: settings } => {
                let pool = setup_database(url, settings).await?;
                (Arc::new(PostgresStore::new(pool.clone())), Some(pool))
            }
        };

        let services = Services::new(store, Arc::new(MembershipPolicy), config.policy);
        let router = build_router(AppState::new(config.clone(), services));

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "grouptab listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        // Trailing slashes are trimmed before path matching
        let service = NormalizePathLayer::trim_trailing_slash().layer(self.router);
        axum::serve(listener, ServiceExt::<Request>::into_make_service(service))
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        Ok(())
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        let service = NormalizePathLayer::trim_trailing_slash().layer(self.router);
        axum_test::TestServer::new(ServiceExt::<Request>::into_make_service(service)).expect("Failed to create test server")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{identity_header, register_user};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_application_starts_on_memory_store() {
        let app = Application::new(Config::default()).await.unwrap();
        let server = app.into_test_server();

        server.get("/healthz").await.assert_status_ok();
        server.get("/healthz/").await.assert_status_ok();
        server.get("/api/v1/users/me").await.assert_status(StatusCode::UNAUTHORIZED);

        let (name, value) = identity_header(&UserId::new("first"));
        server
            .post("/api/v1/users")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "display_name": "First", "email": "first@example.com" }))
            .await
            .assert_status(StatusCode::CREATED);
        server.get("/api/v1/users/me").add_header(name, value).await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_unknown_routes_are_not_found() {
        let (server, services) = crate::test_utils::create_test_app();
        let user = register_user(&services, "alice").await;
        let (name, value) = identity_header(&user);

        server
            .get("/api/v1/nothing-here")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
