//! API server: route table, HTTP listener, and Prometheus exporter.

use crate::state::AppState;
use crate::{admin_rest, auth_rest, openapi, rest, tenant_rest};
use axum::routing::{get, post};
use axum::Router;
use reportflow_core::config::AppConfig;
use std::net::SocketAddr;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the full application router over `state`.
pub fn build_router(state: AppState) -> Router {
    let auth = Router::new()
        .route("/register", post(auth_rest::register))
        .route("/login", post(auth_rest::login))
        .route("/logout", post(auth_rest::logout))
        .route("/me", get(auth_rest::me));

    let tenant = Router::new()
        .nest("/auth", auth)
        .route("/dashboard", get(tenant_rest::dashboard))
        .route("/organization", get(tenant_rest::get_organization))
        .route("/organization/members", get(tenant_rest::list_members))
        .route("/subscription", get(tenant_rest::get_subscription))
        .route(
            "/reports",
            get(tenant_rest::list_reports).post(tenant_rest::create_report),
        )
        .route(
            "/reports/:id",
            get(tenant_rest::get_report)
                .put(tenant_rest::update_report)
                .delete(tenant_rest::delete_report),
        );

    let admin = Router::new()
        .route("/stats", get(admin_rest::stats))
        .route(
            "/organizations",
            get(admin_rest::list_organizations).post(admin_rest::create_organization),
        )
        .route(
            "/organizations/:id",
            get(admin_rest::get_organization)
                .put(admin_rest::update_organization)
                .delete(admin_rest::delete_organization),
        )
        .route(
            "/organizations/:id/users",
            get(admin_rest::list_organization_users),
        )
        .route(
            "/users",
            get(admin_rest::list_users).post(admin_rest::create_user),
        )
        .route(
            "/users/:id",
            get(admin_rest::get_user)
                .put(admin_rest::update_user)
                .delete(admin_rest::delete_user),
        )
        .route(
            "/roles",
            get(admin_rest::list_roles).post(admin_rest::create_role),
        )
        .route(
            "/roles/:id",
            get(admin_rest::get_role)
                .put(admin_rest::update_role)
                .delete(admin_rest::delete_role),
        )
        .route(
            "/roles/:id/permissions",
            get(admin_rest::list_role_permissions).put(admin_rest::set_role_permissions),
        )
        .route(
            "/roles/:id/permissions/:permission_id",
            post(admin_rest::assign_role_permission).delete(admin_rest::revoke_role_permission),
        )
        .route(
            "/permissions",
            get(admin_rest::list_permissions).post(admin_rest::create_permission),
        )
        .route(
            "/permissions/:id",
            get(admin_rest::get_permission)
                .put(admin_rest::update_permission)
                .delete(admin_rest::delete_permission),
        )
        .route(
            "/subscriptions",
            get(admin_rest::list_subscriptions).post(admin_rest::create_subscription),
        )
        .route(
            "/subscriptions/:id",
            get(admin_rest::get_subscription)
                .put(admin_rest::update_subscription)
                .delete(admin_rest::delete_subscription),
        )
        .route("/settings", get(admin_rest::list_settings))
        .route(
            "/settings/:key",
            get(admin_rest::get_setting)
                .put(admin_rest::put_setting)
                .delete(admin_rest::delete_setting),
        )
        .route("/audit-logs", get(admin_rest::list_audit_logs));

    Router::new()
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .nest("/api/v1", tenant)
        .nest("/api/admin", admin)
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main API server.
pub struct ApiServer {
    config: AppConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: AppConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = build_router(self.state.clone());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, instance = %self.config.instance_name, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
