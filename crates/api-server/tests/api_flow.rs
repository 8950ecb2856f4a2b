//! End-to-end HTTP flows through the router against in-memory SQLite.

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use reportflow_api::{build_router, AppState};
use reportflow_core::config::{AppConfig, DatabaseConfig};
use reportflow_platform::bootstrap;
use reportflow_storage::RepositoryFactory;
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "admin@reportflow.test";
const ADMIN_PASSWORD: &str = "admin-password";

struct TestApp {
    router: Router,
}

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

impl TestApp {
    async fn new() -> Self {
        let mut config = AppConfig::default();
        config.database = DatabaseConfig::in_memory();
        config.auth.pbkdf2_iterations = 1_000;
        config.auth.bootstrap_admin_email = Some(ADMIN_EMAIL.into());
        config.auth.bootstrap_admin_password = Some(ADMIN_PASSWORD.into());

        let repos = RepositoryFactory::in_memory().await.unwrap();
        let state = AppState::new(&config, repos).unwrap();
        bootstrap::run(&state.repos, &state.rbac, state.accounts.hasher(), &config.auth)
            .await
            .unwrap();
        Self {
            router: build_router(state),
        }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply { status, cookie, body }
    }

    async fn register(&self, name: &str, email: &str, organization: Option<&str>) -> Reply {
        self.call(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "name": name,
                "email": email,
                "password": "correct-horse",
                "organization_name": organization,
            })),
        )
        .await
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let reply = self
            .call(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "login failed: {}", reply.body);
        reply.cookie.expect("login sets a session cookie")
    }

    async fn admin_cookie(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    async fn role_id(&self, admin: &str, name: &str) -> String {
        let roles = self.call(Method::GET, "/api/admin/roles", Some(admin), None).await;
        let role = roles.body.as_array().unwrap().iter().find(|r| r["name"] == name);
        role.unwrap()["id"].as_str().unwrap().to_string()
    }

    /// Id of the permission with `resource:action` key.
    async fn permission_id(&self, admin: &str, key: &str) -> String {
        let (resource, action) = key.split_once(':').unwrap();
        let permissions = self
            .call(Method::GET, "/api/admin/permissions?limit=200", Some(admin), None)
            .await;
        let permission = permissions
            .body
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["resource"] == resource && p["action"] == action);
        permission.unwrap()["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_register_login_dashboard() {
    let app = TestApp::new().await;

    let reply = app.register("Ada", "ada@acme.test", Some("Acme Corp")).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["email"], "ada@acme.test");
    assert!(reply.body.get("password_hash").is_none());

    let login = app
        .call(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "ADA@acme.test", "password": "correct-horse" })),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["organization"]["slug"], "acme-corp");
    let permissions = login.body["permissions"].as_array().unwrap();
    assert!(permissions.contains(&json!("reports:write")));
    let cookie = login.cookie.unwrap();
    assert!(cookie.starts_with("rf_session=rf_"));

    let created = app
        .call(
            Method::POST,
            "/api/v1/reports",
            Some(&cookie),
            Some(json!({ "title": "Weekly revenue", "content": { "widgets": [] } })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["status"], "draft");

    let dashboard = app.call(Method::GET, "/api/v1/dashboard", Some(&cookie), None).await;
    assert_eq!(dashboard.status, StatusCode::OK);
    assert_eq!(dashboard.body["organization"]["plan"], "free");
    assert_eq!(dashboard.body["subscription"]["status"], "trialing");
    assert_eq!(dashboard.body["member_count"], 1);
    assert_eq!(dashboard.body["reports_by_status"][0]["status"], "draft");
    assert_eq!(dashboard.body["reports_by_status"][0]["count"], 1);
    assert_eq!(dashboard.body["recent_reports"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = TestApp::new().await;
    app.register("Ada", "ada@acme.test", None).await;

    let reply = app
        .call(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "ada@acme.test", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["error"], "unauthorized");
    assert!(reply.cookie.is_none());

    let duplicate = app.register("Ada again", "ada@acme.test", None).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new().await;
    app.register("Ada", "ada@acme.test", None).await;
    let cookie = app.login("ada@acme.test", "correct-horse").await;

    let me = app.call(Method::GET, "/api/v1/auth/me", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert!(me.body["organization"].is_null());

    let logout = app.call(Method::POST, "/api/v1/auth/logout", Some(&cookie), None).await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);
    assert_eq!(logout.cookie.as_deref(), Some("rf_session="));

    let me = app.call(Method::GET, "/api/v1/auth/me", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_without_organization_gets_404() {
    let app = TestApp::new().await;
    app.register("Solo", "solo@example.test", None).await;
    let cookie = app.login("solo@example.test", "correct-horse").await;

    let reply = app.call(Method::GET, "/api/v1/reports", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reports_are_isolated_between_tenants() {
    let app = TestApp::new().await;
    app.register("Ada", "ada@acme.test", Some("Acme")).await;
    app.register("Bob", "bob@globex.test", Some("Globex")).await;
    let acme = app.login("ada@acme.test", "correct-horse").await;
    let globex = app.login("bob@globex.test", "correct-horse").await;

    let created = app
        .call(
            Method::POST,
            "/api/v1/reports",
            Some(&acme),
            Some(json!({ "title": "Acme secrets" })),
        )
        .await;
    let id = created.body["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/reports/{id}");

    let reply = app.call(Method::GET, &uri, Some(&globex), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    let reply = app
        .call(Method::PUT, &uri, Some(&globex), Some(json!({ "title": "pwned" })))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    let reply = app.call(Method::DELETE, &uri, Some(&globex), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    let list = app.call(Method::GET, "/api/v1/reports", Some(&globex), None).await;
    assert!(list.body.as_array().unwrap().is_empty());

    let reply = app.call(Method::GET, &uri, Some(&acme), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["title"], "Acme secrets");
    let reply = app.call(Method::DELETE, &uri, Some(&acme), None).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_admin_routes_require_session_and_permission() {
    let app = TestApp::new().await;

    let anonymous = app.call(Method::GET, "/api/admin/stats", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    app.register("Ada", "ada@acme.test", Some("Acme")).await;
    let member = app.login("ada@acme.test", "correct-horse").await;
    let forbidden = app.call(Method::GET, "/api/admin/stats", Some(&member), None).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.body["error"], "forbidden");

    let admin = app.admin_cookie().await;
    let stats = app.call(Method::GET, "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(stats.status, StatusCode::OK);
    assert_eq!(stats.body["users"], 2);
    assert_eq!(stats.body["organizations"], 1);
    assert_eq!(stats.body["roles"], 3);
    assert_eq!(stats.body["active_sessions"], 2);
}

#[tokio::test]
async fn test_admin_disabling_user_revokes_sessions() {
    let app = TestApp::new().await;
    let registered = app.register("Ada", "ada@acme.test", Some("Acme")).await;
    let user_id = registered.body["id"].as_str().unwrap().to_string();
    let member = app.login("ada@acme.test", "correct-horse").await;
    let admin = app.admin_cookie().await;

    let reply = app
        .call(
            Method::PUT,
            &format!("/api/admin/users/{user_id}"),
            Some(&admin),
            Some(json!({ "status": "disabled" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "disabled");

    let me = app.call(Method::GET, "/api/v1/auth/me", Some(&member), None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    let reply = app
        .call(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "ada@acme.test", "password": "correct-horse" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    // The organization still has a member, so it cannot be removed yet.
    let org_id = registered.body["organization_id"].as_str().unwrap().to_string();
    let reply = app
        .call(Method::DELETE, &format!("/api/admin/organizations/{org_id}"), Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = app
        .call(Method::DELETE, &format!("/api/admin/users/{user_id}"), Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    let reply = app
        .call(Method::DELETE, &format!("/api/admin/organizations/{org_id}"), Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_admin_cannot_remove_itself() {
    let app = TestApp::new().await;
    let admin = app.admin_cookie().await;
    let me = app.call(Method::GET, "/api/v1/auth/me", Some(&admin), None).await;
    let admin_id = me.body["user"]["id"].as_str().unwrap().to_string();

    let reply = app
        .call(Method::DELETE, &format!("/api/admin/users/{admin_id}"), Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    let reply = app
        .call(
            Method::PUT,
            &format!("/api/admin/users/{admin_id}"),
            Some(&admin),
            Some(json!({ "status": "disabled" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_role_permission_management() {
    let app = TestApp::new().await;
    let admin = app.admin_cookie().await;

    let permission = app
        .call(
            Method::POST,
            "/api/admin/permissions",
            Some(&admin),
            Some(json!({ "resource": "exports", "action": "run", "description": "Run exports" })),
        )
        .await;
    assert_eq!(permission.status, StatusCode::CREATED);
    let permission_id = permission.body["id"].as_str().unwrap().to_string();

    let role = app
        .call(
            Method::POST,
            "/api/admin/roles",
            Some(&admin),
            Some(json!({ "name": "exporter", "description": "Runs exports" })),
        )
        .await;
    assert_eq!(role.status, StatusCode::CREATED);
    assert_eq!(role.body["is_system"], false);
    let role_id = role.body["id"].as_str().unwrap().to_string();
    let grant_uri = format!("/api/admin/roles/{role_id}/permissions/{permission_id}");

    let assigned = app.call(Method::POST, &grant_uri, Some(&admin), None).await;
    assert_eq!(assigned.status, StatusCode::OK);
    assert_eq!(assigned.body["permissions"][0]["resource"], "exports");
    // Granting twice keeps a single row.
    let again = app.call(Method::POST, &grant_uri, Some(&admin), None).await;
    assert_eq!(again.body["permissions"].as_array().unwrap().len(), 1);

    let revoked = app.call(Method::DELETE, &grant_uri, Some(&admin), None).await;
    assert_eq!(revoked.status, StatusCode::NO_CONTENT);
    let revoked = app.call(Method::DELETE, &grant_uri, Some(&admin), None).await;
    assert_eq!(revoked.status, StatusCode::NOT_FOUND);

    let replaced = app
        .call(
            Method::PUT,
            &format!("/api/admin/roles/{role_id}/permissions"),
            Some(&admin),
            Some(json!({ "permission_ids": [permission_id] })),
        )
        .await;
    assert_eq!(replaced.status, StatusCode::OK);
    assert_eq!(replaced.body.as_array().unwrap().len(), 1);

    let duplicate = app
        .call(
            Method::POST,
            "/api/admin/roles",
            Some(&admin),
            Some(json!({ "name": "exporter" })),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let roles = app.call(Method::GET, "/api/admin/roles", Some(&admin), None).await;
    let admin_role = roles
        .body
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "admin")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();
    let reply = app
        .call(Method::DELETE, &format!("/api/admin/roles/{admin_role}"), Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    let reply = app
        .call(
            Method::PUT,
            &format!("/api/admin/roles/{admin_role}"),
            Some(&admin),
            Some(json!({ "name": "root" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = app
        .call(Method::DELETE, &format!("/api/admin/roles/{role_id}"), Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_signup_setting_and_audit_trail() {
    let app = TestApp::new().await;
    let admin = app.admin_cookie().await;

    let reply = app
        .call(
            Method::PUT,
            "/api/admin/settings/signup_enabled",
            Some(&admin),
            Some(json!({ "value": "false" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["value"], "false");

    let reply = app.register("Eve", "eve@example.test", None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let logs = app
        .call(
            Method::GET,
            "/api/admin/audit-logs?action=setting.update&resource_type=setting",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(logs.status, StatusCode::OK);
    let entries = logs.body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["resource_id"], "signup_enabled");

    let logins = app
        .call(Method::GET, "/api/admin/audit-logs?action=auth.login&limit=1", Some(&admin), None)
        .await;
    assert_eq!(logins.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_ops_endpoints() {
    let app = TestApp::new().await;

    let health = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "healthy");
    assert_eq!(health.body["database"], "sqlite");
    assert_eq!(health.body["database_reachable"], true);

    let ready = app.call(Method::GET, "/ready", None, None).await;
    assert_eq!(ready.status, StatusCode::OK);

    let doc = app.call(Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(doc.status, StatusCode::OK);
    assert_eq!(doc.body["info"]["title"], "ReportFlow API");
}

#[tokio::test]
async fn test_viewer_reads_but_cannot_write_reports() {
    let app = TestApp::new().await;
    let owner = app.register("Ada", "ada@acme.test", Some("Acme")).await;
    let org_id = owner.body["organization_id"].as_str().unwrap().to_string();
    let ada = app.login("ada@acme.test", "correct-horse").await;
    let created = app
        .call(Method::POST, "/api/v1/reports", Some(&ada), Some(json!({ "title": "Q3" })))
        .await;
    let uri = format!("/api/v1/reports/{}", created.body["id"].as_str().unwrap());

    let vic = app.register("Vic", "vic@acme.test", None).await;
    let vic_id = vic.body["id"].as_str().unwrap().to_string();
    let admin = app.admin_cookie().await;
    let viewer_role = app.role_id(&admin, "viewer").await;
    let reply = app
        .call(
            Method::PUT,
            &format!("/api/admin/users/{vic_id}"),
            Some(&admin),
            Some(json!({ "organization_id": org_id, "role_id": viewer_role })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let viewer = app.login("vic@acme.test", "correct-horse").await;

    let list = app.call(Method::GET, "/api/v1/reports", Some(&viewer), None).await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.body.as_array().unwrap().len(), 1);
    let read = app.call(Method::GET, &uri, Some(&viewer), None).await;
    assert_eq!(read.status, StatusCode::OK);
    assert_eq!(read.body["title"], "Q3");

    let create = app
        .call(Method::POST, "/api/v1/reports", Some(&viewer), Some(json!({ "title": "Nope" })))
        .await;
    assert_eq!(create.status, StatusCode::FORBIDDEN);
    assert_eq!(create.body["error"], "forbidden");
    let update = app
        .call(Method::PUT, &uri, Some(&viewer), Some(json!({ "title": "Edited" })))
        .await;
    assert_eq!(update.status, StatusCode::FORBIDDEN);
    let delete = app.call(Method::DELETE, &uri, Some(&viewer), None).await;
    assert_eq!(delete.status, StatusCode::FORBIDDEN);

    let unchanged = app.call(Method::GET, &uri, Some(&ada), None).await;
    assert_eq!(unchanged.body["title"], "Q3");
}

#[tokio::test]
async fn test_admin_cannot_lock_itself_out() {
    let app = TestApp::new().await;
    let admin = app.admin_cookie().await;
    let me = app.call(Method::GET, "/api/v1/auth/me", Some(&admin), None).await;
    let admin_id = me.body["user"]["id"].as_str().unwrap().to_string();
    let admin_role = app.role_id(&admin, "admin").await;
    let member_role = app.role_id(&admin, "member").await;
    let wildcard = app.permission_id(&admin, "*:*").await;
    let access = app.permission_id(&admin, "admin:access").await;

    let demote = app
        .call(
            Method::PUT,
            &format!("/api/admin/users/{admin_id}"),
            Some(&admin),
            Some(json!({ "role_id": member_role })),
        )
        .await;
    assert_eq!(demote.status, StatusCode::CONFLICT);
    let drop_role = app
        .call(
            Method::PUT,
            &format!("/api/admin/users/{admin_id}"),
            Some(&admin),
            Some(json!({ "role_id": null })),
        )
        .await;
    assert_eq!(drop_role.status, StatusCode::CONFLICT);
    // Re-sending the current role is not a change.
    let same = app
        .call(
            Method::PUT,
            &format!("/api/admin/users/{admin_id}"),
            Some(&admin),
            Some(json!({ "role_id": admin_role, "name": "Root" })),
        )
        .await;
    assert_eq!(same.status, StatusCode::OK);

    let replace = app
        .call(
            Method::PUT,
            &format!("/api/admin/roles/{admin_role}/permissions"),
            Some(&admin),
            Some(json!({ "permission_ids": [access] })),
        )
        .await;
    assert_eq!(replace.status, StatusCode::CONFLICT);
    let revoke = app
        .call(
            Method::DELETE,
            &format!("/api/admin/roles/{admin_role}/permissions/{wildcard}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(revoke.status, StatusCode::CONFLICT);
    let delete = app
        .call(Method::DELETE, &format!("/api/admin/permissions/{wildcard}"), Some(&admin), None)
        .await;
    assert_eq!(delete.status, StatusCode::CONFLICT);

    let stats = app.call(Method::GET, "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(stats.status, StatusCode::OK);
}

#[tokio::test]
async fn test_detached_members_free_the_organization() {
    let app = TestApp::new().await;
    let registered = app.register("Ada", "ada@acme.test", Some("Acme")).await;
    let user_id = registered.body["id"].as_str().unwrap().to_string();
    let org_id = registered.body["organization_id"].as_str().unwrap().to_string();
    let admin = app.admin_cookie().await;

    let org_uri = format!("/api/admin/organizations/{org_id}");
    let reply = app.call(Method::DELETE, &org_uri, Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let detached = app
        .call(
            Method::PUT,
            &format!("/api/admin/users/{user_id}"),
            Some(&admin),
            Some(json!({ "organization_id": null, "role_id": null })),
        )
        .await;
    assert_eq!(detached.status, StatusCode::OK);
    assert!(detached.body["organization_id"].is_null());
    assert!(detached.body["role_id"].is_null());

    let reply = app.call(Method::DELETE, &org_uri, Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    // Admin actions on the organization are filed under it, not the admin.
    let logs = app
        .call(
            Method::GET,
            &format!("/api/admin/audit-logs?organization_id={org_id}"),
            Some(&admin),
            None,
        )
        .await;
    let actions: Vec<&str> = logs
        .body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    assert!(actions.contains(&"user.update"));
    assert!(actions.contains(&"organization.delete"));
}
