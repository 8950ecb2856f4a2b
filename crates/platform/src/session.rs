//! Server-side cookie sessions keyed by an opaque random token.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use reportflow_core::config::AuthConfig;
use reportflow_core::{ReportFlowError, ReportFlowResult};
use serde::Serialize;
use tracing::info;

const TOKEN_PREFIX: &str = "rf_";
const TOKEN_BYTES: usize = 32;

/// A live login session.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    #[serde(skip_serializing)]
    pub token: String,
    pub user_id: String,
    pub organization_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-process session store plus the cookie attributes sessions travel in.
pub struct SessionManager {
    sessions: DashMap<String, Session>,
    ttl: Duration,
    cookie_name: String,
    secure_cookie: bool,
}

impl SessionManager {
    /// Fails with `Config` when the session TTL does not fit a duration.
    pub fn new(config: &AuthConfig) -> ReportFlowResult<Self> {
        let hours = config.session_ttl_hours.max(1);
        let ttl = Duration::try_hours(hours).ok_or_else(|| {
            ReportFlowError::Config(format!("auth.session_ttl_hours {hours} is out of range"))
        })?;
        Ok(Self {
            sessions: DashMap::new(),
            ttl,
            cookie_name: config.cookie_name.clone(),
            secure_cookie: config.secure_cookie,
        })
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Open a session for `user_id` and return it (including its token).
    pub fn create(
        &self,
        user_id: &str,
        organization_id: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Session {
        let now = Utc::now();
        let session = Session {
            token: generate_token(),
            user_id: user_id.to_string(),
            organization_id,
            ip_address,
            user_agent,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        info!(user_id = %user_id, expires_at = %session.expires_at, "Session created");
        self.sessions.insert(session.token.clone(), session.clone());
        session
    }

    /// Look up a token. Expired sessions are dropped and yield `None`.
    pub fn validate(&self, token: &str) -> Option<Session> {
        let now = Utc::now();
        let session = self.sessions.get(token).map(|s| s.value().clone())?;
        if session.is_expired(now) {
            self.sessions.remove(token);
            return None;
        }
        Some(session)
    }

    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.sessions.remove(token);
        if let Some((_, session)) = &removed {
            info!(user_id = %session.user_id, "Session revoked");
        }
        removed.is_some()
    }

    /// Drop every session belonging to a user. Returns how many were removed.
    pub fn revoke_user(&self, user_id: &str) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.user_id != user_id);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            info!(user_id = %user_id, removed, "User sessions revoked");
        }
        removed
    }

    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// `Set-Cookie` value carrying a fresh session token.
    pub fn session_cookie(&self, token: &str) -> String {
        self.cookie(token, self.ttl.num_seconds())
    }

    /// `Set-Cookie` value that makes the browser discard the session.
    pub fn clear_cookie(&self) -> String {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={value}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age}",
            self.cookie_name
        );
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Extract this manager's token from a `Cookie` request header.
    pub fn token_from_header(&self, header: &str) -> Option<String> {
        header.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == self.cookie_name && !value.is_empty()).then(|| value.to_string())
        })
    }

    #[cfg(test)]
    fn insert_raw(&self, session: Session) {
        self.sessions.insert(session.token.clone(), session);
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{TOKEN_PREFIX}{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(secure: bool) -> SessionManager {
        SessionManager::new(&AuthConfig {
            secure_cookie: secure,
            ..AuthConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_out_of_range_ttl_is_a_config_error() {
        let result = SessionManager::new(&AuthConfig {
            session_ttl_hours: i64::MAX,
            ..AuthConfig::default()
        });
        assert!(matches!(result, Err(ReportFlowError::Config(_))));

        let clamped = SessionManager::new(&AuthConfig {
            session_ttl_hours: 0,
            ..AuthConfig::default()
        })
        .unwrap();
        let session = clamped.create("user-1", None, None, None);
        assert_eq!(session.expires_at - session.issued_at, Duration::hours(1));
    }

    #[test]
    fn test_create_and_validate() {
        let mgr = manager(false);
        let session = mgr.create("user-1", Some("org-1".into()), None, None);
        assert!(session.token.starts_with("rf_"));
        assert_eq!(session.token.len(), 3 + 64);

        let found = mgr.validate(&session.token).unwrap();
        assert_eq!(found.user_id, "user-1");
        assert_eq!(found.organization_id.as_deref(), Some("org-1"));
        assert!(mgr.validate("rf_unknown").is_none());
    }

    #[test]
    fn test_expired_session_is_removed() {
        let mgr = manager(false);
        let now = Utc::now();
        mgr.insert_raw(Session {
            token: "rf_old".into(),
            user_id: "user-1".into(),
            organization_id: None,
            ip_address: None,
            user_agent: None,
            issued_at: now - Duration::hours(30),
            expires_at: now - Duration::hours(6),
        });
        assert!(mgr.validate("rf_old").is_none());
        assert_eq!(mgr.active_count(), 0);
    }

    #[test]
    fn test_revoke_and_revoke_user() {
        let mgr = manager(false);
        let a = mgr.create("user-1", None, None, None);
        mgr.create("user-1", None, None, None);
        let other = mgr.create("user-2", None, None, None);

        assert!(mgr.revoke(&a.token));
        assert!(!mgr.revoke(&a.token));
        assert_eq!(mgr.revoke_user("user-1"), 1);
        assert!(mgr.validate(&other.token).is_some());
    }

    #[test]
    fn test_purge_expired() {
        let mgr = manager(false);
        mgr.create("user-1", None, None, None);
        let now = Utc::now();
        mgr.insert_raw(Session {
            token: "rf_stale".into(),
            user_id: "user-2".into(),
            organization_id: None,
            ip_address: None,
            user_agent: None,
            issued_at: now - Duration::hours(2),
            expires_at: now - Duration::hours(1),
        });
        assert_eq!(mgr.purge_expired(), 1);
        assert_eq!(mgr.active_count(), 1);
    }

    #[test]
    fn test_cookie_headers() {
        let mgr = manager(true);
        let set = mgr.session_cookie("rf_abc");
        assert_eq!(
            set,
            "rf_session=rf_abc; HttpOnly; Path=/; SameSite=Lax; Max-Age=86400; Secure"
        );
        assert!(mgr.clear_cookie().contains("Max-Age=0"));
        assert!(!manager(false).session_cookie("x").contains("Secure"));
    }

    #[test]
    fn test_token_from_header() {
        let mgr = manager(false);
        assert_eq!(
            mgr.token_from_header("theme=dark; rf_session=rf_abc; other=1"),
            Some("rf_abc".to_string())
        );
        assert_eq!(mgr.token_from_header("rf_session="), None);
        assert_eq!(mgr.token_from_header("theme=dark"), None);
    }
}
