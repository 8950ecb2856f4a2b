//! Platform services layered over storage: password hashing, cookie
//! sessions, role-based access control, account management, auditing,
//! and first-start bootstrap.

pub mod accounts;
pub mod audit;
pub mod bootstrap;
pub mod password;
pub mod rbac;
pub mod session;

pub use accounts::{AccountService, Registration};
pub use audit::{AuditEntry, AuditLogger};
pub use bootstrap::BootstrapReport;
pub use password::PasswordHasher;
pub use rbac::RbacService;
pub use session::{Session, SessionManager};
