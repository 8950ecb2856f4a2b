#![warn(clippy::unwrap_used)]

pub mod admin_rest;
pub mod auth_rest;
pub mod error;
pub mod extract;
pub mod openapi;
pub mod rest;
pub mod server;
pub mod state;
pub mod tenant_rest;

pub use error::{ApiError, ApiResult};
pub use openapi::ApiDoc;
pub use server::{build_router, ApiServer};
pub use state::AppState;
