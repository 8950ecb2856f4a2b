pub mod config;
pub mod error;
pub mod requests;
pub mod types;

pub use config::AppConfig;
pub use error::{ReportFlowError, ReportFlowResult};
