//! Infrastructure layer: configuration, logging, HTTP fetching and HTML parsing

pub mod config;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod parsing_error;

pub use config::{AppConfig, ConfigManager};
pub use http_client::{FetchSession, HttpTransport, RawResponse, ReqwestTransport, RetryPolicy};
pub use logging::{get_log_directory, init_logging_in, init_logging_with_config};
pub use parsing_error::{FetchError, ParsingError, ParsingResult};
