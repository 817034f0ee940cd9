// onefs-api: blocking Rust client for the OneFS platform REST API

pub mod api_error;
pub mod auth;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod dump;
pub mod endpoint;
pub mod error;
pub mod params;
pub mod request;
pub mod retry;
pub mod session;
pub mod transport;
pub mod version;

pub use api_error::{ApiError, ErrorDetail, HtmlError, JsonError};
pub use auth::{Authenticate, Credentials, HttpAuthenticator};
pub use client::Client;
pub use config::{AuthMode, ClientConfig, TlsConfig, TlsVerification, TlsVersion, Verbosity};
pub use dispatch::{Dispatch, HttpDispatcher, Reply};
pub use error::Error;
pub use params::OrderedParams;
pub use request::{Body, Request};
pub use session::{Session, SessionTokens};
pub use version::ApiVersion;

pub use tokio_util::sync::CancellationToken;
