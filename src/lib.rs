//! `hs-fetch` is an async HTTP client wrapper for token-protected JSON APIs.
//!
//! On top of a fetch-like [`Transport`] it adds:
//! - `Authorization` headers from a caller supplied token getter
//! - single-flight token refresh on `401` (see [`TokenManager`])
//! - per-attempt timeouts and fixed-delay retries
//! - request lifecycle [`Hooks`]
//!
//! Entry points are the verb methods on [`Api`]: [`Api::get`], [`Api::post`],
//! [`Api::put`], [`Api::patch`] and [`Api::delete`].

mod client;
mod config;
mod error;
mod executor;
mod handler;
mod headers;
mod hooks;
pub mod jwt;
mod options;
mod request;
mod token;
mod transport;
mod types;
mod url;

pub use client::Api;
pub use config::{ApiConfig, ApiConfigUpdate, GetTokenFn, RefreshFailedFn, RefreshTokenFn};
pub use error::{BoxError, FetchError, RefreshError};
pub use headers::build_headers;
pub use hooks::{AfterResponseFn, BeforeRequestFn, Hooks, OnErrorFn, OnSuccessFn};
pub use options::{Backoff, ClientOptions};
pub use request::RequestOptions;
pub use token::TokenManager;
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
pub use types::ResponseData;
pub use url::{build_url, Query};

pub use reqwest::{Method, StatusCode};

pub type Result<T> = std::result::Result<T, FetchError>;
