//! # cratedb
//!
//! Blocking client for the CrateDB Cloud API.
//!
//! This crate provides:
//! - Provider settings resolution (explicit values, then `CRATEDB_*` env vars)
//! - The [`Gateway`] trait: one call per resource kind and action
//! - [`HttpGateway`], a `ureq` implementation with basic auth and retries
//! - [`MockGateway`], an in-memory control plane for tests
//!
//! ## Example
//!
//! ```no_run
//! use cratedb::{ClientConfig, Gateway, HttpGateway, ProviderSettings};
//!
//! let config = ClientConfig::from_env(&ProviderSettings::default()).expect("credentials");
//! let gateway = HttpGateway::new(&config);
//!
//! let response = gateway.list_organizations().expect("request failed");
//! if response.is_success() {
//!     println!("{}", response.body);
//! }
//! ```
//!
//! ## Retry Logic
//!
//! Transport failures and 429/5xx answers (except 501) are retried with a
//! linear backoff. Configure it through [`RetryConfig`] on [`ClientConfig`].

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod mock;
pub mod retry;

pub use config::{ClientConfig, ProviderSettings};
pub use error::{ConfigProblem, Error, ErrorCategory, Result};
pub use gateway::{Gateway, Response};
pub use http::HttpGateway;
pub use mock::{Call, Collection, MockGateway};
pub use retry::RetryConfig;
