//! Async client for the OpenUV API (<https://www.openuv.io>).
//!
//! This crate defines:
//! - The [`Client`] with its request executor and data operations
//! - A typed [`Error`] whose kind tells "bad key", "quota spent",
//!   "service down" and "transient, try later" apart
//! - Retry policy, transport seam and on-disk configuration
//!
//! It is used by `openuv-cli`, but can also be reused by other binaries or services.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod retry;
pub mod session;
pub mod util;

pub use client::{ApiKey, Client, ClientBuilder, ClientConfig};
pub use config::{Config, Location};
pub use error::{Error, ErrorKind, Result};
pub use model::{Payload, ProtectionWindow, UvForecast, UvIndex, parse_result};
pub use retry::{Backoff, RetryPolicy};
pub use session::{HttpSession, ReqwestSession, SessionFactory};
pub use util::validate_api_key;
