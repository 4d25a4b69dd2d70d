//! # reddkit_core
//!
//! Session lifecycle, OAuth2 token refresh and upstream forwarding for ReddKit.
//!
//! The HTTP surface lives in `reddkit_api`; this crate owns the state.

pub mod auth;
pub mod login;
pub mod oauth;
pub mod proxy;
pub mod session;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
