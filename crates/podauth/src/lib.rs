//! Client-side authentication for Solid pods.
//!
//! Acquires (optionally DPoP-bound) tokens from an OIDC provider, checks
//! access grants before touching a resource, and decorates outgoing
//! requests with bearer credentials and correlation headers. Transport is
//! pluggable through [`podauth_common::HttpClient`].

pub mod config;
pub mod dpop;
pub mod error;
pub mod fetch;
pub mod grant;
pub mod jose;
pub mod keys;
pub mod pod;
pub mod token;
pub mod types;
pub mod vc;

pub use podauth_common::{FetchFn, HttpClient};
