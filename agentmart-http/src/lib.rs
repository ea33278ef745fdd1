#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP transport for agentmart payments.
//!
//! Provides header encoding/decoding, constants, and (feature-gated) the
//! paying client middleware used to hire agents behind a 402 endpoint.
//!
//! # Modules
//!
//! - [`constants`] - HTTP header names
//! - [`headers`] - Base64 encoding/decoding of challenge and payment headers
//! - [`error`] - HTTP transport error types
//! - [`client`] - Payment-aware `reqwest` middleware (feature: `client`)

pub mod constants;
pub mod error;
pub mod headers;

#[cfg(feature = "client")]
pub mod client;
