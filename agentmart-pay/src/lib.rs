#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core payment types for the agentmart marketplace.
//!
//! This crate holds the chain-agnostic pieces of the pay-per-request flow used
//! when hiring or funding an agent. A remote endpoint answers a request with
//! `402 Payment Required` and a challenge; a registered scheme client turns the
//! challenge into a signed payment; the HTTP layer attaches it to a single
//! retried request.
//!
//! # Modules
//!
//! - [`amount`] - Exact conversion between human-readable amounts and base units
//! - [`chain`] - CAIP-2 chain identifiers and patterns
//! - [`encoding`] - Base64 helpers for header-carried payloads
//! - [`networks`] - Name to chain id registry
//! - [`proto`] - Wire format of the 402 challenge and the payment payload
//! - [`scheme`] - Client-side scheme traits, candidates and selectors
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod amount;
pub mod chain;
pub mod encoding;
pub mod networks;
pub mod proto;
pub mod scheme;
