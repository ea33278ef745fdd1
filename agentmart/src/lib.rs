#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! An AI agent marketplace on Solana.
//!
//! Browse a catalog of agent listings and fund agents from a connected
//! wallet, either by a direct SOL transfer or through an HTTP endpoint that
//! answers `402 Payment Required`.
//!
//! # Architecture
//!
//! - [`catalog`] - Listing types and the embedded catalog
//! - [`query`] - Search, sorting, leaderboards and analytics
//! - [`reviews`] - Client reviews with rating distributions
//! - [`payer`] - Wraps an HTTP client so challenged requests are paid from the wallet
//! - [`funding`] - The funding action with its in-flight guard
//! - [`config`] - Command-line and environment settings

pub mod catalog;
pub mod config;
pub mod funding;
pub mod payer;
pub mod query;
pub mod reviews;
