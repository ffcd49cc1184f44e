//! # Gatepass Server
//!
//! HTTP surface over the Gatepass core:
//!
//! - **Storefront**: tier listing and pending orders ([`api::tiers`], [`api::orders`])
//! - **Payment webhook**: signature-checked Paystack events complete orders
//!   ([`api::payments`], [`paystack`])
//! - **Gate**: scan adjudication for door staff ([`api::gate`])
//! - **Back office**: cash sales, refunds, tickets and reports behind signed
//!   session tokens ([`api::admin`], [`api::stats`], [`auth`])
//!
//! The router is store-agnostic: [`AppState::build`] wires the services to
//! any store implementing the core storage traits. The `server` binary uses
//! `PostgreSQL`; the HTTP tests use the in-memory store.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod notify;
pub mod paystack;
pub mod server;

pub use config::{Config, ConfigError};
pub use error::AppError;
pub use server::{AppState, build_router};
