//! # MPG server
//! This module hosts the HTTP server for the mobile-money payment gateway. It is responsible for:
//! Receiving provider SMS forwarded from agent handsets and handing them to the reconciliation engine.
//! Exposing the admin routes that settle, reject or expire payins, payouts, withdrawals and payment requests.
//! Exposing the merchant routes for withdrawals, payment requests and transaction history.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/payment/callbackSms`: The webhook that SMS forwarding apps post to.
//! * `/api/admin/...`: Settlement, onboarding and reporting routes for gateway operators.
//! * `/api/merchant/...`: Withdrawal, payment request and history routes for merchants.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
