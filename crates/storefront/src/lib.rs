//! Learnfront storefront library.
//!
//! Course catalog, ebook and course checkout, and order reconciliation
//! against the external backend. Exposed as a library so the binary, the
//! CLI, and the integration tests share one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod checkout;
pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
