//! Learnfront Core - Shared types library.
//!
//! This crate provides common types used across all Learnfront components:
//! - `storefront` - Public-facing catalog and checkout site
//! - `cli` - Command-line tools for managing course records
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. This keeps
//! it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
