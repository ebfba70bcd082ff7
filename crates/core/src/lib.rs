//! cartsync Core - Shared cart types library.
//!
//! This crate provides the domain types used across all cartsync components:
//! - `cartsync-cart` - Guest/server cart reconciliation
//! - `cartsync-cli` - Command-line driver for a guest cart on disk
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! storage, no HTTP clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Product ids, quantities, line items, carts, and the
//!   authentication signal

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
