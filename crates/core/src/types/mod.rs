//! Core types for cartsync.
//!
//! This module provides type-safe wrappers for cart domain concepts.

pub mod auth;
pub mod cart;
pub mod id;
pub mod product;
pub mod quantity;

pub use auth::{AuthState, AuthStatus, Role, UserDescriptor};
pub use cart::{Cart, Coalesced, InvariantViolation, LineItem};
pub use id::*;
pub use product::ProductRef;
pub use quantity::{Quantity, QuantityError};
