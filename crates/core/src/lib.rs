//! Kirana Core - Shared domain types and business rules.
//!
//! This crate provides the types and pure rules used across all Kirana components:
//! - `api` - Storefront and admin REST API
//! - `cli` - Command-line tools for migrations, admin accounts and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Anything that can be decided from values alone
//! (prices, coupon eligibility, cart merging, order status transitions) lives
//! here so it can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, money and statuses
//! - [`pricing`] - Offer-adjusted unit prices, shipping and order totals
//! - [`coupon`] - Coupon eligibility and discount calculation
//! - [`merge`] - Merging a guest's browser-local cart and wishlist into an account

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod coupon;
pub mod merge;
pub mod pricing;
pub mod types;

pub use types::*;
