//! The scan engine: filters, directory walker, identity resolvers, and
//! the per-disk driver.

pub mod driver;
pub mod filter;
pub mod resolve;
pub mod walker;
