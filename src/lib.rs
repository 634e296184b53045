#![forbid(unsafe_code)]

//! paritydrift — filesystem-state reconciliation for snapshot parity
//! protection of disk arrays.
//!
//! The scan core walks a set of data disks, compares what is on disk
//! against a previously persisted inventory, and classifies every entry
//! as equal, moved, restored, changed, removed, or inserted, while
//! keeping the block-addressed parity map consistent for the sync, fix,
//! and scrub phases that run afterwards.

pub mod core;
pub mod inventory;
pub mod logger;
pub mod platform;
pub mod prelude;
pub mod scanner;
