//! Platform abstraction for stat, readlink, and filesystem probing.

pub mod pal;
