//! nazr: daily time limits for distracting apps.
//!
//! The [`limits`] module holds the enforcement loop and everything it talks to;
//! [`config`] and [`platform`] provide the ambient plumbing.

pub mod config;
pub mod limits;
pub mod platform;
