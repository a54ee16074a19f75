//! Domain types and rules for pool monitoring and trade dispatch.
//!
//! Nothing in this module performs I/O. Collaborators and persistence are
//! reached through [`crate::port`].

pub mod agent;
pub mod assessment;
pub mod error;
pub mod exposure;
pub mod id;
pub mod money;
pub mod opportunity;
pub mod rule;
pub mod sizing;
pub mod snapshot;
pub mod subscription;
pub mod trade;
