//! Application services (use cases).
//!
//! These services orchestrate domain logic and coordinate adapters
//! to implement the application's use cases.

pub mod context;
pub mod coordinator;
pub mod dispatch;
pub mod evaluate;
pub mod notice;
pub mod report;
pub mod retry;
pub mod risk;
pub mod throttle;
