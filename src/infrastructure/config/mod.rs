//! Infrastructure configuration modules.

pub mod agent;
pub mod env;
pub mod logging;
pub mod market;
pub mod notification;
pub mod retry;
pub mod risk;
pub mod rules;
pub mod settings;
pub mod subscription;
pub mod telegram;
