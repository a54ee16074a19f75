//! Inbound (driving) ports consumed by inbound adapters.
//!
//! - [`manual`]: user-triggered invest requests from the chat front-end
//! - [`risk`]: reservation results returned by the risk guard

pub mod manual;
pub mod risk;
