//! Networking: wire protocol, relay transport adapters, and the session
//! protocol engine.

pub mod protocol;
pub mod relay;
pub mod session;
