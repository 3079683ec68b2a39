//! Discord connectivity: the gateway session state machine (handshake,
//! heartbeat liveness, dispatch, reconnect with backoff) and the REST
//! delivery path used to direct-message rendered digests.

pub mod config;
pub mod error;
pub mod rest;
pub mod session;
pub mod wire;

pub use {
    config::{GatewayConfig, ReconnectPolicy},
    error::{Error, Result},
    rest::{DirectMessageSink, RestClient},
    session::{GatewaySession, SessionState, SessionStatus},
};
