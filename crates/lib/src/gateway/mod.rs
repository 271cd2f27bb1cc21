//! Gateway server: health, live session event stream, and channel webhooks.

pub mod server;

pub use server::{build_router, build_state, run_gateway, GatewayState};
