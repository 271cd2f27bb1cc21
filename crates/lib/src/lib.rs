//! Parley: multi-tenant conversational session and engagement engine.
//!
//! One durable session per channel user, append-only message history, a
//! streaming reply boundary, and two proactive widget engines (engagement
//! greeting and lead capture). The gateway exposes health, a live event
//! stream, and channel webhooks; the widget controller drives the
//! client-resident session.

pub mod channels;
pub mod config;
pub mod engagement;
pub mod gateway;
pub mod identity;
pub mod industry;
pub mod leads;
pub mod reply;
pub mod session;
pub mod widget;
