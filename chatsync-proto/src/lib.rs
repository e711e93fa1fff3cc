//! `ChatSync` — data model and push-event types for the private-messaging
//! synchronization engine.

pub mod attachment;
pub mod codec;
pub mod conversation;
pub mod event;
pub mod message;
