//! `ChatSync` — client-side synchronization engine for private messaging.

pub mod channel;
pub mod config;
pub mod engine;
pub mod presence;
pub mod reactions;
pub mod search;
pub mod store;
pub mod typing;
pub mod unread;
pub mod upload;
