//! Route handlers for the HTTP surface.

pub mod events;
pub mod health;
pub mod interaction;
