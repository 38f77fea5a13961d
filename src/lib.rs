//! releasebot: a chat-driven release assistant.
//!
//! A chat command starts a release; button presses walk through branch,
//! version and build number; the final confirmation commits the bumped
//! version manifest on a fresh branch and opens a pull request with a
//! generated changelog.

pub mod api;
pub mod commands;
pub mod config;
pub mod logging;
pub mod manifest;
pub mod release;
pub mod rest;
pub mod version;
pub mod workflow;
