//! Scoring API: the [`HookEngine`] facade and its REST surface.

#![warn(clippy::unwrap_used)]

pub mod rest;
pub mod server;
pub mod service;

pub use server::{router, ApiServer};
pub use service::HookEngine;
