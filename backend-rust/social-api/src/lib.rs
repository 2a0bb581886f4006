// Library entry point for social-api
// Exposes modules for testing

pub mod api;
pub mod auth;
pub mod config;
pub mod events;
pub mod models;
pub mod realtime;
pub mod social;
pub mod store;
