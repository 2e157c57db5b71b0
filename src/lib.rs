//! LavControl - administrative backend for laundromat chains
//!
//! Stores, biometric door devices, clients, access logs and alerts behind a
//! REST API, a WebSocket feed and an MQTT bridge to the door controllers.
//! All modules are public so integration tests can drive them directly.

pub mod auth;
pub mod dashboard;
pub mod entities;
pub mod errors;
pub mod hub;
pub mod jobs;
pub mod jwks;
pub mod mqtt;
pub mod settings;
pub mod storage;
pub mod types;
pub mod user_sync;
pub mod web;
