//! Conversation state and agent-reply normalization for a product
//! recommendation chat client.

pub mod agent;
pub mod config;
pub mod db;
pub mod demo;
pub mod errors;
pub mod ids;
pub mod models;
pub mod normalizer;
pub mod routes;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
