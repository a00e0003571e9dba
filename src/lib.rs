//! Core of a chat assistant for Markdown note vaults.
//!
//! Features turn a user action into a chat completion request, stream the
//! answer into a conversation view or into the open document, and save
//! conversations as notes.

pub mod config;
pub mod conversation;
pub mod core;
pub mod features;
pub mod host;
pub mod providers;
pub mod sink;
pub mod stream;

pub use crate::core::error::PluginError;
