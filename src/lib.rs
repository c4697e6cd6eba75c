#![deny(missing_docs)]
//! MrBalbes - a deliberately rude Telegram chat bot backed by Gemini
//!
//! Relays text, photos and stickers to the Gemini API with per-chat
//! conversation history, admin-gated commands, a grant system for group
//! members and an inline fortune button.

/// Admin and grant checks
pub mod access;
/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
/// Generation pipeline over the conversation state
pub mod gateway;
/// Gemini client and wire types
pub mod llm;
/// Shared runtime state
pub mod state;
pub mod utils;
