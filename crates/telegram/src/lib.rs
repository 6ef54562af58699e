//! Telegram Integration - long-polling bot interface
//!
//! This crate connects the conversation coordinator to the Telegram Bot API:
//! - **Polling** (`polling`) - `getUpdates` loop with failure backoff
//! - **Lanes** (`lanes`) - per-user ordered processing of updates
//! - **Events** (`events`) - update envelopes routed to handlers
//! - **Keyboards** (`keyboards`) - inline keyboard rendering of replies
//! - **Bot API** (`api`) - HTTP transport and wire types
//!
//! # Architecture
//!
//! ```text
//! getUpdates → PollingRunner → per-user lane → EventDispatcher → Coordinator
//!                                   ↓
//!                    sendMessage ← OutgoingMessage ← Reply
//! ```

pub mod api;
pub mod events;
pub mod keyboards;
pub mod lanes;
pub mod polling;
