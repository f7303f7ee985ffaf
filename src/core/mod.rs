//! # Core Application Logic
//!
//! This module contains Sift's business logic.
//! It knows nothing about terminals or sockets.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • State (app data)     │
//!                    │  • Action (events)      │
//!                    │  • update() (reducer)   │
//!                    │  • Stage interpreter    │
//!                    │                         │
//!                    │  No I/O. No UI. Pure.   │
//!                    └───────────┬─────────────┘
//!                                │
//!                 ┌──────────────┴──────────────┐
//!                 ▼                             ▼
//!          ┌────────────┐                ┌────────────┐
//!          │    TUI     │                │ Transport  │
//!          │  Adapter   │ ◄── Actions ── │ (socket.io)│
//!          │ (ratatui)  │ ── Effects ──► │            │
//!          └────────────┘                └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`state`]: The `App` struct, all application state in one place
//! - [`action`]: The `Action` enum and `update()` reducer
//! - [`event`]: Typed server/client events
//! - [`stage`]: How stage events mutate the in-flight message
//! - [`transcript`]: The append-only record store
//! - [`config`]: Settings resolution

pub mod action;
pub mod config;
pub mod event;
pub mod stage;
pub mod state;
pub mod transcript;
