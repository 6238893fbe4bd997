//! # Core Engine Logic
//!
//! State, actions and the reducer that ties them together.
//! The reducer performs no I/O and never reads the clock; `config` is the
//! only part that touches the filesystem.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • EngineState          │
//!                    │  • Action / Effect      │
//!                    │  • update() (reducer)   │
//!                    │                         │
//!                    │  No I/O. No UI. Pure.   │
//!                    └───────────┬─────────────┘
//!                                │ Vec<Effect>
//!                                ▼
//!                    ┌─────────────────────────┐
//!                    │         Engine          │
//!                    │ tasks, ticker, sensor,  │
//!                    │ cache                   │
//!                    └───────────┬─────────────┘
//!                                │
//!                         ┌──────┴──────┐
//!                         ▼             ▼
//!                   ┌──────────┐  ┌──────────┐
//!                   │   CLI    │  │  other   │
//!                   │ (main.rs)│  │  hosts   │
//!                   └──────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`state`]: `EngineState`, everything the engine knows in one place
//! - [`action`]: `Action`, `Effect` and `update()`
//! - [`config`]: `~/.miqat/config.toml` plus env and CLI overrides

pub mod action;
pub mod config;
pub mod state;
