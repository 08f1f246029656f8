//! Fanfolio - content model for a media-subscription site
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Aggregates (data::aggregates)               │
//! │  - Album, Gallery, Playlist, Homepage, About                │
//! │  - Payment / OAuth configuration                            │
//! │  - Post (data::post)                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Building blocks                           │
//! │  - Media assets (kind-tagged payload)                       │
//! │  - Ordered collections (dense order indices)                │
//! │  - Reply threads (per-node locking, favorite ledger)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Plumbing                                 │
//! │  - Defaults and hydration                                   │
//! │  - Shared aggregate handles, aggregate cache                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `data`: Content model, hydration and caching
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments
//! - `telemetry`: Tracing subscriber setup

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod telemetry;
