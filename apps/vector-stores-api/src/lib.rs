//! Vector Stores API
//!
//! A REST service for managing vector stores: named collections of
//! embedded document pages with semantic search on top.
//!
//! ## Architecture
//!
//! ```text
//! Client (HTTP/JSON)
//!   ↓ (axum REST handlers + Swagger UI)
//! VectorStoreService (domain layer)
//!   ↓ (orchestration)
//! ┌──────────────────┬───────────────────┐
//! │ QdrantRepository │  UpstageProvider  │
//! └──────────────────┴───────────────────┘
//!   ↓                      ↓
//! Qdrant              Upstage API
//! ```
//!
//! ## Modules
//!
//! - `config`: Environment-driven application configuration
//! - `server`: Server initialization and lifecycle

pub mod config;
pub mod server;

pub use config::Config;
pub use server::run;
