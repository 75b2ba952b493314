//! Vector Stores Domain Library
//!
//! OpenAI-style vector store management: named stores of embedded
//! document pages, backed one-to-one by Qdrant collections, with
//! digitization and embedding delegated to the Upstage API.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  VectorStoreService  │  ← store/file/query orchestration
//! └──────────┬───────────┘
//!            │
//! ┌──────────▼──────────┐     ┌───────────────────┐
//! │   IndexRepository   │     │ EmbeddingProvider │
//! │      (trait)        │     │      (trait)      │
//! └──────────┬──────────┘     └─────────┬─────────┘
//!            │                          │
//! ┌──────────▼──────────┐     ┌─────────▼─────────┐
//! │  QdrantRepository   │     │  UpstageProvider  │
//! │  (implementation)   │     │ (digitize + embed)│
//! └─────────────────────┘     └───────────────────┘
//! ```
//!
//! # Features
//!
//! - **Store Management**: Create, list, get, rename, and delete stores;
//!   distance-metric changes recreate the backing collection safely
//! - **File Ingestion**: Digitize uploaded documents into pages, embed
//!   each page, and index one point per page atomically
//! - **Semantic Search**: Embed query text and run filtered k-NN search
//!   with scores normalized to higher-is-better
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_vector_stores::{
//!     CreateStore, DistanceMetric, QdrantConfig, QdrantRepository,
//!     UpstageProvider, VectorStoreService,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repository = QdrantRepository::new(QdrantConfig::from_env()?).await?;
//! let embedder = Arc::new(UpstageProvider::from_env()?);
//! let service = VectorStoreService::new(repository, embedder);
//!
//! let store = service
//!     .create_store(CreateStore {
//!         name: "documents".to_string(),
//!         distance_metric: DistanceMetric::Cosine,
//!         dimension: None,
//!     })
//!     .await?;
//!
//! let results = service.query(store.id, "quarterly revenue", 5).await?;
//! # Ok(())
//! # }
//! ```

pub mod embedding;
pub mod error;
pub mod handlers;
pub mod models;
pub mod qdrant;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use embedding::{EmbeddingProvider, UpstageConfig, UpstageProvider};
pub use error::{StoreResult, VectorStoreError};
pub use handlers::{router, VectorStoresApiDoc};
pub use models::{
    CreateStore, DistanceMetric, FileStatus, QueryResultItem, QueryResultPayload, StoreFile,
    UpdateStore, VectorStore,
};
pub use qdrant::{QdrantConfig, QdrantRepository};
pub use repository::IndexRepository;
pub use service::VectorStoreService;
