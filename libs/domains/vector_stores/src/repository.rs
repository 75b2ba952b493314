use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{CollectionParams, DistanceMetric, PointFilter, PointRecord, ScoredPoint};

/// Repository trait abstracting the backing vector index (Qdrant).
///
/// Collection names passed here are the full backing names
/// (`vs_{store_id}`); the service layer owns the store-to-collection
/// mapping.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexRepository: Send + Sync {
    // ===== Collection Management =====

    /// Create a collection with the given metric and vector size
    async fn create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
        dimension: u32,
    ) -> StoreResult<()>;

    /// Create a keyword payload index on a field, so payload filters
    /// against it are served from the index
    async fn create_payload_index(&self, name: &str, field: &str) -> StoreResult<()>;

    /// Delete a collection. Returns false when it did not exist.
    async fn delete_collection(&self, name: &str) -> StoreResult<bool>;

    /// Whether a collection exists
    async fn collection_exists(&self, name: &str) -> StoreResult<bool>;

    /// List all collection names in the index
    async fn list_collections(&self) -> StoreResult<Vec<String>>;

    /// Vector configuration of a collection, or None when absent
    async fn collection_params(&self, name: &str) -> StoreResult<Option<CollectionParams>>;

    // ===== Point Operations =====

    /// Upsert points in one batch; idempotent per point id.
    async fn upsert(&self, name: &str, points: Vec<PointRecord>, wait: bool) -> StoreResult<()>;

    /// Fetch points by id
    async fn retrieve(
        &self,
        name: &str,
        ids: Vec<Uuid>,
        with_vectors: bool,
    ) -> StoreResult<Vec<PointRecord>>;

    /// Walk every point matching the filter (paged scroll under the hood)
    async fn scroll(
        &self,
        name: &str,
        filter: Option<PointFilter>,
        with_vectors: bool,
    ) -> StoreResult<Vec<PointRecord>>;

    /// Delete all points matching the payload filter
    async fn delete_by_filter(
        &self,
        name: &str,
        filter: PointFilter,
        wait: bool,
    ) -> StoreResult<()>;

    /// Nearest-neighbor search; scores carry the index's raw metric
    /// semantics (similarity for cosine/dot, distance for euclidean).
    async fn search(
        &self,
        name: &str,
        vector: Vec<f32>,
        top_k: u32,
        filter: Option<PointFilter>,
    ) -> StoreResult<Vec<ScoredPoint>>;
}
