use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Prefix for backing index collections, so store collections can be
/// told apart from anything else living in the same Qdrant instance.
pub const COLLECTION_PREFIX: &str = "vs_";

/// Payload discriminator key present on every point.
pub const PAYLOAD_KIND: &str = "kind";
/// Kind value for embedded page points.
pub const KIND_PAGE: &str = "page";
/// Kind value for the per-collection store metadata point.
pub const KIND_STORE: &str = "store";

/// Payload fields used in filters. Indexed as keywords at collection
/// creation so scroll/delete/search filters never fall back to full
/// scans.
pub const INDEXED_PAYLOAD_FIELDS: [&str; 2] = [PAYLOAD_KIND, "file_id"];

/// Backing collection name for a store id.
pub fn collection_name(store_id: Uuid) -> String {
    format!("{}{}", COLLECTION_PREFIX, store_id)
}

/// Recover a store id from a backing collection name.
///
/// Returns `None` for collections that were not created by this
/// service (no prefix, or the suffix is not a UUID).
pub fn store_id_from_collection(name: &str) -> Option<Uuid> {
    let suffix = name.strip_prefix(COLLECTION_PREFIX)?;
    Uuid::parse_str(suffix).ok()
}

/// Distance metric for similarity calculations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
    Euclidean,
}

impl DistanceMetric {
    /// Normalize a raw index score into a higher-is-better value.
    ///
    /// Qdrant reports similarity for cosine/dot (already higher is
    /// better) but raw distance for euclidean, so the latter is negated
    /// to keep a single ordering convention in API responses.
    pub fn normalized_score(&self, raw: f32) -> f32 {
        match self {
            DistanceMetric::Cosine | DistanceMetric::Dot => raw,
            DistanceMetric::Euclidean => -raw,
        }
    }
}

/// A vector store: named collection of embedded document chunks,
/// mapping 1:1 to a backing index collection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VectorStore {
    pub id: Uuid,
    pub name: String,
    pub distance_metric: DistanceMetric,
    pub dimension: u32,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a store
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateStore {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub distance_metric: DistanceMetric,
    /// Embedding dimension; defaults to the configured embedding
    /// model's dimension when omitted.
    #[serde(default)]
    pub dimension: Option<u32>,
}

/// Input for updating a store
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateStore {
    pub name: Option<String>,
    pub distance_metric: Option<DistanceMetric>,
}

/// Ingestion status of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Processed,
    Failed,
}

/// A logical ingested document, represented in the index as the set of
/// page points sharing its file id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoreFile {
    pub id: Uuid,
    pub store_id: Uuid,
    pub filename: String,
    pub status: FileStatus,
    pub page_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Payload attached to every embedded page point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagePayload {
    pub kind: String,
    pub file_id: Uuid,
    pub store_id: Uuid,
    pub filename: String,
    pub page_number: u32,
    pub source_text: String,
    pub ingested_at: DateTime<Utc>,
}

/// Payload of the reserved store metadata point.
///
/// Qdrant collections carry no free-form collection-level metadata, so
/// the store name and creation time live in one reserved point
/// (`Uuid::nil()`) per collection. Page-scoped operations filter on
/// `kind == "page"` and never see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMetaPayload {
    pub kind: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A point as stored in or read from the index.
#[derive(Debug, Clone)]
pub struct PointRecord {
    pub id: Uuid,
    pub vector: Option<Vec<f32>>,
    pub payload: serde_json::Value,
}

/// A point returned from nearest-neighbor search, with its raw score.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: Uuid,
    pub score: f32,
    pub payload: serde_json::Value,
}

/// Vector configuration of an existing collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionParams {
    pub dimension: u32,
    pub metric: DistanceMetric,
}

/// Exact-match payload filter, translated to the index's native filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointFilter {
    pub must: Vec<(String, serde_json::Value)>,
}

impl PointFilter {
    pub fn matches(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            must: vec![(key.into(), value.into())],
        }
    }

    pub fn and(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.must.push((key.into(), value.into()));
        self
    }

    /// Filter selecting all page points.
    pub fn pages() -> Self {
        Self::matches(PAYLOAD_KIND, KIND_PAGE)
    }

    /// Filter selecting the page points of one file.
    pub fn file_pages(file_id: Uuid) -> Self {
        Self::pages().and("file_id", file_id.to_string())
    }
}

/// Payload echoed back on query results.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryResultPayload {
    pub file_id: Uuid,
    pub filename: String,
    pub page_number: u32,
    pub source_text: String,
}

/// One ranked k-NN search hit. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryResultItem {
    pub id: Uuid,
    /// Similarity score, always higher-is-better regardless of the
    /// store's distance metric.
    pub score: f32,
    pub payload: QueryResultPayload,
}
