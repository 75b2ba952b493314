use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::embedding::EmbeddingProvider;
use crate::error::{StoreResult, VectorStoreError};
use crate::models::{
    collection_name, store_id_from_collection, CreateStore, DistanceMetric, FileStatus,
    PagePayload, PointFilter, PointRecord, QueryResultItem, QueryResultPayload, StoreFile,
    StoreMetaPayload, UpdateStore, VectorStore, INDEXED_PAYLOAD_FIELDS, KIND_PAGE, KIND_STORE,
};
use crate::repository::IndexRepository;

/// Service layer orchestrating the index repository and the embedding
/// provider into store/file/query operations.
///
/// Owns the mapping between REST-level stores/files and index-level
/// collections/points. Each operation is a bounded sequential chain of
/// upstream calls; there is no shared mutable state between requests.
#[derive(Clone)]
pub struct VectorStoreService<R: IndexRepository> {
    repository: Arc<R>,
    embedder: Arc<dyn EmbeddingProvider>,
}

/// Reserved metadata point: carries the store name and creation time,
/// since the index has no collection-level metadata. Cosine collections
/// reject all-zero vectors, so it holds a unit basis vector.
fn meta_point(dimension: u32, name: &str, created_at: DateTime<Utc>) -> StoreResult<PointRecord> {
    let mut vector = vec![0.0_f32; dimension as usize];
    if let Some(first) = vector.first_mut() {
        *first = 1.0;
    }

    let payload = serde_json::to_value(StoreMetaPayload {
        kind: KIND_STORE.to_string(),
        name: name.to_string(),
        created_at,
    })?;

    Ok(PointRecord {
        id: Uuid::nil(),
        vector: Some(vector),
        payload,
    })
}

/// Fold page points into per-file metadata: page count per distinct
/// file id, earliest ingestion time, filename from the payload.
fn aggregate_files(store_id: Uuid, points: Vec<PointRecord>) -> Vec<StoreFile> {
    let mut by_file: BTreeMap<Uuid, StoreFile> = BTreeMap::new();

    for point in points {
        let payload: PagePayload = match serde_json::from_value(point.payload) {
            Ok(p) => p,
            Err(e) => {
                warn!("Skipping point {} with malformed payload: {}", point.id, e);
                continue;
            }
        };

        by_file
            .entry(payload.file_id)
            .and_modify(|file| {
                file.page_count += 1;
                if payload.ingested_at < file.created_at {
                    file.created_at = payload.ingested_at;
                }
            })
            .or_insert(StoreFile {
                id: payload.file_id,
                store_id,
                filename: payload.filename,
                status: FileStatus::Processed,
                page_count: 1,
                created_at: payload.ingested_at,
            });
    }

    by_file.into_values().collect()
}

impl<R: IndexRepository> VectorStoreService<R> {
    pub fn new(repository: R, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            repository: Arc::new(repository),
            embedder,
        }
    }

    // ===== Store Management =====

    pub async fn create_store(&self, input: CreateStore) -> StoreResult<VectorStore> {
        input
            .validate()
            .map_err(|e| VectorStoreError::InvalidArgument(e.to_string()))?;

        let dimension = input.dimension.unwrap_or_else(|| self.embedder.dimension());
        if dimension == 0 {
            return Err(VectorStoreError::InvalidArgument(
                "dimension must be positive".to_string(),
            ));
        }

        let store_id = Uuid::new_v4();
        let collection = collection_name(store_id);
        let created_at = Utc::now();

        self.repository
            .create_collection(&collection, input.distance_metric, dimension)
            .await?;

        let meta = meta_point(dimension, &input.name, created_at)?;
        let setup = async {
            for field in INDEXED_PAYLOAD_FIELDS {
                self.repository
                    .create_payload_index(&collection, field)
                    .await?;
            }
            self.repository.upsert(&collection, vec![meta], true).await
        };

        if let Err(e) = setup.await {
            // No half-created stores: drop the fresh collection again
            if let Err(cleanup) = self.repository.delete_collection(&collection).await {
                warn!(
                    "Failed to clean up collection {} after setup failure: {}",
                    collection, cleanup
                );
            }
            return Err(e);
        }

        info!("Created vector store {} ({})", store_id, input.name);

        Ok(VectorStore {
            id: store_id,
            name: input.name,
            distance_metric: input.distance_metric,
            dimension,
            created_at,
        })
    }

    pub async fn get_store(&self, store_id: Uuid) -> StoreResult<VectorStore> {
        let collection = collection_name(store_id);

        let params = self
            .repository
            .collection_params(&collection)
            .await?
            .ok_or(VectorStoreError::StoreNotFound(store_id))?;

        let (name, created_at) = match self.store_meta(&collection).await? {
            Some(meta) => (meta.name, meta.created_at),
            None => {
                warn!("Store {} has no metadata point", store_id);
                (collection, DateTime::UNIX_EPOCH)
            }
        };

        Ok(VectorStore {
            id: store_id,
            name,
            distance_metric: params.metric,
            dimension: params.dimension,
            created_at,
        })
    }

    /// List stores by walking the index's collections; order is
    /// whatever the index reports.
    pub async fn list_stores(&self) -> StoreResult<Vec<VectorStore>> {
        let collections = self.repository.list_collections().await?;

        let mut stores = Vec::new();
        for name in collections {
            let Some(store_id) = store_id_from_collection(&name) else {
                continue;
            };
            match self.get_store(store_id).await {
                Ok(store) => stores.push(store),
                // Raced with a concurrent delete
                Err(VectorStoreError::StoreNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(stores)
    }

    pub async fn update_store(
        &self,
        store_id: Uuid,
        input: UpdateStore,
    ) -> StoreResult<VectorStore> {
        let store = self.get_store(store_id).await?;
        let name = input.name.unwrap_or_else(|| store.name.clone());
        if name.is_empty() {
            return Err(VectorStoreError::InvalidArgument(
                "name must not be empty".to_string(),
            ));
        }

        match input.distance_metric {
            Some(metric) if metric != store.distance_metric => {
                self.migrate_metric(&store, metric, &name).await
            }
            _ => {
                if name != store.name {
                    let collection = collection_name(store_id);
                    let meta = meta_point(store.dimension, &name, store.created_at)?;
                    self.repository.upsert(&collection, vec![meta], true).await?;
                    info!("Renamed vector store {} to {}", store_id, name);
                }
                Ok(VectorStore { name, ..store })
            }
        }
    }

    /// Change a store's distance metric by recreating its collection.
    ///
    /// The index fixes the metric at collection-creation time, so the
    /// points are copied into a staging collection first; the primary
    /// is only dropped once the staging copy is complete, and the
    /// staging collection is kept around if the final restore fails.
    async fn migrate_metric(
        &self,
        store: &VectorStore,
        metric: DistanceMetric,
        name: &str,
    ) -> StoreResult<VectorStore> {
        let collection = collection_name(store.id);
        let staging = format!("{}__migrating", collection);

        let mut points = self.repository.scroll(&collection, None, true).await?;
        for point in points.iter_mut() {
            if point.id == Uuid::nil() {
                point.payload = serde_json::to_value(StoreMetaPayload {
                    kind: KIND_STORE.to_string(),
                    name: name.to_string(),
                    created_at: store.created_at,
                })?;
            }
        }

        self.repository
            .create_collection(&staging, metric, store.dimension)
            .await?;

        if let Err(e) = self
            .repository
            .upsert(&staging, points.clone(), true)
            .await
        {
            if let Err(cleanup) = self.repository.delete_collection(&staging).await {
                warn!("Failed to drop staging collection {}: {}", staging, cleanup);
            }
            return Err(e);
        }

        // The old collection stays intact until the staging copy above
        // has fully landed.
        if let Err(e) = self.repository.delete_collection(&collection).await {
            // Primary untouched, so the staging copy is redundant
            if let Err(cleanup) = self.repository.delete_collection(&staging).await {
                warn!("Failed to drop staging collection {}: {}", staging, cleanup);
            }
            return Err(e);
        }

        let restore = async {
            self.repository
                .create_collection(&collection, metric, store.dimension)
                .await?;
            for field in INDEXED_PAYLOAD_FIELDS {
                self.repository
                    .create_payload_index(&collection, field)
                    .await?;
            }
            self.repository.upsert(&collection, points, true).await
        };

        if let Err(e) = restore.await {
            // Restore failed; keep staging so no data is lost
            warn!(
                "Metric migration for store {} failed after swap; data retained in {}",
                store.id, staging
            );
            return Err(e);
        }

        if let Err(e) = self.repository.delete_collection(&staging).await {
            warn!("Failed to drop staging collection {}: {}", staging, e);
        }

        info!(
            "Migrated vector store {} to metric {:?}",
            store.id, metric
        );

        Ok(VectorStore {
            name: name.to_string(),
            distance_metric: metric,
            ..store.clone()
        })
    }

    pub async fn delete_store(&self, store_id: Uuid) -> StoreResult<()> {
        let collection = collection_name(store_id);

        if !self.repository.collection_exists(&collection).await? {
            return Err(VectorStoreError::StoreNotFound(store_id));
        }

        self.repository.delete_collection(&collection).await?;
        info!("Deleted vector store {}", store_id);
        Ok(())
    }

    // ===== File Ingestion =====

    /// Ingest a file: digitize into pages, embed every page, then write
    /// one point per page in a single batch. On batch failure any
    /// points already written for this file id are cleaned up again, so
    /// a file is either fully present or absent.
    pub async fn ingest_file(
        &self,
        store_id: Uuid,
        file_bytes: Vec<u8>,
        filename: &str,
    ) -> StoreResult<StoreFile> {
        let store = self.get_store(store_id).await?;
        let collection = collection_name(store_id);

        let pages = self.embedder.digitize(file_bytes, filename).await?;
        let vectors = self.embedder.embed_passages(&pages).await?;

        if vectors.len() != pages.len() {
            return Err(VectorStoreError::Embedding(format!(
                "expected {} embeddings, got {}",
                pages.len(),
                vectors.len()
            )));
        }
        if let Some(vector) = vectors.first() {
            if vector.len() as u32 != store.dimension {
                return Err(VectorStoreError::InvalidArgument(format!(
                    "embedding dimension {} does not match store dimension {}",
                    vector.len(),
                    store.dimension
                )));
            }
        }

        let file_id = Uuid::new_v4();
        let ingested_at = Utc::now();
        let page_count = pages.len() as u32;

        let points = pages
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(idx, (text, vector))| {
                let payload = serde_json::to_value(PagePayload {
                    kind: KIND_PAGE.to_string(),
                    file_id,
                    store_id,
                    filename: filename.to_string(),
                    page_number: idx as u32 + 1,
                    source_text: text,
                    ingested_at,
                })?;

                Ok(PointRecord {
                    id: Uuid::new_v4(),
                    vector: Some(vector),
                    payload,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        if let Err(e) = self.repository.upsert(&collection, points, true).await {
            // Best-effort rollback of anything the failed batch wrote
            if let Err(cleanup) = self
                .repository
                .delete_by_filter(&collection, PointFilter::file_pages(file_id), true)
                .await
            {
                warn!(
                    "Cleanup after failed ingestion of file {} failed: {}",
                    file_id, cleanup
                );
            }
            return Err(e);
        }

        info!(
            "Ingested file {} as {} ({} pages) into store {}",
            filename, file_id, page_count, store_id
        );

        Ok(StoreFile {
            id: file_id,
            store_id,
            filename: filename.to_string(),
            status: FileStatus::Processed,
            page_count,
            created_at: ingested_at,
        })
    }

    /// Derive the file list by aggregating distinct file ids across the
    /// collection's page points. There is no separate file ledger.
    pub async fn list_files(&self, store_id: Uuid) -> StoreResult<Vec<StoreFile>> {
        let collection = collection_name(store_id);

        if !self.repository.collection_exists(&collection).await? {
            return Err(VectorStoreError::StoreNotFound(store_id));
        }

        let points = self
            .repository
            .scroll(&collection, Some(PointFilter::pages()), false)
            .await?;

        Ok(aggregate_files(store_id, points))
    }

    pub async fn get_file(&self, store_id: Uuid, file_id: Uuid) -> StoreResult<StoreFile> {
        let collection = collection_name(store_id);

        if !self.repository.collection_exists(&collection).await? {
            return Err(VectorStoreError::StoreNotFound(store_id));
        }

        let points = self
            .repository
            .scroll(&collection, Some(PointFilter::file_pages(file_id)), false)
            .await?;

        aggregate_files(store_id, points)
            .into_iter()
            .next()
            .ok_or(VectorStoreError::FileNotFound(file_id))
    }

    pub async fn delete_file(&self, store_id: Uuid, file_id: Uuid) -> StoreResult<()> {
        // NotFound check first; repeating the delete is an error, not a no-op
        self.get_file(store_id, file_id).await?;

        let collection = collection_name(store_id);
        self.repository
            .delete_by_filter(&collection, PointFilter::file_pages(file_id), true)
            .await?;

        info!("Deleted file {} from store {}", file_id, store_id);
        Ok(())
    }

    // ===== Query =====

    /// Embed the query text and run a k-NN search over the store's page
    /// points. Scores are normalized to higher-is-better regardless of
    /// the store's metric.
    pub async fn query(
        &self,
        store_id: Uuid,
        text: &str,
        top_k: u32,
    ) -> StoreResult<Vec<QueryResultItem>> {
        if text.trim().is_empty() {
            return Err(VectorStoreError::InvalidArgument(
                "query text must not be empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(VectorStoreError::InvalidArgument(
                "top_k must be positive".to_string(),
            ));
        }

        let store = self.get_store(store_id).await?;
        let collection = collection_name(store_id);

        let vector = self.embedder.embed_query(text).await?;

        let hits = self
            .repository
            .search(&collection, vector, top_k, Some(PointFilter::pages()))
            .await?;

        hits.into_iter()
            .map(|hit| {
                let payload: PagePayload =
                    serde_json::from_value(hit.payload).map_err(|e| {
                        VectorStoreError::Consistency(format!(
                            "point {} has malformed page payload: {}",
                            hit.id, e
                        ))
                    })?;

                // The index does not cross-validate payload tags; we do
                if payload.store_id != store_id {
                    return Err(VectorStoreError::Consistency(format!(
                        "point {} is tagged with store {} but lives in store {}",
                        hit.id, payload.store_id, store_id
                    )));
                }

                Ok(QueryResultItem {
                    id: hit.id,
                    score: store.distance_metric.normalized_score(hit.score),
                    payload: QueryResultPayload {
                        file_id: payload.file_id,
                        filename: payload.filename,
                        page_number: payload.page_number,
                        source_text: payload.source_text,
                    },
                })
            })
            .collect()
    }

    async fn store_meta(&self, collection: &str) -> StoreResult<Option<StoreMetaPayload>> {
        let points = self
            .repository
            .retrieve(collection, vec![Uuid::nil()], false)
            .await?;

        Ok(points
            .into_iter()
            .next()
            .and_then(|p| serde_json::from_value(p.payload).ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingProvider;
    use crate::models::{CollectionParams, ScoredPoint};
    use crate::repository::MockIndexRepository;
    use serde_json::json;

    const DIM: u32 = 4;

    fn service(
        repository: MockIndexRepository,
        embedder: MockEmbeddingProvider,
    ) -> VectorStoreService<MockIndexRepository> {
        VectorStoreService::new(repository, Arc::new(embedder))
    }

    fn embedder_with_dimension() -> MockEmbeddingProvider {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_dimension().return_const(DIM);
        embedder
    }

    fn meta_record(name: &str) -> PointRecord {
        PointRecord {
            id: Uuid::nil(),
            vector: None,
            payload: json!({
                "kind": "store",
                "name": name,
                "created_at": "2026-01-01T00:00:00Z",
            }),
        }
    }

    fn page_payload(store_id: Uuid, file_id: Uuid, filename: &str, page: u32) -> serde_json::Value {
        json!({
            "kind": "page",
            "file_id": file_id.to_string(),
            "store_id": store_id.to_string(),
            "filename": filename,
            "page_number": page,
            "source_text": format!("text of page {}", page),
            "ingested_at": "2026-01-02T00:00:00Z",
        })
    }

    /// Expectations for the get_store lookups most operations start with.
    fn expect_store(mock: &mut MockIndexRepository, metric: DistanceMetric) {
        mock.expect_collection_params().returning(move |_| {
            Ok(Some(CollectionParams {
                dimension: DIM,
                metric,
            }))
        });
        mock.expect_retrieve()
            .returning(|_, _, _| Ok(vec![meta_record("docs")]));
    }

    // ===== create_store =====

    #[tokio::test]
    async fn test_create_store_rejects_empty_name() {
        let mut repository = MockIndexRepository::new();
        repository.expect_create_collection().never();

        let service = service(repository, embedder_with_dimension());
        let result = service
            .create_store(CreateStore {
                name: "".to_string(),
                distance_metric: DistanceMetric::Cosine,
                dimension: None,
            })
            .await;

        assert!(matches!(result, Err(VectorStoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_create_store_rejects_zero_dimension() {
        let mut repository = MockIndexRepository::new();
        repository.expect_create_collection().never();

        let service = service(repository, embedder_with_dimension());
        let result = service
            .create_store(CreateStore {
                name: "docs".to_string(),
                distance_metric: DistanceMetric::Cosine,
                dimension: Some(0),
            })
            .await;

        assert!(matches!(result, Err(VectorStoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_create_store_creates_collection_and_metadata_point() {
        let mut repository = MockIndexRepository::new();
        repository
            .expect_create_collection()
            .withf(|name, metric, dimension| {
                name.starts_with("vs_")
                    && *metric == DistanceMetric::Euclidean
                    && *dimension == DIM
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        repository
            .expect_create_payload_index()
            .withf(|name, field| {
                name.starts_with("vs_") && (field == "kind" || field == "file_id")
            })
            .times(2)
            .returning(|_, _| Ok(()));
        repository
            .expect_upsert()
            .withf(|_, points, wait| {
                *wait && points.len() == 1
                    && points[0].id == Uuid::nil()
                    && points[0].payload["kind"] == "store"
                    && points[0].payload["name"] == "docs"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let service = service(repository, embedder_with_dimension());
        let store = service
            .create_store(CreateStore {
                name: "docs".to_string(),
                distance_metric: DistanceMetric::Euclidean,
                dimension: None,
            })
            .await
            .unwrap();

        assert_eq!(store.name, "docs");
        assert_eq!(store.distance_metric, DistanceMetric::Euclidean);
        assert_eq!(store.dimension, DIM);
    }

    #[tokio::test]
    async fn test_create_store_cleans_up_when_metadata_write_fails() {
        let mut repository = MockIndexRepository::new();
        repository
            .expect_create_collection()
            .times(1)
            .returning(|_, _, _| Ok(()));
        repository
            .expect_create_payload_index()
            .times(2)
            .returning(|_, _| Ok(()));
        repository
            .expect_upsert()
            .times(1)
            .returning(|_, _, _| Err(VectorStoreError::Upstream("connection lost".to_string())));
        repository
            .expect_delete_collection()
            .times(1)
            .returning(|_| Ok(true));

        let service = service(repository, embedder_with_dimension());
        let result = service
            .create_store(CreateStore {
                name: "docs".to_string(),
                distance_metric: DistanceMetric::Cosine,
                dimension: None,
            })
            .await;

        assert!(matches!(result, Err(VectorStoreError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_create_store_cleans_up_when_index_creation_fails() {
        let mut repository = MockIndexRepository::new();
        repository
            .expect_create_collection()
            .times(1)
            .returning(|_, _, _| Ok(()));
        repository
            .expect_create_payload_index()
            .times(1)
            .returning(|_, _| Err(VectorStoreError::Upstream("index failed".to_string())));
        repository.expect_upsert().never();
        repository
            .expect_delete_collection()
            .times(1)
            .returning(|_| Ok(true));

        let service = service(repository, embedder_with_dimension());
        let result = service
            .create_store(CreateStore {
                name: "docs".to_string(),
                distance_metric: DistanceMetric::Cosine,
                dimension: None,
            })
            .await;

        assert!(matches!(result, Err(VectorStoreError::Upstream(_))));
    }

    // ===== get/list/delete store =====

    #[tokio::test]
    async fn test_get_store_not_found() {
        let mut repository = MockIndexRepository::new();
        repository
            .expect_collection_params()
            .returning(|_| Ok(None));

        let service = service(repository, MockEmbeddingProvider::new());
        let store_id = Uuid::new_v4();
        let result = service.get_store(store_id).await;

        assert!(matches!(result, Err(VectorStoreError::StoreNotFound(id)) if id == store_id));
    }

    #[tokio::test]
    async fn test_get_store_reconstructs_metadata() {
        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Dot);

        let service = service(repository, MockEmbeddingProvider::new());
        let store = service.get_store(Uuid::new_v4()).await.unwrap();

        assert_eq!(store.name, "docs");
        assert_eq!(store.distance_metric, DistanceMetric::Dot);
        assert_eq!(store.dimension, DIM);
    }

    #[tokio::test]
    async fn test_list_stores_skips_foreign_collections() {
        let store_id = Uuid::new_v4();
        let mut repository = MockIndexRepository::new();
        repository.expect_list_collections().returning(move || {
            Ok(vec![
                "unrelated".to_string(),
                collection_name(store_id),
                "vs_not-a-uuid".to_string(),
            ])
        });
        expect_store(&mut repository, DistanceMetric::Cosine);

        let service = service(repository, MockEmbeddingProvider::new());
        let stores = service.list_stores().await.unwrap();

        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].id, store_id);
    }

    #[tokio::test]
    async fn test_delete_store_not_found() {
        let mut repository = MockIndexRepository::new();
        repository
            .expect_collection_exists()
            .returning(|_| Ok(false));
        repository.expect_delete_collection().never();

        let service = service(repository, MockEmbeddingProvider::new());
        let result = service.delete_store(Uuid::new_v4()).await;

        assert!(matches!(result, Err(VectorStoreError::StoreNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_store_drops_collection() {
        let store_id = Uuid::new_v4();
        let collection = collection_name(store_id);

        let mut repository = MockIndexRepository::new();
        repository
            .expect_collection_exists()
            .returning(|_| Ok(true));
        repository
            .expect_delete_collection()
            .withf(move |name| name == collection)
            .times(1)
            .returning(|_| Ok(true));

        let service = service(repository, MockEmbeddingProvider::new());
        service.delete_store(store_id).await.unwrap();
    }

    // ===== update_store =====

    #[tokio::test]
    async fn test_update_store_name_only_rewrites_metadata_point() {
        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Cosine);
        repository.expect_create_collection().never();
        repository
            .expect_upsert()
            .withf(|_, points, _| {
                points.len() == 1
                    && points[0].id == Uuid::nil()
                    && points[0].payload["name"] == "reports"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let service = service(repository, MockEmbeddingProvider::new());
        let store = service
            .update_store(
                Uuid::new_v4(),
                UpdateStore {
                    name: Some("reports".to_string()),
                    distance_metric: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(store.name, "reports");
        assert_eq!(store.distance_metric, DistanceMetric::Cosine);
    }

    #[tokio::test]
    async fn test_update_store_same_metric_is_metadata_only() {
        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Cosine);
        repository.expect_create_collection().never();
        repository.expect_upsert().never();

        let service = service(repository, MockEmbeddingProvider::new());
        let store = service
            .update_store(
                Uuid::new_v4(),
                UpdateStore {
                    name: None,
                    distance_metric: Some(DistanceMetric::Cosine),
                },
            )
            .await
            .unwrap();

        assert_eq!(store.name, "docs");
    }

    #[tokio::test]
    async fn test_update_store_metric_change_recreates_collection() {
        let store_id = Uuid::new_v4();
        let collection = collection_name(store_id);
        let staging = format!("{}__migrating", collection);

        let mut seq = mockall::Sequence::new();
        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Cosine);

        let file_id = Uuid::new_v4();
        let page = PointRecord {
            id: Uuid::new_v4(),
            vector: Some(vec![0.1; DIM as usize]),
            payload: page_payload(store_id, file_id, "a.pdf", 1),
        };
        let scrolled = vec![meta_record("docs"), page];

        repository
            .expect_scroll()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _, _| Ok(scrolled.clone()));
        {
            let staging = staging.clone();
            repository
                .expect_create_collection()
                .withf(move |name, metric, _| {
                    name == staging && *metric == DistanceMetric::Euclidean
                })
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _, _| Ok(()));
        }
        {
            let staging = staging.clone();
            repository
                .expect_upsert()
                .withf(move |name, points, _| name == staging && points.len() == 2)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _, _| Ok(()));
        }
        {
            let collection = collection.clone();
            repository
                .expect_delete_collection()
                .withf(move |name| name == collection)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(true));
        }
        {
            let collection = collection.clone();
            repository
                .expect_create_collection()
                .withf(move |name, metric, _| {
                    name == collection && *metric == DistanceMetric::Euclidean
                })
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _, _| Ok(()));
        }
        {
            let collection = collection.clone();
            repository
                .expect_create_payload_index()
                .withf(move |name, field| {
                    name == collection && (field == "kind" || field == "file_id")
                })
                .times(2)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(()));
        }
        {
            let collection = collection.clone();
            repository
                .expect_upsert()
                .withf(move |name, points, _| name == collection && points.len() == 2)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _, _| Ok(()));
        }
        {
            let staging = staging.clone();
            repository
                .expect_delete_collection()
                .withf(move |name| name == staging)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(true));
        }

        let service = service(repository, MockEmbeddingProvider::new());
        let store = service
            .update_store(
                store_id,
                UpdateStore {
                    name: None,
                    distance_metric: Some(DistanceMetric::Euclidean),
                },
            )
            .await
            .unwrap();

        assert_eq!(store.distance_metric, DistanceMetric::Euclidean);
    }

    #[tokio::test]
    async fn test_update_store_keeps_primary_when_staging_copy_fails() {
        let store_id = Uuid::new_v4();
        let collection = collection_name(store_id);
        let staging = format!("{}__migrating", collection);

        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Cosine);

        repository
            .expect_scroll()
            .returning(|_, _, _| Ok(vec![meta_record("docs")]));
        repository
            .expect_create_collection()
            .times(1)
            .returning(|_, _, _| Ok(()));
        repository.expect_create_payload_index().never();
        repository
            .expect_upsert()
            .times(1)
            .returning(|_, _, _| Err(VectorStoreError::Upstream("write failed".to_string())));
        // Only the staging collection may be dropped; the primary stays
        repository
            .expect_delete_collection()
            .withf(move |name| name == staging)
            .times(1)
            .returning(|_| Ok(true));

        let service = service(repository, MockEmbeddingProvider::new());
        let result = service
            .update_store(
                store_id,
                UpdateStore {
                    name: None,
                    distance_metric: Some(DistanceMetric::Euclidean),
                },
            )
            .await;

        assert!(matches!(result, Err(VectorStoreError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_update_store_drops_staging_when_primary_drop_fails() {
        let store_id = Uuid::new_v4();
        let collection = collection_name(store_id);
        let staging = format!("{}__migrating", collection);

        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Cosine);

        repository
            .expect_scroll()
            .returning(|_, _, _| Ok(vec![meta_record("docs")]));
        // Staging collection only; the primary is never recreated
        repository
            .expect_create_collection()
            .times(1)
            .returning(|_, _, _| Ok(()));
        repository
            .expect_upsert()
            .times(1)
            .returning(|_, _, _| Ok(()));
        repository
            .expect_delete_collection()
            .withf(move |name| name == collection)
            .times(1)
            .returning(|_| Err(VectorStoreError::Upstream("drop failed".to_string())));
        repository
            .expect_delete_collection()
            .withf(move |name| name == staging)
            .times(1)
            .returning(|_| Ok(true));

        let service = service(repository, MockEmbeddingProvider::new());
        let result = service
            .update_store(
                store_id,
                UpdateStore {
                    name: None,
                    distance_metric: Some(DistanceMetric::Euclidean),
                },
            )
            .await;

        assert!(matches!(result, Err(VectorStoreError::Upstream(_))));
    }

    // ===== ingest_file =====

    #[tokio::test]
    async fn test_ingest_file_writes_one_point_per_page() {
        let store_id = Uuid::new_v4();
        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Cosine);
        repository
            .expect_upsert()
            .withf(move |_, points, wait| {
                if !*wait || points.len() != 3 {
                    return false;
                }
                let first_file_id = &points[0].payload["file_id"];
                points.iter().enumerate().all(|(idx, p)| {
                    p.payload["kind"] == "page"
                        && p.payload["file_id"] == *first_file_id
                        && p.payload["store_id"] == json!(store_id.to_string())
                        && p.payload["page_number"] == json!(idx as u32 + 1)
                })
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_digitize().returning(|_, _| {
            Ok(vec![
                "page one".to_string(),
                "page two".to_string(),
                "page three".to_string(),
            ])
        });
        embedder
            .expect_embed_passages()
            .withf(|texts| texts.len() == 3)
            .returning(|texts| Ok(vec![vec![0.5; DIM as usize]; texts.len()]));

        let service = service(repository, embedder);
        let file = service
            .ingest_file(store_id, b"%PDF".to_vec(), "test.pdf")
            .await
            .unwrap();

        assert_eq!(file.store_id, store_id);
        assert_eq!(file.filename, "test.pdf");
        assert_eq!(file.page_count, 3);
        assert_eq!(file.status, FileStatus::Processed);
    }

    #[tokio::test]
    async fn test_ingest_file_store_not_found() {
        let mut repository = MockIndexRepository::new();
        repository
            .expect_collection_params()
            .returning(|_| Ok(None));
        repository.expect_upsert().never();

        let service = service(repository, MockEmbeddingProvider::new());
        let result = service
            .ingest_file(Uuid::new_v4(), b"%PDF".to_vec(), "test.pdf")
            .await;

        assert!(matches!(result, Err(VectorStoreError::StoreNotFound(_))));
    }

    #[tokio::test]
    async fn test_ingest_file_parse_failure_writes_nothing() {
        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Cosine);
        repository.expect_upsert().never();

        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_digitize()
            .returning(|_, _| Err(VectorStoreError::Parse("unsupported format".to_string())));

        let service = service(repository, embedder);
        let result = service
            .ingest_file(Uuid::new_v4(), b"garbage".to_vec(), "test.xyz")
            .await;

        assert!(matches!(result, Err(VectorStoreError::Parse(_))));
    }

    #[tokio::test]
    async fn test_ingest_file_embedding_failure_writes_nothing() {
        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Cosine);
        repository.expect_upsert().never();
        repository.expect_delete_by_filter().never();

        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_digitize()
            .returning(|_, _| Ok(vec!["page one".to_string(), "page two".to_string()]));
        embedder
            .expect_embed_passages()
            .returning(|_| Err(VectorStoreError::Embedding("provider down".to_string())));

        let service = service(repository, embedder);
        let result = service
            .ingest_file(Uuid::new_v4(), b"%PDF".to_vec(), "test.pdf")
            .await;

        assert!(matches!(result, Err(VectorStoreError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_ingest_file_rolls_back_on_upsert_failure() {
        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Cosine);
        repository
            .expect_upsert()
            .times(1)
            .returning(|_, _, _| Err(VectorStoreError::Upstream("batch failed".to_string())));
        repository
            .expect_delete_by_filter()
            .withf(|_, filter, _| {
                filter
                    .must
                    .iter()
                    .any(|(key, _)| key == "file_id")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_digitize()
            .returning(|_, _| Ok(vec!["page one".to_string()]));
        embedder
            .expect_embed_passages()
            .returning(|texts| Ok(vec![vec![0.5; DIM as usize]; texts.len()]));

        let service = service(repository, embedder);
        let result = service
            .ingest_file(Uuid::new_v4(), b"%PDF".to_vec(), "test.pdf")
            .await;

        assert!(matches!(result, Err(VectorStoreError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_ingest_file_rejects_dimension_mismatch() {
        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Cosine);
        repository.expect_upsert().never();

        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_digitize()
            .returning(|_, _| Ok(vec!["page one".to_string()]));
        embedder
            .expect_embed_passages()
            .returning(|texts| Ok(vec![vec![0.5; 8]; texts.len()]));

        let service = service(repository, embedder);
        let result = service
            .ingest_file(Uuid::new_v4(), b"%PDF".to_vec(), "test.pdf")
            .await;

        assert!(matches!(result, Err(VectorStoreError::InvalidArgument(_))));
    }

    // ===== list/get/delete file =====

    #[tokio::test]
    async fn test_list_files_aggregates_by_file_id() {
        let store_id = Uuid::new_v4();
        let file_a = Uuid::new_v4();
        let file_b = Uuid::new_v4();

        let mut repository = MockIndexRepository::new();
        repository
            .expect_collection_exists()
            .returning(|_| Ok(true));
        repository.expect_scroll().returning(move |_, _, _| {
            Ok(vec![
                PointRecord {
                    id: Uuid::new_v4(),
                    vector: None,
                    payload: page_payload(store_id, file_a, "a.pdf", 1),
                },
                PointRecord {
                    id: Uuid::new_v4(),
                    vector: None,
                    payload: page_payload(store_id, file_a, "a.pdf", 2),
                },
                PointRecord {
                    id: Uuid::new_v4(),
                    vector: None,
                    payload: page_payload(store_id, file_b, "b.pdf", 1),
                },
            ])
        });

        let service = service(repository, MockEmbeddingProvider::new());
        let files = service.list_files(store_id).await.unwrap();

        assert_eq!(files.len(), 2);
        let a = files.iter().find(|f| f.id == file_a).unwrap();
        assert_eq!(a.page_count, 2);
        assert_eq!(a.filename, "a.pdf");
        let b = files.iter().find(|f| f.id == file_b).unwrap();
        assert_eq!(b.page_count, 1);
    }

    #[tokio::test]
    async fn test_get_file_not_found() {
        let mut repository = MockIndexRepository::new();
        repository
            .expect_collection_exists()
            .returning(|_| Ok(true));
        repository.expect_scroll().returning(|_, _, _| Ok(vec![]));

        let service = service(repository, MockEmbeddingProvider::new());
        let file_id = Uuid::new_v4();
        let result = service.get_file(Uuid::new_v4(), file_id).await;

        assert!(matches!(result, Err(VectorStoreError::FileNotFound(id)) if id == file_id));
    }

    #[tokio::test]
    async fn test_delete_file_removes_points_by_filter() {
        let store_id = Uuid::new_v4();
        let file_id = Uuid::new_v4();

        let mut repository = MockIndexRepository::new();
        repository
            .expect_collection_exists()
            .returning(|_| Ok(true));
        repository.expect_scroll().returning(move |_, _, _| {
            Ok(vec![PointRecord {
                id: Uuid::new_v4(),
                vector: None,
                payload: page_payload(store_id, file_id, "a.pdf", 1),
            }])
        });
        repository
            .expect_delete_by_filter()
            .withf(move |_, filter, _| {
                filter
                    .must
                    .contains(&("file_id".to_string(), json!(file_id.to_string())))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let service = service(repository, MockEmbeddingProvider::new());
        service.delete_file(store_id, file_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_file_twice_yields_not_found() {
        let mut repository = MockIndexRepository::new();
        repository
            .expect_collection_exists()
            .returning(|_| Ok(true));
        // Second call: points already gone
        repository.expect_scroll().returning(|_, _, _| Ok(vec![]));
        repository.expect_delete_by_filter().never();

        let service = service(repository, MockEmbeddingProvider::new());
        let result = service.delete_file(Uuid::new_v4(), Uuid::new_v4()).await;

        assert!(matches!(result, Err(VectorStoreError::FileNotFound(_))));
    }

    // ===== query =====

    #[tokio::test]
    async fn test_query_rejects_blank_text_and_zero_top_k() {
        let service = service(MockIndexRepository::new(), MockEmbeddingProvider::new());

        let result = service.query(Uuid::new_v4(), "  ", 5).await;
        assert!(matches!(result, Err(VectorStoreError::InvalidArgument(_))));

        let result = service.query(Uuid::new_v4(), "hello", 0).await;
        assert!(matches!(result, Err(VectorStoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_query_returns_ranked_results() {
        let store_id = Uuid::new_v4();
        let file_id = Uuid::new_v4();

        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Cosine);
        repository
            .expect_search()
            .withf(|_, _, top_k, filter| {
                *top_k == 2 && filter.as_ref().is_some_and(|f| !f.must.is_empty())
            })
            .returning(move |_, _, _, _| {
                Ok(vec![
                    ScoredPoint {
                        id: Uuid::new_v4(),
                        score: 0.92,
                        payload: page_payload(store_id, file_id, "a.pdf", 2),
                    },
                    ScoredPoint {
                        id: Uuid::new_v4(),
                        score: 0.71,
                        payload: page_payload(store_id, file_id, "a.pdf", 1),
                    },
                ])
            });

        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed_query()
            .returning(|_| Ok(vec![0.5; DIM as usize]));

        let service = service(repository, embedder);
        let results = service
            .query(store_id, "some phrase from page 2", 2)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
        assert_eq!(results[0].payload.page_number, 2);
        assert_eq!(results[0].payload.file_id, file_id);
    }

    #[tokio::test]
    async fn test_query_negates_euclidean_scores() {
        let store_id = Uuid::new_v4();
        let file_id = Uuid::new_v4();

        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Euclidean);
        repository.expect_search().returning(move |_, _, _, _| {
            Ok(vec![
                ScoredPoint {
                    id: Uuid::new_v4(),
                    score: 0.3,
                    payload: page_payload(store_id, file_id, "a.pdf", 1),
                },
                ScoredPoint {
                    id: Uuid::new_v4(),
                    score: 1.8,
                    payload: page_payload(store_id, file_id, "a.pdf", 2),
                },
            ])
        });

        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed_query()
            .returning(|_| Ok(vec![0.5; DIM as usize]));

        let service = service(repository, embedder);
        let results = service.query(store_id, "hello", 5).await.unwrap();

        // Smaller distance becomes the larger normalized score
        assert_eq!(results[0].score, -0.3);
        assert_eq!(results[1].score, -1.8);
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_query_detects_store_id_mismatch() {
        let store_id = Uuid::new_v4();
        let other_store = Uuid::new_v4();
        let file_id = Uuid::new_v4();

        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Cosine);
        repository.expect_search().returning(move |_, _, _, _| {
            Ok(vec![ScoredPoint {
                id: Uuid::new_v4(),
                score: 0.9,
                payload: page_payload(other_store, file_id, "a.pdf", 1),
            }])
        });

        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed_query()
            .returning(|_| Ok(vec![0.5; DIM as usize]));

        let service = service(repository, embedder);
        let result = service.query(store_id, "hello", 5).await;

        assert!(matches!(result, Err(VectorStoreError::Consistency(_))));
    }

    #[tokio::test]
    async fn test_query_embedding_failure_propagates() {
        let mut repository = MockIndexRepository::new();
        expect_store(&mut repository, DistanceMetric::Cosine);
        repository.expect_search().never();

        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed_query()
            .returning(|_| Err(VectorStoreError::Embedding("provider down".to_string())));

        let service = service(repository, embedder);
        let result = service.query(Uuid::new_v4(), "hello", 5).await;

        assert!(matches!(result, Err(VectorStoreError::Embedding(_))));
    }
}
