//! REST handlers for store, file, and query operations

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{StoreResult, VectorStoreError};
use crate::models::{
    CreateStore, DistanceMetric, QueryResultItem, StoreFile, UpdateStore, VectorStore,
};
use crate::repository::IndexRepository;
use crate::service::VectorStoreService;

// ===== Request/Response DTOs =====

/// Request to create a vector store
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateStoreRequest {
    pub name: String,
    #[serde(default)]
    pub distance_metric: DistanceMetric,
    #[serde(default)]
    pub dimension: Option<u32>,
}

/// Request to update a vector store
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateStoreRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub distance_metric: Option<DistanceMetric>,
}

/// Request to query a vector store
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryRequest {
    pub text: String,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

fn default_top_k() -> u32 {
    10
}

/// Multipart form for file uploads
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadFileForm {
    /// The document to ingest
    #[schema(value_type = String, format = Binary)]
    pub file: String,
}

// ===== Store Management =====

/// Create a new vector store
#[utoipa::path(
    post,
    path = "/vector_stores",
    tag = "vector-stores",
    request_body = CreateStoreRequest,
    responses(
        (status = 201, description = "Store created", body = VectorStore),
        (status = 400, description = "Invalid request"),
        (status = 502, description = "Vector index unavailable")
    )
)]
pub async fn create_store<R: IndexRepository>(
    State(service): State<Arc<VectorStoreService<R>>>,
    Json(request): Json<CreateStoreRequest>,
) -> StoreResult<impl IntoResponse> {
    let store = service
        .create_store(CreateStore {
            name: request.name,
            distance_metric: request.distance_metric,
            dimension: request.dimension,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(store)))
}

/// List all vector stores
#[utoipa::path(
    get,
    path = "/vector_stores",
    tag = "vector-stores",
    responses(
        (status = 200, description = "List of stores", body = Vec<VectorStore>),
        (status = 502, description = "Vector index unavailable")
    )
)]
pub async fn list_stores<R: IndexRepository>(
    State(service): State<Arc<VectorStoreService<R>>>,
) -> StoreResult<Json<Vec<VectorStore>>> {
    let stores = service.list_stores().await?;
    Ok(Json(stores))
}

/// Get a vector store by id
#[utoipa::path(
    get,
    path = "/vector_stores/{store_id}",
    tag = "vector-stores",
    params(
        ("store_id" = Uuid, Path, description = "Store ID")
    ),
    responses(
        (status = 200, description = "Store details", body = VectorStore),
        (status = 404, description = "Store not found")
    )
)]
pub async fn get_store<R: IndexRepository>(
    State(service): State<Arc<VectorStoreService<R>>>,
    Path(store_id): Path<Uuid>,
) -> StoreResult<Json<VectorStore>> {
    let store = service.get_store(store_id).await?;
    Ok(Json(store))
}

/// Update a vector store's name or distance metric
#[utoipa::path(
    patch,
    path = "/vector_stores/{store_id}",
    tag = "vector-stores",
    params(
        ("store_id" = Uuid, Path, description = "Store ID")
    ),
    request_body = UpdateStoreRequest,
    responses(
        (status = 200, description = "Updated store", body = VectorStore),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Store not found")
    )
)]
pub async fn update_store<R: IndexRepository>(
    State(service): State<Arc<VectorStoreService<R>>>,
    Path(store_id): Path<Uuid>,
    Json(request): Json<UpdateStoreRequest>,
) -> StoreResult<Json<VectorStore>> {
    let store = service
        .update_store(
            store_id,
            UpdateStore {
                name: request.name,
                distance_metric: request.distance_metric,
            },
        )
        .await?;

    Ok(Json(store))
}

/// Delete a vector store and everything in it
#[utoipa::path(
    delete,
    path = "/vector_stores/{store_id}",
    tag = "vector-stores",
    params(
        ("store_id" = Uuid, Path, description = "Store ID")
    ),
    responses(
        (status = 204, description = "Store deleted"),
        (status = 404, description = "Store not found")
    )
)]
pub async fn delete_store<R: IndexRepository>(
    State(service): State<Arc<VectorStoreService<R>>>,
    Path(store_id): Path<Uuid>,
) -> StoreResult<impl IntoResponse> {
    service.delete_store(store_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== File Ingestion =====

/// Upload and ingest a document into a store
#[utoipa::path(
    post,
    path = "/vector_stores/{store_id}/files",
    tag = "vector-stores",
    params(
        ("store_id" = Uuid, Path, description = "Store ID")
    ),
    request_body(content = UploadFileForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File ingested", body = StoreFile),
        (status = 400, description = "Missing or empty file field"),
        (status = 404, description = "Store not found"),
        (status = 422, description = "Document could not be parsed"),
        (status = 502, description = "Upstream provider failed")
    )
)]
pub async fn upload_file<R: IndexRepository>(
    State(service): State<Arc<VectorStoreService<R>>>,
    Path(store_id): Path<Uuid>,
    mut multipart: Multipart,
) -> StoreResult<impl IntoResponse> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| VectorStoreError::InvalidArgument(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field.bytes().await.map_err(|e| {
                VectorStoreError::InvalidArgument(format!("failed to read file field: {}", e))
            })?;
            upload = Some((filename, bytes.to_vec()));
        }
    }

    let (filename, bytes) = upload.ok_or_else(|| {
        VectorStoreError::InvalidArgument("multipart field 'file' is required".to_string())
    })?;

    if bytes.is_empty() {
        return Err(VectorStoreError::InvalidArgument(
            "uploaded file is empty".to_string(),
        ));
    }

    let file = service.ingest_file(store_id, bytes, &filename).await?;
    Ok((StatusCode::CREATED, Json(file)))
}

/// List files in a store
#[utoipa::path(
    get,
    path = "/vector_stores/{store_id}/files",
    tag = "vector-stores",
    params(
        ("store_id" = Uuid, Path, description = "Store ID")
    ),
    responses(
        (status = 200, description = "Files in the store", body = Vec<StoreFile>),
        (status = 404, description = "Store not found")
    )
)]
pub async fn list_files<R: IndexRepository>(
    State(service): State<Arc<VectorStoreService<R>>>,
    Path(store_id): Path<Uuid>,
) -> StoreResult<Json<Vec<StoreFile>>> {
    let files = service.list_files(store_id).await?;
    Ok(Json(files))
}

/// Get one file's metadata
#[utoipa::path(
    get,
    path = "/vector_stores/{store_id}/files/{file_id}",
    tag = "vector-stores",
    params(
        ("store_id" = Uuid, Path, description = "Store ID"),
        ("file_id" = Uuid, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File metadata", body = StoreFile),
        (status = 404, description = "Store or file not found")
    )
)]
pub async fn get_file<R: IndexRepository>(
    State(service): State<Arc<VectorStoreService<R>>>,
    Path((store_id, file_id)): Path<(Uuid, Uuid)>,
) -> StoreResult<Json<StoreFile>> {
    let file = service.get_file(store_id, file_id).await?;
    Ok(Json(file))
}

/// Delete a file and all its embedded pages
#[utoipa::path(
    delete,
    path = "/vector_stores/{store_id}/files/{file_id}",
    tag = "vector-stores",
    params(
        ("store_id" = Uuid, Path, description = "Store ID"),
        ("file_id" = Uuid, Path, description = "File ID")
    ),
    responses(
        (status = 204, description = "File deleted"),
        (status = 404, description = "Store or file not found")
    )
)]
pub async fn delete_file<R: IndexRepository>(
    State(service): State<Arc<VectorStoreService<R>>>,
    Path((store_id, file_id)): Path<(Uuid, Uuid)>,
) -> StoreResult<impl IntoResponse> {
    service.delete_file(store_id, file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== Query =====

/// Semantic search over a store's pages
#[utoipa::path(
    post,
    path = "/vector_stores/{store_id}/query",
    tag = "vector-stores",
    params(
        ("store_id" = Uuid, Path, description = "Store ID")
    ),
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Ranked results", body = Vec<QueryResultItem>),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Store not found"),
        (status = 502, description = "Embedding provider failed")
    )
)]
pub async fn query_store<R: IndexRepository>(
    State(service): State<Arc<VectorStoreService<R>>>,
    Path(store_id): Path<Uuid>,
    Json(request): Json<QueryRequest>,
) -> StoreResult<Json<Vec<QueryResultItem>>> {
    let results = service
        .query(store_id, &request.text, request.top_k)
        .await?;
    Ok(Json(results))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_defaults_top_k() {
        let request: QueryRequest = serde_json::from_str(r#"{"text": "hello"}"#).unwrap();
        assert_eq!(request.top_k, 10);
    }

    #[test]
    fn test_create_store_request_defaults() {
        let request: CreateStoreRequest = serde_json::from_str(r#"{"name": "docs"}"#).unwrap();
        assert_eq!(request.distance_metric, DistanceMetric::Cosine);
        assert_eq!(request.dimension, None);
    }
}
