mod stores;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::repository::IndexRepository;
use crate::service::VectorStoreService;

pub use stores::{CreateStoreRequest, QueryRequest, UpdateStoreRequest, UploadFileForm};

/// OpenAPI documentation for the vector stores API
#[derive(OpenApi)]
#[openapi(
    paths(
        stores::create_store,
        stores::list_stores,
        stores::get_store,
        stores::update_store,
        stores::delete_store,
        stores::upload_file,
        stores::list_files,
        stores::get_file,
        stores::delete_file,
        stores::query_store,
    ),
    components(
        schemas(
            CreateStoreRequest, UpdateStoreRequest, QueryRequest, UploadFileForm,
            crate::models::VectorStore, crate::models::StoreFile,
            crate::models::QueryResultItem, crate::models::QueryResultPayload,
            crate::models::DistanceMetric, crate::models::FileStatus
        )
    ),
    tags(
        (name = "vector-stores", description = "Vector store management, file ingestion, and semantic search")
    )
)]
pub struct VectorStoresApiDoc;

/// Create the router exposing all store, file, and query endpoints
pub fn router<R: IndexRepository + 'static>(service: VectorStoreService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route(
            "/vector_stores",
            post(stores::create_store).get(stores::list_stores),
        )
        .route(
            "/vector_stores/{store_id}",
            get(stores::get_store)
                .patch(stores::update_store)
                .delete(stores::delete_store),
        )
        .route(
            "/vector_stores/{store_id}/files",
            post(stores::upload_file).get(stores::list_files),
        )
        .route(
            "/vector_stores/{store_id}/files/{file_id}",
            get(stores::get_file).delete(stores::delete_file),
        )
        .route("/vector_stores/{store_id}/query", post(stores::query_store))
        .with_state(shared_service)
}
