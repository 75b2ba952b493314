use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    self, Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, GetPointsBuilder, PointId, PointStruct,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use uuid::Uuid;

use super::QdrantConfig;
use crate::error::{StoreResult, VectorStoreError};
use crate::models::{
    CollectionParams, DistanceMetric, PointFilter, PointRecord, ScoredPoint,
};
use crate::repository::IndexRepository;

const SCROLL_PAGE_SIZE: u32 = 256;

/// Qdrant-backed implementation of IndexRepository
pub struct QdrantRepository {
    client: Qdrant,
}

impl QdrantRepository {
    pub async fn new(config: QdrantConfig) -> StoreResult<Self> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(api_key) = config.api_key {
            builder = builder.api_key(api_key);
        }

        builder = builder.timeout(Duration::from_secs(config.timeout_secs));

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::Upstream(format!("Failed to build client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn to_qdrant_distance(metric: DistanceMetric) -> Distance {
        match metric {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::Dot => Distance::Dot,
            DistanceMetric::Euclidean => Distance::Euclid,
        }
    }

    fn from_qdrant_distance(distance: Distance) -> DistanceMetric {
        match distance {
            Distance::Cosine => DistanceMetric::Cosine,
            Distance::Dot => DistanceMetric::Dot,
            Distance::Euclid => DistanceMetric::Euclidean,
            _ => DistanceMetric::Cosine,
        }
    }

    fn uuid_to_point_id(id: Uuid) -> PointId {
        PointId::from(id.to_string())
    }

    fn point_id_to_uuid(point_id: &PointId) -> StoreResult<Uuid> {
        match &point_id.point_id_options {
            Some(qdrant::point_id::PointIdOptions::Uuid(uuid_str)) => Uuid::parse_str(uuid_str)
                .map_err(|e| VectorStoreError::Internal(format!("Invalid UUID: {}", e))),
            Some(qdrant::point_id::PointIdOptions::Num(num)) => Ok(Uuid::from_u128(*num as u128)),
            None => Err(VectorStoreError::Internal("Missing point ID".to_string())),
        }
    }

    fn to_qdrant_filter(filter: PointFilter) -> Filter {
        let conditions: Vec<Condition> = filter
            .must
            .into_iter()
            .filter_map(|(key, value)| match value {
                serde_json::Value::String(s) => Some(Condition::matches(key, s)),
                serde_json::Value::Bool(b) => Some(Condition::matches(key, b)),
                serde_json::Value::Number(n) => n.as_i64().map(|i| Condition::matches(key, i)),
                _ => None,
            })
            .collect();

        Filter::must(conditions)
    }

    fn payload_to_qdrant(payload: serde_json::Value) -> HashMap<String, QdrantValue> {
        let mut result = HashMap::new();

        if let serde_json::Value::Object(map) = payload {
            for (key, val) in map {
                if let Some(qdrant_val) = json_to_qdrant_value(val) {
                    result.insert(key, qdrant_val);
                }
            }
        }

        result
    }

    fn qdrant_to_payload(payload: HashMap<String, QdrantValue>) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (key, val) in payload {
            if let Some(json_val) = qdrant_value_to_json(val) {
                map.insert(key, json_val);
            }
        }

        serde_json::Value::Object(map)
    }

    fn to_point_struct(record: PointRecord) -> StoreResult<PointStruct> {
        let vector = record.vector.ok_or_else(|| {
            VectorStoreError::Internal(format!("Point {} has no vector to upsert", record.id))
        })?;

        Ok(PointStruct::new(
            Self::uuid_to_point_id(record.id),
            vector,
            Self::payload_to_qdrant(record.payload),
        ))
    }

    /// Extract vector values from VectorsOutput
    /// Note: Uses deprecated data field for now until migration to 1.18+
    #[allow(deprecated)]
    fn extract_vector_from_output(vectors: &Option<qdrant::VectorsOutput>) -> Option<Vec<f32>> {
        match vectors {
            Some(qdrant::VectorsOutput {
                vectors_options: Some(opts),
            }) => match opts {
                qdrant::vectors_output::VectorsOptions::Vector(v) => Some(v.data.clone()),
                qdrant::vectors_output::VectorsOptions::Vectors(map) => {
                    map.vectors.values().next().map(|v| v.data.clone())
                }
            },
            _ => None,
        }
    }

    fn retrieved_to_record(point: qdrant::RetrievedPoint) -> StoreResult<PointRecord> {
        let id = point
            .id
            .as_ref()
            .map(Self::point_id_to_uuid)
            .transpose()?
            .ok_or_else(|| VectorStoreError::Internal("Missing point ID".to_string()))?;

        let vector = Self::extract_vector_from_output(&point.vectors);

        Ok(PointRecord {
            id,
            vector,
            payload: Self::qdrant_to_payload(point.payload),
        })
    }
}

fn json_to_qdrant_value(val: serde_json::Value) -> Option<QdrantValue> {
    match val {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(QdrantValue::from(b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(QdrantValue::from(i))
            } else {
                n.as_f64().map(QdrantValue::from)
            }
        }
        serde_json::Value::String(s) => Some(QdrantValue::from(s)),
        // Complex types are serialized to string; payloads here are flat
        _ => Some(QdrantValue::from(val.to_string())),
    }
}

fn qdrant_value_to_json(val: QdrantValue) -> Option<serde_json::Value> {
    use qdrant::value::Kind;

    match val.kind {
        Some(Kind::NullValue(_)) => Some(serde_json::Value::Null),
        Some(Kind::BoolValue(b)) => Some(serde_json::Value::Bool(b)),
        Some(Kind::IntegerValue(i)) => Some(serde_json::Value::Number(i.into())),
        Some(Kind::DoubleValue(f)) => {
            serde_json::Number::from_f64(f).map(serde_json::Value::Number)
        }
        Some(Kind::StringValue(s)) => Some(serde_json::Value::String(s)),
        _ => None,
    }
}

#[async_trait]
impl IndexRepository for QdrantRepository {
    async fn create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
        dimension: u32,
    ) -> StoreResult<()> {
        let builder = CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
            dimension as u64,
            Self::to_qdrant_distance(metric),
        ));

        self.client.create_collection(builder).await?;
        Ok(())
    }

    async fn create_payload_index(&self, name: &str, field: &str) -> StoreResult<()> {
        let builder = CreateFieldIndexCollectionBuilder::new(name, field, FieldType::Keyword);

        self.client.create_field_index(builder).await?;
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> StoreResult<bool> {
        let response = self.client.delete_collection(name).await?;
        Ok(response.result)
    }

    async fn collection_exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.client.collection_exists(name).await?)
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        let response = self.client.list_collections().await?;
        Ok(response
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    async fn collection_params(&self, name: &str) -> StoreResult<Option<CollectionParams>> {
        let info = match self.client.collection_info(name).await {
            Ok(info) => info,
            Err(_) => return Ok(None),
        };

        let result = info.result.ok_or_else(|| {
            VectorStoreError::Internal("Collection info missing result".to_string())
        })?;

        let params = result
            .config
            .as_ref()
            .and_then(|c| c.params.as_ref())
            .and_then(|p| p.vectors_config.as_ref())
            .and_then(|vc| vc.config.as_ref())
            .and_then(|config| match config {
                qdrant::vectors_config::Config::Params(p) => Some(CollectionParams {
                    dimension: p.size as u32,
                    metric: Self::from_qdrant_distance(p.distance()),
                }),
                qdrant::vectors_config::Config::ParamsMap(map) => {
                    map.map.values().next().map(|p| CollectionParams {
                        dimension: p.size as u32,
                        metric: Self::from_qdrant_distance(p.distance()),
                    })
                }
            });

        Ok(params)
    }

    async fn upsert(&self, name: &str, points: Vec<PointRecord>, wait: bool) -> StoreResult<()> {
        let points: Vec<PointStruct> = points
            .into_iter()
            .map(Self::to_point_struct)
            .collect::<StoreResult<_>>()?;

        let mut builder = UpsertPointsBuilder::new(name, points);
        if wait {
            builder = builder.wait(true);
        }

        self.client.upsert_points(builder).await?;
        Ok(())
    }

    async fn retrieve(
        &self,
        name: &str,
        ids: Vec<Uuid>,
        with_vectors: bool,
    ) -> StoreResult<Vec<PointRecord>> {
        let point_ids: Vec<PointId> = ids.into_iter().map(Self::uuid_to_point_id).collect();

        let builder = GetPointsBuilder::new(name, point_ids)
            .with_vectors(with_vectors)
            .with_payload(true);

        let results = self.client.get_points(builder).await?;

        results
            .result
            .into_iter()
            .map(Self::retrieved_to_record)
            .collect()
    }

    async fn scroll(
        &self,
        name: &str,
        filter: Option<PointFilter>,
        with_vectors: bool,
    ) -> StoreResult<Vec<PointRecord>> {
        let qdrant_filter = filter.map(Self::to_qdrant_filter);
        let mut records = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut builder = ScrollPointsBuilder::new(name)
                .limit(SCROLL_PAGE_SIZE)
                .with_payload(true)
                .with_vectors(with_vectors);

            if let Some(f) = qdrant_filter.clone() {
                builder = builder.filter(f);
            }
            if let Some(o) = offset.take() {
                builder = builder.offset(o);
            }

            let response = self.client.scroll(builder).await?;

            for point in response.result {
                records.push(Self::retrieved_to_record(point)?);
            }

            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(records)
    }

    async fn delete_by_filter(
        &self,
        name: &str,
        filter: PointFilter,
        wait: bool,
    ) -> StoreResult<()> {
        let mut builder =
            DeletePointsBuilder::new(name).points(Self::to_qdrant_filter(filter));

        if wait {
            builder = builder.wait(true);
        }

        self.client.delete_points(builder).await?;
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        vector: Vec<f32>,
        top_k: u32,
        filter: Option<PointFilter>,
    ) -> StoreResult<Vec<ScoredPoint>> {
        let mut builder =
            SearchPointsBuilder::new(name, vector, top_k as u64).with_payload(true);

        if let Some(f) = filter {
            builder = builder.filter(Self::to_qdrant_filter(f));
        }

        let results = self.client.search_points(builder).await?;

        results
            .result
            .into_iter()
            .map(|point| {
                let id = point
                    .id
                    .as_ref()
                    .map(Self::point_id_to_uuid)
                    .transpose()?
                    .ok_or_else(|| {
                        VectorStoreError::Internal("Missing point ID".to_string())
                    })?;

                Ok(ScoredPoint {
                    id,
                    score: point.score,
                    payload: Self::qdrant_to_payload(point.payload),
                })
            })
            .collect()
    }
}
