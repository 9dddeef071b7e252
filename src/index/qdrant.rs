//! Qdrant-backed vector index.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use tracing::debug;

use super::error::IndexError;
use super::model::{sort_hits, Hit, KbRecord, RecordMeta};
use super::VectorIndex;
use crate::hashing::point_id;

/// Payload keys under which the record travels through Qdrant.
const PAYLOAD_RECORD_ID: &str = "record_id";
const PAYLOAD_TEXT: &str = "text";
const PAYLOAD_META: &str = "meta_json";

#[derive(Clone)]
pub struct QdrantIndex {
    client: Qdrant,
    url: String,
}

impl QdrantIndex {
    pub async fn connect(url: &str) -> Result<Self, IndexError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| IndexError::ConnectionFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn health_check(&self) -> Result<(), IndexError> {
        self.client
            .health_check()
            .await
            .map(|_| ())
            .map_err(|e| IndexError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })
    }

    fn to_point(collection: &str, record: KbRecord) -> Result<PointStruct, IndexError> {
        let meta_json =
            serde_json::to_string(&record.meta).map_err(|e| IndexError::UpsertFailed {
                collection: collection.to_string(),
                message: format!("metadata serialization: {e}"),
            })?;

        let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
        payload.insert(PAYLOAD_RECORD_ID.to_string(), record.record_id.clone().into());
        payload.insert(PAYLOAD_TEXT.to_string(), record.text.into());
        payload.insert(PAYLOAD_META.to_string(), meta_json.into());

        Ok(PointStruct::new(
            point_id(&record.record_id),
            record.vector,
            payload,
        ))
    }

    fn hit_from_point(point: qdrant_client::qdrant::ScoredPoint) -> Option<Hit> {
        let payload = point.payload;

        let record_id = payload
            .get(PAYLOAD_RECORD_ID)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())?;

        let text = payload
            .get(PAYLOAD_TEXT)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let meta: RecordMeta = payload
            .get(PAYLOAD_META)
            .and_then(|v| v.as_str())
            .and_then(|s| serde_json::from_str(s).ok())?;

        Some(Hit {
            record_id,
            similarity: point.score,
            text,
            meta,
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self, name: &str, dim: usize) -> Result<(), IndexError> {
        let exists = self.client.collection_exists(name).await.map_err(|e| {
            IndexError::CreateCollectionFailed {
                collection: name.to_string(),
                message: e.to_string(),
            }
        })?;

        if exists {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dim as u64, Distance::Cosine))
                    .on_disk_payload(true),
            )
            .await
            .map_err(|e| IndexError::CreateCollectionFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;

        debug!(collection = name, dim, "created vector collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: Vec<KbRecord>) -> Result<(), IndexError> {
        if records.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|record| Self::to_point(collection, record))
            .collect::<Result<_, _>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| IndexError::UpsertFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
        min_similarity: Option<f32>,
    ) -> Result<Vec<Hit>, IndexError> {
        let mut builder =
            SearchPointsBuilder::new(collection, query.to_vec(), k as u64).with_payload(true);
        if let Some(floor) = min_similarity {
            builder = builder.score_threshold(floor);
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| IndexError::SearchFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        let mut hits: Vec<Hit> = response
            .result
            .into_iter()
            .filter_map(Self::hit_from_point)
            .collect();
        sort_hits(&mut hits);
        hits.truncate(k);

        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<u64, IndexError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(|e| IndexError::CountFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }
}
