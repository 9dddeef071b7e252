//! In-memory vector index with in-process cosine scoring.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::error::IndexError;
use super::model::{sort_hits, Hit, KbRecord};
use super::VectorIndex;

#[derive(Default)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, MemCollection>>,
}

#[derive(Default)]
struct MemCollection {
    dim: usize,
    records: HashMap<String, KbRecord>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_collection(&self, name: &str, dim: usize) -> Result<(), IndexError> {
        let mut collections =
            self.collections
                .write()
                .map_err(|_| IndexError::CreateCollectionFailed {
                    collection: name.to_string(),
                    message: "lock poisoned".to_string(),
                })?;

        collections.entry(name.to_string()).or_insert(MemCollection {
            dim,
            records: HashMap::new(),
        });

        Ok(())
    }

    async fn upsert(&self, collection: &str, records: Vec<KbRecord>) -> Result<(), IndexError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| IndexError::UpsertFailed {
                collection: collection.to_string(),
                message: "lock poisoned".to_string(),
            })?;

        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| IndexError::CollectionNotFound {
                collection: collection.to_string(),
            })?;

        for record in records {
            if record.vector.len() != coll.dim {
                return Err(IndexError::DimensionMismatch {
                    collection: collection.to_string(),
                    expected: coll.dim,
                    actual: record.vector.len(),
                });
            }
            coll.records.insert(record.record_id.clone(), record);
        }

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
        min_similarity: Option<f32>,
    ) -> Result<Vec<Hit>, IndexError> {
        let collections = self
            .collections
            .read()
            .map_err(|_| IndexError::SearchFailed {
                collection: collection.to_string(),
                message: "lock poisoned".to_string(),
            })?;

        let coll = collections
            .get(collection)
            .ok_or_else(|| IndexError::CollectionNotFound {
                collection: collection.to_string(),
            })?;

        let floor = min_similarity.unwrap_or(f32::MIN);
        let mut hits: Vec<Hit> = coll
            .records
            .values()
            .map(|r| Hit {
                record_id: r.record_id.clone(),
                similarity: cosine_similarity(query, &r.vector),
                text: r.text.clone(),
                meta: r.meta.clone(),
            })
            .filter(|h| h.similarity >= floor)
            .collect();

        sort_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<u64, IndexError> {
        let collections = self.collections.read().map_err(|_| IndexError::CountFailed {
            collection: collection.to_string(),
            message: "lock poisoned".to_string(),
        })?;

        Ok(collections
            .get(collection)
            .map(|c| c.records.len() as u64)
            .unwrap_or(0))
    }
}
