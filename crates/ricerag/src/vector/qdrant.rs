//! Qdrant adapter: collection lifecycle, bulk upsert, semantic and text
//! search.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use qdrant_client::{
    qdrant::{
        self, value::Kind, Condition, CreateCollection, CreateFieldIndexCollection,
        DeleteCollection, Distance, FieldType, Filter, GetCollectionInfoRequest, HnswConfigDiff,
        PointId, PointStruct, QuantizationConfig, QuantizationType, ScalarQuantization,
        ScrollPoints, SearchParams, SearchPoints, UpsertPoints, Value, VectorParams,
    },
    Payload, Qdrant,
};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use ricerag_core::{
    Chunk, ChunkId, ChunkMetadata, EmbeddedChunk, ProviderKind, RetrievalError, TrustLevel,
};

use crate::retry::{with_retry, RetryPolicy};
use crate::telemetry::RetrievalTelemetry;

use super::backend::{BatchFailure, IngestReport, SearchHit, VectorBackend};
use super::scoring::text_match_score;

/// Namespace for deriving Qdrant point UUIDs from chunk ids. The derivation
/// is what makes re-indexing idempotent: the same chunk id always lands on
/// the same point.
const POINT_NAMESPACE: Uuid = Uuid::from_bytes([
    0x52, 0x69, 0x63, 0x65, 0x52, 0x61, 0x67, 0x00, 0x9e, 0x4b, 0x11, 0xd2, 0x5c, 0x8f, 0x33,
    0x7a,
]);

/// Text search scrolls more points than requested so client-side scoring has
/// headroom to reorder, capped to bound the payload volume.
const TEXT_SCAN_FACTOR: usize = 4;
const TEXT_SCAN_CAP: usize = 256;

#[derive(Clone, Debug, Deserialize)]
pub struct QdrantConfig {
    pub uri: String,
    pub collection_name: String,
    pub dimension: u64,
    /// HNSW graph connectivity.
    #[serde(default = "default_m")]
    pub m: u64,
    /// HNSW construction depth.
    #[serde(default = "default_ef_construct")]
    pub ef_construct: u64,
    /// HNSW search depth.
    #[serde(default = "default_ef_search")]
    pub ef_search: u64,
    /// Store vectors int8-quantized to cut memory.
    #[serde(default = "default_scalar_quantization")]
    pub scalar_quantization: bool,
    /// Concurrent upsert batches per ingestion call.
    #[serde(default = "default_upsert_concurrency")]
    pub upsert_concurrency: usize,
}

fn default_m() -> u64 {
    32
}

fn default_ef_construct() -> u64 {
    256
}

fn default_ef_search() -> u64 {
    256
}

fn default_scalar_quantization() -> bool {
    true
}

fn default_upsert_concurrency() -> usize {
    4
}

pub struct QdrantIndex {
    client: Qdrant,
    config: QdrantConfig,
    retry: RetryPolicy,
    telemetry: Option<Arc<RetrievalTelemetry>>,
}

impl QdrantIndex {
    pub fn connect(config: QdrantConfig) -> Result<Self, RetrievalError> {
        let client = Qdrant::from_url(&config.uri)
            .build()
            .map_err(|err| backend_unavailable("connect", err))?;
        Ok(Self {
            client,
            config,
            retry: RetryPolicy::default(),
            telemetry: None,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<RetrievalTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    async fn ensure_collection(&self) -> Result<(), RetrievalError> {
        let name = &self.config.collection_name;
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|err| backend_unavailable("collection_exists", err))?;
        if exists {
            match self.collection_dimension().await? {
                Some(dimension) if dimension == self.config.dimension => {
                    debug!(collection = %name, dimension, "collection already configured");
                    return Ok(());
                }
                existing => {
                    warn!(
                        collection = %name,
                        existing = ?existing,
                        expected = self.config.dimension,
                        "recreating collection with a different vector dimension; prior contents are dropped"
                    );
                    self.client
                        .delete_collection(DeleteCollection {
                            collection_name: name.clone(),
                            ..Default::default()
                        })
                        .await
                        .map_err(|err| backend_unavailable("delete_collection", err))?;
                }
            }
        }
        self.create_collection().await?;
        self.create_content_index().await
    }

    async fn collection_dimension(&self) -> Result<Option<u64>, RetrievalError> {
        let info = self
            .client
            .collection_info(GetCollectionInfoRequest {
                collection_name: self.config.collection_name.clone(),
                ..Default::default()
            })
            .await
            .map_err(|err| backend_unavailable("collection_info", err))?;
        Ok(info
            .result
            .and_then(|collection| collection.config)
            .and_then(|config| config.params)
            .and_then(|params| params.vectors_config)
            .and_then(|vectors| vectors.config)
            .and_then(|config| match config {
                qdrant::vectors_config::Config::Params(params) => Some(params.size),
                qdrant::vectors_config::Config::ParamsMap(_) => None,
            }))
    }

    async fn create_collection(&self) -> Result<(), RetrievalError> {
        let quantization = self.config.scalar_quantization.then(|| QuantizationConfig {
            quantization: Some(qdrant::quantization_config::Quantization::Scalar(
                ScalarQuantization {
                    r#type: QuantizationType::Int8 as i32,
                    quantile: Some(0.95),
                    always_ram: Some(false),
                },
            )),
        });
        let start = Instant::now();
        self.client
            .create_collection(CreateCollection {
                collection_name: self.config.collection_name.clone(),
                vectors_config: Some(qdrant::VectorsConfig {
                    config: Some(qdrant::vectors_config::Config::Params(VectorParams {
                        size: self.config.dimension,
                        distance: Distance::Cosine as i32,
                        ..Default::default()
                    })),
                }),
                hnsw_config: Some(HnswConfigDiff {
                    m: Some(self.config.m),
                    ef_construct: Some(self.config.ef_construct),
                    ..Default::default()
                }),
                quantization_config: quantization,
                ..Default::default()
            })
            .await
            .map_err(|err| backend_unavailable("create_collection", err))?;
        self.record_backend(start);
        debug!(collection = %self.config.collection_name, "created collection");
        Ok(())
    }

    /// Full-text payload index over the content field, backing `search_text`.
    async fn create_content_index(&self) -> Result<(), RetrievalError> {
        self.client
            .create_field_index(CreateFieldIndexCollection {
                collection_name: self.config.collection_name.clone(),
                field_name: CONTENT_KEY.to_string(),
                field_type: Some(FieldType::Text as i32),
                wait: Some(true),
                ..Default::default()
            })
            .await
            .map_err(|err| backend_unavailable("create_field_index", err))?;
        Ok(())
    }

    async fn upsert_batch(&self, batch: &[EmbeddedChunk]) -> Result<(), RetrievalError> {
        with_retry(&self.retry, "upsert", retry_backend, || async {
            let points: Vec<PointStruct> = batch.iter().map(point_from_chunk).collect();
            let start = Instant::now();
            self.client
                .upsert_points(UpsertPoints {
                    collection_name: self.config.collection_name.clone(),
                    wait: Some(true),
                    points,
                    ..Default::default()
                })
                .await
                .map_err(|err| backend_unavailable("upsert", err))?;
            self.record_backend(start);
            Ok(())
        })
        .await
    }

    fn record_backend(&self, start: Instant) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.record_backend(start.elapsed());
        }
    }
}

fn retry_backend(_err: &RetrievalError) -> bool {
    true
}

fn backend_unavailable(stage: &'static str, err: impl std::fmt::Display) -> RetrievalError {
    RetrievalError::ProviderUnavailable {
        provider: ProviderKind::VectorBackend,
        reason: format!("{stage}: {err}"),
    }
}

#[async_trait]
impl VectorBackend for QdrantIndex {
    fn dimension(&self) -> usize {
        self.config.dimension as usize
    }

    async fn configure_collection(&self) -> Result<(), RetrievalError> {
        self.ensure_collection().await
    }

    async fn upsert(
        &self,
        chunks: Vec<EmbeddedChunk>,
        batch_size: usize,
    ) -> Result<IngestReport, RetrievalError> {
        if chunks.is_empty() {
            return Ok(IngestReport::default());
        }
        let batch_size = batch_size.max(1);
        let batches: Vec<(usize, Vec<EmbeddedChunk>)> = chunks
            .chunks(batch_size)
            .map(<[EmbeddedChunk]>::to_vec)
            .enumerate()
            .collect();
        let mut report = IngestReport::default();
        let stream = stream::iter(batches.into_iter().map(|(index, batch)| async move {
            let count = batch.len();
            let outcome = self.upsert_batch(&batch).await;
            (index, count, outcome)
        }))
        .buffer_unordered(self.config.upsert_concurrency.max(1));
        tokio::pin!(stream);
        while let Some((index, count, outcome)) = stream.next().await {
            match outcome {
                Ok(()) => report.written += count,
                Err(err) => {
                    warn!(batch = index, reason = %err, "upsert batch failed; continuing with remaining batches");
                    report.failures.push(BatchFailure {
                        stage: "upsert".to_string(),
                        batch_index: index,
                        chunks: count,
                        reason: err.to_string(),
                    });
                }
            }
        }
        report.failures.sort_by_key(|failure| failure.batch_index);
        Ok(report)
    }

    async fn search_semantic(
        &self,
        query_vector: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let response = with_retry(&self.retry, "search_semantic", retry_backend, || async {
            let start = Instant::now();
            let response = self
                .client
                .search_points(SearchPoints {
                    collection_name: self.config.collection_name.clone(),
                    vector: query_vector.to_vec(),
                    limit: limit as u64,
                    score_threshold: Some(threshold),
                    params: Some(SearchParams {
                        hnsw_ef: Some(self.config.ef_search),
                        ..Default::default()
                    }),
                    with_payload: Some(enable_payload()),
                    with_vectors: Some(enable_vectors()),
                    ..Default::default()
                })
                .await
                .map_err(|err| backend_unavailable("search_semantic", err))?;
            self.record_backend(start);
            Ok(response)
        })
        .await?;

        let mut hits = Vec::with_capacity(response.result.len());
        for point in response.result {
            let Some(chunk) = chunk_from_payload(&point.payload) else {
                warn!("skipping semantic hit without chunk payload");
                continue;
            };
            hits.push(SearchHit {
                chunk,
                score: point.score,
                vector: point_vector(point.vectors),
            });
        }
        Ok(hits)
    }

    async fn search_text(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        // TODO: page through next_page_offset when the scan cap truncates
        // the match set on large collections.
        let scan_limit = limit.saturating_mul(TEXT_SCAN_FACTOR).min(TEXT_SCAN_CAP);
        let response = with_retry(&self.retry, "search_text", retry_backend, || async {
            let start = Instant::now();
            let response = self
                .client
                .scroll(ScrollPoints {
                    collection_name: self.config.collection_name.clone(),
                    filter: Some(Filter {
                        must: vec![Condition::matches_text(CONTENT_KEY, query)],
                        ..Default::default()
                    }),
                    limit: Some(scan_limit as u32),
                    with_payload: Some(enable_payload()),
                    with_vectors: Some(enable_vectors()),
                    ..Default::default()
                })
                .await
                .map_err(|err| backend_unavailable("search_text", err))?;
            self.record_backend(start);
            Ok(response)
        })
        .await?;

        let mut hits: Vec<SearchHit> = response
            .result
            .into_iter()
            .filter_map(|point| {
                let chunk = chunk_from_payload(&point.payload)?;
                let score = text_match_score(&chunk.content, query);
                if score > 0.0 {
                    let vector = point_vector(point.vectors);
                    Some(SearchHit {
                        chunk,
                        score,
                        vector,
                    })
                } else {
                    None
                }
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

const CONTENT_KEY: &str = "content";
const CHUNK_ID_KEY: &str = "chunk_id";
const SOURCE_KEY: &str = "source";
const TRUST_KEY: &str = "trust";
const KIND_KEY: &str = "kind";
const QUALITY_KEY: &str = "quality";
const EXTRA_PREFIX: &str = "meta_";

pub(crate) fn point_uuid(id: &ChunkId) -> Uuid {
    Uuid::new_v5(&POINT_NAMESPACE, id.as_str().as_bytes())
}

fn point_from_chunk(embedded: &EmbeddedChunk) -> PointStruct {
    let id = PointId {
        point_id_options: Some(qdrant::point_id::PointIdOptions::Uuid(
            point_uuid(&embedded.chunk.id).to_string(),
        )),
    };
    PointStruct::new(id, embedded.vector.clone(), chunk_payload(&embedded.chunk))
}

fn string_value(text: impl Into<String>) -> Value {
    Value {
        kind: Some(Kind::StringValue(text.into())),
    }
}

fn chunk_payload(chunk: &Chunk) -> Payload {
    chunk_payload_map(chunk).into()
}

fn chunk_payload_map(chunk: &Chunk) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    map.insert(CHUNK_ID_KEY.to_string(), string_value(chunk.id.as_str()));
    map.insert(CONTENT_KEY.to_string(), string_value(&chunk.content));
    map.insert(SOURCE_KEY.to_string(), string_value(&chunk.metadata.source));
    map.insert(
        TRUST_KEY.to_string(),
        string_value(chunk.metadata.trust.to_string()),
    );
    map.insert(KIND_KEY.to_string(), string_value(&chunk.metadata.kind));
    map.insert(
        QUALITY_KEY.to_string(),
        Value {
            kind: Some(Kind::DoubleValue(f64::from(chunk.metadata.quality))),
        },
    );
    for (key, value) in &chunk.metadata.extra {
        map.insert(format!("{EXTRA_PREFIX}{key}"), string_value(value));
    }
    map
}

fn chunk_from_payload(payload: &HashMap<String, Value>) -> Option<Chunk> {
    let id = payload_to_string(payload.get(CHUNK_ID_KEY))?;
    let content = payload_to_string(payload.get(CONTENT_KEY)).unwrap_or_default();
    let source = payload_to_string(payload.get(SOURCE_KEY)).unwrap_or_default();
    let trust = payload_to_string(payload.get(TRUST_KEY))
        .and_then(|value| TrustLevel::parse(&value))
        .unwrap_or_default();
    let kind = payload_to_string(payload.get(KIND_KEY)).unwrap_or_else(|| "text".to_string());
    let quality = payload_to_f64(payload.get(QUALITY_KEY)).unwrap_or(1.0) as f32;
    let mut extra = BTreeMap::new();
    for (key, value) in payload {
        if let Some(stripped) = key.strip_prefix(EXTRA_PREFIX) {
            if let Some(text) = payload_to_string(Some(value)) {
                extra.insert(stripped.to_string(), text);
            }
        }
    }
    Some(Chunk {
        id: ChunkId::new(id),
        content,
        metadata: ChunkMetadata {
            source,
            trust,
            kind,
            quality,
            extra,
        },
    })
}

fn payload_to_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|value| value.kind.as_ref())
        .and_then(|kind| match kind {
            Kind::StringValue(text) => Some(text.clone()),
            _ => None,
        })
}

fn payload_to_f64(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(|value| value.kind.as_ref())
        .and_then(|kind| match kind {
            Kind::DoubleValue(val) => Some(*val),
            Kind::IntegerValue(val) => Some(*val as f64),
            _ => None,
        })
}

fn enable_payload() -> qdrant::WithPayloadSelector {
    qdrant::WithPayloadSelector {
        selector_options: Some(qdrant::with_payload_selector::SelectorOptions::Enable(true)),
    }
}

fn enable_vectors() -> qdrant::WithVectorsSelector {
    qdrant::WithVectorsSelector {
        selector_options: Some(qdrant::with_vectors_selector::SelectorOptions::Enable(true)),
    }
}

fn point_vector(vectors: Option<qdrant::VectorsOutput>) -> Option<Vec<f32>> {
    vectors
        .and_then(|output| output.vectors_options)
        .and_then(|options| match options {
            qdrant::vectors_output::VectorsOptions::Vector(vector) => Some(vector.data),
            qdrant::vectors_output::VectorsOptions::Vectors(_) => None,
        })
}
