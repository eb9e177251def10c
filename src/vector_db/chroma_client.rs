//! Chroma client for vector operations
//!
//! Provides chunk storage and similarity search against a Chroma server
//! over its HTTP API. Query texts are embedded through the embeddings
//! service before hitting the collection.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::models::{Chunk, ChunkMetadata, RetrievedChunk};
use crate::services::EmbeddingClient;
use crate::vector_db::DocumentStore;

/// Chroma HTTP client bound to one collection
pub struct ChromaClient {
    client: Client,
    endpoint: String,
    collection_id: String,
    embedder: EmbeddingClient,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    metadata: serde_json::Value,
    get_or_create: bool,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Debug, Serialize)]
struct UpsertRequest {
    ids: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    metadatas: Vec<ChunkMetadata>,
    documents: Vec<String>,
}

#[derive(Debug, Serialize)]
struct QueryRequestBody {
    query_embeddings: Vec<Vec<f32>>,
    n_results: usize,
    include: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponseBody {
    documents: Option<Vec<Vec<String>>>,
    metadatas: Option<Vec<Vec<ChunkMetadata>>>,
    distances: Option<Vec<Vec<f32>>>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest {
    r#where: serde_json::Value,
}

impl ChromaClient {
    /// Connect to the Chroma server and get-or-create the collection.
    ///
    /// The collection is created with cosine space so distances land in
    /// [0, 2] and the confidence mapping's clamp is meaningful.
    pub async fn connect(
        endpoint: &str,
        collection: &str,
        embedder: EmbeddingClient,
    ) -> ApiResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ApiError::Store(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = endpoint.trim_end_matches('/').to_string();

        // Verify the server is up before touching the collection
        let heartbeat_url = format!("{}/api/v1/heartbeat", endpoint);
        let response = client
            .get(&heartbeat_url)
            .send()
            .await
            .map_err(|e| ApiError::Store(format!("Heartbeat failed: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Store(format!("Heartbeat failed: {} - {}", status, body)));
        }

        let create_url = format!("{}/api/v1/collections", endpoint);
        let request = CreateCollectionRequest {
            name: collection,
            metadata: serde_json::json!({
                "hnsw:space": "cosine",
                "description": "Joint Trauma System Clinical Practice Guidelines",
            }),
            get_or_create: true,
        };

        let response = client
            .post(&create_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Store(format!("Collection setup failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Store(format!(
                "Collection setup failed: {} - {}",
                status, body
            )));
        }

        let info: CollectionInfo = response
            .json()
            .await
            .map_err(|e| ApiError::Store(format!("Failed to parse collection info: {}", e)))?;

        tracing::info!("✅ Chroma collection '{}' accessible", collection);

        Ok(Self {
            client,
            endpoint,
            collection_id: info.id,
            embedder,
        })
    }

    fn collection_url(&self, operation: &str) -> String {
        format!(
            "{}/api/v1/collections/{}/{}",
            self.endpoint, self.collection_id, operation
        )
    }
}

#[async_trait]
impl DocumentStore for ChromaClient {
    async fn add_chunks(&self, chunks: &[Chunk]) -> ApiResult<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let request = UpsertRequest {
            ids: chunks.iter().map(|c| c.id()).collect(),
            embeddings,
            metadatas: chunks.iter().map(|c| c.metadata()).collect(),
            documents: texts,
        };
        let count = request.ids.len();

        let response = self.client
            .post(self.collection_url("upsert"))
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Store(format!("Upsert failed: {}", e)))?;

        if response.status().is_success() {
            Ok(count)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Store(format!("Upsert failed: {}", body)))
        }
    }

    async fn query(&self, text: &str, top_k: usize) -> ApiResult<Vec<RetrievedChunk>> {
        let query_embedding = self.embedder.embed(text).await?;

        let request = QueryRequestBody {
            query_embeddings: vec![query_embedding],
            n_results: top_k,
            include: vec!["documents", "metadatas", "distances"],
        };

        let response = self.client
            .post(self.collection_url("query"))
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Store(format!("Query failed: {}", e)))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Store(format!("Query failed: {}", body)));
        }

        let body: QueryResponseBody = response
            .json()
            .await
            .map_err(|e| ApiError::Store(format!("Failed to parse response: {}", e)))?;

        // Chroma nests results per query embedding; we always send one
        let documents = body.documents.and_then(|d| d.into_iter().next()).unwrap_or_default();
        let metadatas = body.metadatas.and_then(|m| m.into_iter().next()).unwrap_or_default();
        let distances = body.distances.and_then(|d| d.into_iter().next()).unwrap_or_default();

        let results = documents
            .into_iter()
            .zip(metadatas)
            .zip(distances)
            .map(|((text, metadata), distance)| RetrievedChunk {
                text,
                metadata,
                distance,
            })
            .collect();

        Ok(results)
    }

    async fn count(&self) -> ApiResult<usize> {
        let response = self.client
            .get(self.collection_url("count"))
            .send()
            .await
            .map_err(|e| ApiError::Store(format!("Count failed: {}", e)))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Store(format!("Count failed: {}", body)));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Store(format!("Failed to parse count: {}", e)))
    }

    async fn delete_source(&self, source: &str) -> ApiResult<()> {
        let request = DeleteRequest {
            r#where: serde_json::json!({ "source": source }),
        };

        let response = self.client
            .post(self.collection_url("delete"))
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Store(format!("Delete failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Store(format!("Delete failed: {}", body)))
        }
    }
}
