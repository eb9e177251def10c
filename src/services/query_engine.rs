//! Query engine
//!
//! The retrieval-and-generation pipeline behind `/query`: similarity
//! search, grounding-context assembly, generation, confidence scoring,
//! and response shaping.

use std::sync::Arc;
use std::time::Instant;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    confidence_from_distance, QueryRequest, QueryResponse, QueryType, RetrievedChunk,
    SourceAttribution,
};
use crate::services::Generator;
use crate::vector_db::DocumentStore;

/// Number of chunks retrieved per query
pub const TOP_K: usize = 3;

/// Returned verbatim when retrieval comes back empty
pub const NO_RESULTS_MESSAGE: &str = "No relevant protocols found in the database.";

const SYSTEM_PROMPT: &str = "\
You are a medical AI assistant providing clinical decision support \
for emergency medical services and trauma care. You have access to Joint Trauma System \
clinical practice guidelines. Provide clear, evidence-based guidance while emphasizing \
that this is educational information and not a replacement for clinical judgment.

CRITICAL: Always include appropriate medical disclaimers and emphasize consulting \
qualified healthcare professionals for actual patient care.";

/// Query engine over injected store and generator handles
pub struct QueryEngine {
    store: Arc<dyn DocumentStore>,
    generator: Arc<dyn Generator>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn DocumentStore>, generator: Arc<dyn Generator>) -> Self {
        Self { store, generator }
    }

    /// Run the full pipeline for one query.
    ///
    /// Empty retrieval short-circuits to a deterministic no-results
    /// response without invoking the generator. `processing_time_ms`
    /// covers the generation call only.
    pub async fn process(&self, request: &QueryRequest) -> ApiResult<QueryResponse> {
        if request.query.trim().is_empty() {
            return Err(ApiError::InvalidRequest("query must not be empty".to_string()));
        }

        let retrieved = self.store.query(&request.query, TOP_K).await?;

        if retrieved.is_empty() {
            return Ok(QueryResponse {
                response_text: NO_RESULTS_MESSAGE.to_string(),
                sources: Vec::new(),
                query_type: QueryType::NoResults,
                processing_time_ms: 0,
            });
        }

        let context = build_context(&retrieved);
        let user_prompt = build_user_prompt(&request.query, &context);

        let start = Instant::now();
        let response_text = self.generator.generate(SYSTEM_PROMPT, &user_prompt).await?;
        let processing_time_ms = start.elapsed().as_millis() as u64;

        let sources = retrieved
            .iter()
            .enumerate()
            .map(|(i, chunk)| SourceAttribution {
                title: if chunk.metadata.source.is_empty() {
                    format!("Protocol {}", i + 1)
                } else {
                    chunk.metadata.source.clone()
                },
                page: chunk.metadata.page,
                confidence: confidence_from_distance(chunk.distance),
            })
            .collect();

        Ok(QueryResponse {
            response_text,
            sources,
            query_type: QueryType::ChromadbBacked,
            processing_time_ms,
        })
    }
}

/// Concatenate retrieved chunks into the grounding context, in store order
fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("Protocol excerpt:\n{}", chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn build_user_prompt(query: &str, context: &str) -> String {
    format!(
        "Based on the following medical protocols, answer this query:\n\n\
         Query: {}\n\n\
         Available Protocols:\n{}\n\n\
         Provide a clear, structured response with:\n\
         1. Direct answer to the query\n\
         2. Key protocol points\n\
         3. Important considerations or contraindications\n\
         4. Source references when applicable\n\n\
         Remember: This is educational information only.",
        query, context
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn retrieved(text: &str, source: &str, distance: f32) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                chunk_index: 0,
                chunk_count: 1,
                content_hash: String::new(),
                page: None,
            },
            distance,
        }
    }

    struct FakeStore {
        results: Vec<RetrievedChunk>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeStore {
        fn with_results(results: Vec<RetrievedChunk>) -> Self {
            Self { results, fail: false, calls: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Self { results: Vec::new(), fail: true, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl DocumentStore for FakeStore {
        async fn add_chunks(&self, chunks: &[crate::models::Chunk]) -> ApiResult<usize> {
            Ok(chunks.len())
        }

        async fn query(&self, _text: &str, top_k: usize) -> ApiResult<Vec<RetrievedChunk>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApiError::Store("collection offline".to_string()));
            }
            Ok(self.results.iter().take(top_k).cloned().collect())
        }

        async fn count(&self) -> ApiResult<usize> {
            Ok(self.results.len())
        }

        async fn delete_source(&self, _source: &str) -> ApiResult<()> {
            Ok(())
        }
    }

    struct FakeGenerator {
        reply: String,
        calls: AtomicUsize,
    }

    impl FakeGenerator {
        fn new(reply: &str) -> Self {
            Self { reply: reply.to_string(), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Generator for FakeGenerator {
        async fn generate(&self, _system: &str, _user: &str) -> ApiResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn request(query: &str) -> QueryRequest {
        QueryRequest {
            query: query.to_string(),
            device_id: "test-device".to_string(),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn test_empty_retrieval_short_circuits() {
        let store = Arc::new(FakeStore::with_results(Vec::new()));
        let generator = Arc::new(FakeGenerator::new("should never appear"));
        let engine = QueryEngine::new(store, generator.clone());

        let response = engine.process(&request("burn fluid resuscitation")).await.unwrap();

        assert_eq!(response.query_type, QueryType::NoResults);
        assert_eq!(response.response_text, NO_RESULTS_MESSAGE);
        assert!(response.sources.is_empty());
        assert_eq!(response.processing_time_ms, 0);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sources_follow_retrieval_order_with_mapped_confidence() {
        let store = Arc::new(FakeStore::with_results(vec![
            retrieved("Decompress the affected side.", "tension_pneumothorax_cpg", 0.1),
            retrieved("Reassess breath sounds.", "airway_cpg", 0.4),
            retrieved("Transport priorities.", "evacuation_cpg", 0.9),
        ]));
        let generator = Arc::new(FakeGenerator::new("Needle decompression is indicated."));
        let engine = QueryEngine::new(store, generator);

        let response = engine
            .process(&request("What is the treatment for tension pneumothorax?"))
            .await
            .unwrap();

        assert_eq!(response.query_type, QueryType::ChromadbBacked);
        assert!(!response.response_text.is_empty());
        assert_eq!(response.sources.len(), 3);
        assert_eq!(response.sources[0].title, "tension_pneumothorax_cpg");
        assert!(response.sources[0].confidence > 0.0);
        assert_eq!(response.sources[0].confidence, 0.9);
        assert_eq!(response.sources[1].confidence, 0.6);
        assert_eq!(response.sources[2].confidence, 0.1);
        assert!(response
            .sources
            .windows(2)
            .all(|pair| pair[0].confidence >= pair[1].confidence));
    }

    #[tokio::test]
    async fn test_at_most_top_k_sources() {
        let store = Arc::new(FakeStore::with_results(vec![
            retrieved("a", "s1", 0.1),
            retrieved("b", "s2", 0.2),
            retrieved("c", "s3", 0.3),
            retrieved("d", "s4", 0.4),
            retrieved("e", "s5", 0.5),
        ]));
        let generator = Arc::new(FakeGenerator::new("answer"));
        let engine = QueryEngine::new(store, generator);

        let response = engine.process(&request("hemorrhage control")).await.unwrap();

        assert!(response.sources.len() <= TOP_K);
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_retrieval() {
        let store = Arc::new(FakeStore::with_results(Vec::new()));
        let generator = Arc::new(FakeGenerator::new("unused"));
        let engine = QueryEngine::new(store.clone(), generator.clone());

        for query in ["", "   ", "\t\n"] {
            let err = engine.process(&request(query)).await.unwrap_err();
            assert!(matches!(err, ApiError::InvalidRequest(_)));
        }

        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(FakeStore::failing());
        let generator = Arc::new(FakeGenerator::new("unused"));
        let engine = QueryEngine::new(store, generator.clone());

        let err = engine.process(&request("TBI management")).await.unwrap_err();

        assert!(matches!(err, ApiError::Store(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_source_title_falls_back_to_position() {
        let store = Arc::new(FakeStore::with_results(vec![retrieved("text", "", 0.2)]));
        let generator = Arc::new(FakeGenerator::new("answer"));
        let engine = QueryEngine::new(store, generator);

        let response = engine.process(&request("whole blood transfusion")).await.unwrap();

        assert_eq!(response.sources[0].title, "Protocol 1");
    }

    #[test]
    fn test_context_labels_each_excerpt_in_order() {
        let chunks = vec![
            retrieved("First excerpt.", "a", 0.1),
            retrieved("Second excerpt.", "b", 0.2),
        ];

        let context = build_context(&chunks);

        assert_eq!(
            context,
            "Protocol excerpt:\nFirst excerpt.\n\nProtocol excerpt:\nSecond excerpt."
        );
    }

    #[test]
    fn test_user_prompt_embeds_query_and_context() {
        let prompt = build_user_prompt("What about TXA?", "Protocol excerpt:\nGive TXA early.");

        assert!(prompt.contains("Query: What about TXA?"));
        assert!(prompt.contains("Give TXA early."));
        assert!(prompt.contains("contraindications"));
    }
}
