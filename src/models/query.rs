//! Query request and response models

use serde::{Deserialize, Serialize};

use super::ChunkMetadata;

/// Incoming clinical query from a client shell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Tag distinguishing whether retrieval found anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryType {
    #[serde(rename = "chromadb-backed")]
    ChromadbBacked,
    #[serde(rename = "no_results")]
    NoResults,
}

/// One source attribution shown to the clinician
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceAttribution {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub confidence: f32,
}

/// Structured answer returned to clients, never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response_text: String,
    pub sources: Vec<SourceAttribution>,
    pub query_type: QueryType,
    /// Wall-clock latency of the generation call only
    pub processing_time_ms: u64,
}

/// A chunk returned by similarity search, with its dissimilarity score
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Non-negative; smaller = more similar
    pub distance: f32,
}

/// Map a store distance to a user-facing confidence score.
///
/// The collection is created with cosine space, so distances fall in
/// [0, 2]; `1 - distance` clamped to [0, 1] and rounded to two decimals.
/// A heuristic surfaced per source, not a calibrated probability.
pub fn confidence_from_distance(distance: f32) -> f32 {
    let confidence = (1.0 - distance).clamp(0.0, 1.0);
    (confidence * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance_is_full_confidence() {
        assert_eq!(confidence_from_distance(0.0), 1.0);
    }

    #[test]
    fn test_distance_at_or_beyond_one_clamps_to_zero() {
        assert_eq!(confidence_from_distance(1.0), 0.0);
        assert_eq!(confidence_from_distance(1.7), 0.0);
        assert_eq!(confidence_from_distance(2.0), 0.0);
    }

    #[test]
    fn test_confidence_rounds_to_two_decimals() {
        assert_eq!(confidence_from_distance(0.123), 0.88);
        assert_eq!(confidence_from_distance(0.5), 0.5);
    }

    #[test]
    fn test_confidence_stays_in_unit_interval() {
        for i in 0..=40 {
            let d = i as f32 * 0.05;
            let c = confidence_from_distance(d);
            assert!((0.0..=1.0).contains(&c), "confidence {} out of range for distance {}", c, d);
        }
    }

    #[test]
    fn test_query_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&QueryType::ChromadbBacked).unwrap(),
            "\"chromadb-backed\""
        );
        assert_eq!(
            serde_json::to_string(&QueryType::NoResults).unwrap(),
            "\"no_results\""
        );
    }

    #[test]
    fn test_source_without_page_omits_field() {
        let source = SourceAttribution {
            title: "Airway Management CPG".to_string(),
            page: None,
            confidence: 0.82,
        };
        let json = serde_json::to_value(&source).unwrap();
        assert!(json.get("page").is_none());
    }
}
