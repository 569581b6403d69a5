//! Answering-service contract and wire types.

use crate::sessions::Citation;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A query against the document corpus.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
}

/// A validated answer plus its supporting citations.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Citation>,
}

/// Ways a response body can fail shape validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseShapeError {
    #[error("invalid response format: expected object")]
    NotAnObject,
    #[error("invalid response format: missing required fields")]
    MissingFields,
    #[error("invalid response format: sources must be an array")]
    SourcesNotArray,
    #[error("no answer received")]
    EmptyAnswer,
}

impl QueryResponse {
    /// Validate a raw response body and map it into a typed response.
    ///
    /// Checks shape before typed conversion: the body must be an object
    /// carrying both `answer` and `sources`, `sources` must be an array, and
    /// `answer` must be a non-empty scalar (numbers and booleans are
    /// stringified). Missing `text`/`metadata` fields on a source default to
    /// empty rather than failing the whole response.
    pub fn from_value(value: &Value) -> Result<Self, ResponseShapeError> {
        let body = value.as_object().ok_or(ResponseShapeError::NotAnObject)?;

        let answer = body.get("answer").ok_or(ResponseShapeError::MissingFields)?;
        let sources = body.get("sources").ok_or(ResponseShapeError::MissingFields)?;
        let sources = sources
            .as_array()
            .ok_or(ResponseShapeError::SourcesNotArray)?;

        // Scalar answers are stringified; null and structured values are
        // rejected as missing.
        let answer = match answer {
            Value::String(text) => text.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        };
        if answer.trim().is_empty() {
            return Err(ResponseShapeError::EmptyAnswer);
        }

        let sources = sources
            .iter()
            .map(|source| Citation {
                text: source
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                metadata: source
                    .get("metadata")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
                relevance: source.get("relevance").and_then(Value::as_f64),
            })
            .collect();

        Ok(Self { answer, sources })
    }
}

/// The remote answering service.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Submit a query and return the validated answer with citations.
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse>;

    /// The name of this backend implementation.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_response_maps_answer_and_sources() {
        let body = json!({
            "answer": "Paris",
            "sources": [
                {"text": "Paris is the capital", "metadata": {"filename": "geo.pdf"}, "relevance": 0.92},
            ],
        });
        let response = QueryResponse::from_value(&body).unwrap();
        assert_eq!(response.answer, "Paris");
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].filename(), Some("geo.pdf"));
        assert_eq!(response.sources[0].relevance, Some(0.92));
    }

    #[test]
    fn empty_sources_is_valid() {
        let body = json!({"answer": "Paris", "sources": []});
        let response = QueryResponse::from_value(&body).unwrap();
        assert!(response.sources.is_empty());
    }

    #[test]
    fn missing_answer_is_rejected() {
        let body = json!({"sources": []});
        assert_eq!(
            QueryResponse::from_value(&body),
            Err(ResponseShapeError::MissingFields)
        );
    }

    #[test]
    fn missing_sources_is_rejected() {
        let body = json!({"answer": "Paris"});
        assert_eq!(
            QueryResponse::from_value(&body),
            Err(ResponseShapeError::MissingFields)
        );
    }

    #[test]
    fn non_array_sources_is_rejected() {
        let body = json!({"answer": "Paris", "sources": {"text": "x"}});
        assert_eq!(
            QueryResponse::from_value(&body),
            Err(ResponseShapeError::SourcesNotArray)
        );
    }

    #[test]
    fn scalar_answers_are_stringified() {
        let body = json!({"answer": 42, "sources": []});
        assert_eq!(QueryResponse::from_value(&body).unwrap().answer, "42");

        let body = json!({"answer": true, "sources": []});
        assert_eq!(QueryResponse::from_value(&body).unwrap().answer, "true");

        let body = json!({"answer": null, "sources": []});
        assert_eq!(
            QueryResponse::from_value(&body),
            Err(ResponseShapeError::EmptyAnswer)
        );
    }

    #[test]
    fn blank_answer_is_rejected() {
        let body = json!({"answer": "   ", "sources": []});
        assert_eq!(
            QueryResponse::from_value(&body),
            Err(ResponseShapeError::EmptyAnswer)
        );
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert_eq!(
            QueryResponse::from_value(&json!("just a string")),
            Err(ResponseShapeError::NotAnObject)
        );
    }

    #[test]
    fn sources_with_missing_fields_default_to_empty() {
        let body = json!({"answer": "Paris", "sources": [{}]});
        let response = QueryResponse::from_value(&body).unwrap();
        assert_eq!(response.sources[0].text, "");
        assert!(response.sources[0].metadata.is_empty());
        assert!(response.sources[0].relevance.is_none());
    }

    #[test]
    fn request_omits_absent_index() {
        let request = QueryRequest {
            query: "q".to_string(),
            index_name: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("index_name"));

        let request = QueryRequest {
            query: "q".to_string(),
            index_name: Some("handbook".to_string()),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"index_name\":\"handbook\""));
    }
}
