//! Protocol Assist - retrieval-augmented clinical decision support
//!
//! An HTTP API composing similarity search over a Chroma vector store
//! with a hosted language-model call, plus the offline ingestion pipeline
//! that feeds the store and a configurable client shell.

pub mod config;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod services;
pub mod vector_db;
