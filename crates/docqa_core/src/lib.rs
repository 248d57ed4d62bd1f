pub mod chunking;
pub mod config;
pub mod conversation;
pub mod domain;
pub mod error;
pub mod ingest;
