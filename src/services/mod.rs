//! Application services.
//!
//! Logic shared by several handlers: review scheduling, question ingestion,
//! library imports, document parsing, vocabulary exports and dictionary lookups.

pub mod dictionary;
pub mod document;
pub mod export;
pub mod ingest;
pub mod library;
pub mod review;
