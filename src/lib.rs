pub mod config;
pub mod document;
pub mod record;
pub mod redact;
pub mod store;

pub mod local;
pub mod noop_store;
pub mod opensearch;
pub mod parser;

pub mod api;
pub mod query;
pub mod writer;
