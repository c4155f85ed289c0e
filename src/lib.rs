//! indovest-kg - knowledge-graph dataset builder for Indonesian investment news
//!
//! Three stages, each driven from the CLI:
//! 1. Scrape news portals (CNBC Indonesia, Kompas) into a `;`-delimited CSV.
//! 2. Clean the scraped text (dates, title echoes, pasted duplicates).
//! 3. Extract (subject, relation, object) triples with an LLM through a
//!    checkpointed, retryable batch pipeline into an append-only JSONL stream.

pub mod cli;
pub mod dataset;
pub mod extraction;
pub mod graph;
pub mod pipeline;
pub mod scrape;

// Re-exports
pub use dataset::{NewsCsv, NewsItem};
pub use extraction::{
    EntityExtractor, ExtractError, ExtractionValue, OpenAiExtractor, get_api_key, has_api_key,
};
pub use graph::{EntityRelation, OutputRecord, ENTITY_TYPES, RELATION_TYPES};
pub use pipeline::{
    Article, ArticleSource, BatchRunner, CheckpointStore, CsvArticleSource, JsonlSink, RunConfig,
    RunReport,
};
pub use scrape::{FetchConfig, NewsSite, PageFetcher};
