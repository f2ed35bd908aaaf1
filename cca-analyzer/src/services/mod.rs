//! Analyzer services
//!
//! The orchestrator drives the pipeline; everything else is a component it
//! is constructed with.

pub mod cache_store;
pub mod entity_enricher;
pub mod generative_client;
pub mod lexicon_detector;
pub mod orchestrator;
pub mod prompt;
pub mod response_parser;

pub use cache_store::{CacheStatistics, CacheStore};
pub use entity_enricher::{DetectorError, EntityDetector};
pub use generative_client::{BackendError, Completion, GeminiClient, GenerativeBackend};
pub use lexicon_detector::LexiconDetector;
pub use orchestrator::{AnalysisError, AnalysisOrchestrator, PipelineStage};
