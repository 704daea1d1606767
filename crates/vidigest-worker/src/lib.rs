//! Summary pipeline worker.
//!
//! Consumes queued video work items: fetches a transcript, summarizes it
//! with the configured LLM, and persists the result. Failures are classified
//! here and translated into state-machine calls or batch-failure reports.

pub mod config;
pub mod pipeline;
pub mod summarizer;
pub mod throttle;
pub mod transcript;

pub use config::WorkerConfig;
pub use pipeline::{BatchOutcome, Pipeline};
pub use summarizer::{GeminiClient, GroqClient, Summarizer, SummarizerError};
pub use throttle::FetchThrottle;
pub use transcript::{TranscriptError, TranscriptFetcher, TranscriptSource};
