//! healthrag-rag
//!
//! Retrieval-augmented answering over the vector index: context assembly,
//! prompt rendering, LLM generation, the query pipeline and bulk ingestion.

pub mod assemble;
pub mod generate;
pub mod ingest;
pub mod pipeline;
pub mod prompt;

pub use assemble::{assemble, rerank, Context};
pub use generate::OllamaGenerator;
pub use ingest::{IngestReport, Ingestor};
pub use pipeline::{AnswerTrace, RagPipeline, Stage};
pub use prompt::PromptTemplate;
