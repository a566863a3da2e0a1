pub mod error;
pub mod extractor;
pub mod orchestrator;

pub use error::PipelineError;
pub use extractor::PostureExtractor;
pub use orchestrator::AnalysisPipeline;
