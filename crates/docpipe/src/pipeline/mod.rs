pub mod config;
pub mod context;
pub mod error;
pub mod runner;
pub mod title;

pub use config::PipelineConfig;
pub use context::{JobReport, PipelineContext};
pub use error::{PipelineError, SkipReason, SkippedStage, StageOutcome};
pub use runner::Pipeline;
