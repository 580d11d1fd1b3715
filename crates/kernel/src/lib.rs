//! Notebook session for robotkernel: accumulates cells into a suite, runs it
//! with execution listeners attached, reduces the run's artifacts into
//! replies and answers completion and inspection requests.

pub mod artifacts;
pub mod completion;
pub mod config;
pub mod errors;
pub mod evaluation;
pub mod frontend;
pub mod interactive;
pub mod listeners;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod reply;
pub mod session;

pub use artifacts::{ArtifactReducer, EmbeddedImage, ReductionReport};
pub use completion::{CompletionContext, Resolver, SelectorRecognizer};
pub use config::{ArtifactConfig, CompletionConfig, KernelConfig, DEFAULT_SUITE_NAME};
pub use errors::{ArtifactError, ArtifactResult, KernelError, KernelResult};
pub use evaluation::{EvaluationContext, EvaluationError, Evaluator, ModuleRegistry};
pub use frontend::{BusFrontend, Frontend, FrontendMessage, MimeBundle, RecordingFrontend};
pub use interactive::KeywordTrigger;
pub use listeners::{ConnectionRegistry, SuiteVariables};
pub use pipeline::{ExecutionPipeline, RunRequest, RunResult};
pub use reply::{CompleteReply, ExecuteReply, InspectReply};
pub use session::{CellMetadata, Session};
