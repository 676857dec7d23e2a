//! Discover source files in a project, generate tests for each with an
//! external text-generation backend, and write them into a mirrored test
//! tree.

pub mod config;
pub mod discovery;
pub mod error;
pub mod llm;
pub mod logger;
pub mod orchestrator;
pub mod reader;
pub mod report;
pub mod state;
pub mod testgen;

pub use config::PipelineOptions;
pub use error::{DiscoveryError, InvocationError, PipelineError};
pub use orchestrator::{CancelToken, PipelineOrchestrator};
pub use state::{
    Category, FileOutcome, GeneratedTest, GenerationStatus, PipelineRun, ProjectFile, ReadStatus,
    RunCounts, SourceContent, TerminalStatus, WriteResult, WriteStatus,
};
