pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod harness;
pub mod mock_context;
pub mod parser;
pub mod sandbox;
pub mod types;
pub mod workflow;

// Re-export main types
pub use types::*;

// Re-export the harness API for convenience
pub use harness::{execute_workflow, extract_trigger_info, validate_syntax, Harness};
pub use mock_context::{build_mock_context, EffectiveTrigger, TriggerSource};
pub use sandbox::SandboxSettings;
