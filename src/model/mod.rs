//! Model clients for OpenAI-compatible chat-completion APIs.
//!
//! ## Structure
//!
//! - `types`: Client configuration, evaluation record, errors
//! - `traits`: Answer generation and grading traits
//! - `provider`: Provider kind enum and parsing
//! - `catalog`: Fixed model lists and endpoint discovery
//! - `prompts`: Prompt builders
//! - `providers/`: Provider-specific implementations

pub mod types;
pub mod traits;
pub mod provider;
pub mod catalog;
pub mod prompts;

pub mod providers;

pub use types::{ClientConfig, Evaluation, ModelError};
pub use traits::{AnswerGrader, AnswerModel};
pub use provider::ProviderKind;
pub use providers::OpenAiCompatClient;
