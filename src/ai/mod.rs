//! Model-assisted extraction.
//!
//! The language model sits behind the narrow [`LlmClient`] trait; all
//! parsing of its output goes through
//! [`StructuredGenerator::generate_structured`], which never fails and
//! returns an empty list when nothing usable came back.

mod analyzer;
mod client;
mod prompts;
pub mod repair;
mod select;
mod structured;

pub use analyzer::{AiAnalyzer, AiOptions};
pub use client::{LlmClient, LlmError, LlmRequest, OpenAiCompatibleClient, SseAccumulator};
pub use repair::{extract_json_array, json_regions, parse_json, repair_json, strip_code_fences};
pub use select::{select_candidates, Category, SOURCE_EXTENSIONS};
pub use structured::{items_from_response, Prompt, StructuredGenerator, DEFAULT_MAX_TOKENS};
