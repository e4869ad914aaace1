//! Hugging Face API chat generator for weft
//!
//! Calls a self-hosted Text Generation Inference server, a dedicated
//! Inference Endpoint, or the serverless Inference Providers router through
//! their `OpenAI`-compatible chat completion route, in blocking or async form, with
//! or without streaming.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod api_type;
pub mod client;
pub mod convert;
pub mod error;
pub mod generator;
pub mod protocol;

#[cfg(test)]
mod test_support;

pub use api_type::HfApiType;
pub use client::{AsyncInferenceClient, Endpoint, InferenceClient, SERVERLESS_CHAT_URL};
pub use error::{HfError, Result};
pub use generator::{DEFAULT_MAX_TOKENS, GeneratorOutput, GeneratorParams, HfApiChatGenerator, default_token};
