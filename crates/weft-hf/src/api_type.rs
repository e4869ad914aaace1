use serde::{Deserialize, Serialize};
use weft_core::CoreError;

/// Which Hugging Face inference surface to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HfApiType {
    /// Self-hosted Text Generation Inference server, addressed by `url`
    TextGenerationInference,
    /// Dedicated Inference Endpoint, addressed by `url`
    InferenceEndpoints,
    /// Serverless Inference Providers router, addressed by `model`
    ServerlessInferenceApi,
}

impl HfApiType {
    /// Parse the string form used in configuration and serialized components
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        value.parse().map_err(|_| {
            CoreError::config(format!(
                "unknown api_type `{value}`; expected one of text_generation_inference, inference_endpoints, \
                 serverless_inference_api"
            ))
        })
    }

    /// Whether the variant is addressed by URL rather than model id
    pub const fn uses_url(self) -> bool {
        matches!(self, Self::TextGenerationInference | Self::InferenceEndpoints)
    }
}
