use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Construction parameters for the chat generator
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// API variant: `text_generation_inference`, `inference_endpoints` or `serverless_inference_api`
    pub api_type: String,
    /// Variant-specific parameters such as `model`, `url`, `provider`, `timeout`, `headers`
    #[serde(default)]
    pub api_params: Map<String, Value>,
    /// Bearer credential; the generator's environment default applies when absent
    #[serde(default)]
    pub token: Option<TokenConfig>,
    /// Default generation parameters
    #[serde(default)]
    pub generation_kwargs: Map<String, Value>,
    /// Extra stop sequences appended to `generation_kwargs.stop`
    #[serde(default)]
    pub stop_words: Vec<String>,
}

/// Where the bearer credential comes from
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TokenConfig {
    /// Literal token, usually filled in through `${VAR}` expansion
    Value { value: SecretString },
    /// First set variable among `env_vars`
    EnvVars {
        env_vars: Vec<String>,
        #[serde(default)]
        strict: bool,
    },
}
