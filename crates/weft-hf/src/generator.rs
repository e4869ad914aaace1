//! The Hugging Face API chat generator
//!
//! [`HfApiChatGenerator::run`] and [`HfApiChatGenerator::run_async`] are the
//! two call shapes. They validate the call the same way, build the same
//! request, and fold streamed chunks through the same accumulator; only the
//! transport and the way the per-chunk callback is invoked differ.

use std::sync::OnceLock;

use futures_util::StreamExt;
use secrecy::SecretString;
use serde::Serialize;
use serde_json::{Map, Value};
use weft_config::{GeneratorConfig, TokenConfig};
use weft_core::{
    AsyncStreamingCallback, CallbackRegistry, ChatMessage, Component, ComponentInfo, CoreError, Meta, Secret,
    StreamAccumulator, StreamingCallback, SyncStreamingCallback, Tools, check_duplicate_tool_names,
    default_from_dict, default_to_dict, select_async_callback, select_sync_callback,
};

use crate::api_type::HfApiType;
use crate::client::{AsyncInferenceClient, Endpoint, InferenceClient};
use crate::convert::{convert_message, convert_stream_output, convert_tool_calls, convert_tools, usage_or_zero};
use crate::error::{HfError, Result};
use crate::protocol::{ChatCompletionOutput, ChatCompletionRequest, StreamOptions};

/// `max_tokens` sent when the caller does not set one
pub const DEFAULT_MAX_TOKENS: u64 = 512;

/// Request body fields owned by the generator, never taken from `generation_kwargs`
const REQUEST_FIELDS: [&str; 5] = ["model", "messages", "stream", "stream_options", "tools"];

/// Environment variables the default credential is read from
pub const DEFAULT_TOKEN_ENV_VARS: [&str; 2] = ["HF_API_TOKEN", "HF_TOKEN"];

/// Default credential: the first of `HF_API_TOKEN` / `HF_TOKEN`, if any is set
pub fn default_token() -> Secret {
    Secret::from_env_vars(DEFAULT_TOKEN_ENV_VARS, false)
}

// -- Construction parameters --

/// Everything needed to build an [`HfApiChatGenerator`]
#[derive(Debug, Clone)]
pub struct GeneratorParams {
    api_type: HfApiType,
    api_params: Map<String, Value>,
    token: Option<Secret>,
    generation_kwargs: Map<String, Value>,
    stop_words: Vec<String>,
    streaming_callback: Option<StreamingCallback>,
    tools: Option<Tools>,
}

impl GeneratorParams {
    pub fn new(api_type: HfApiType, api_params: Map<String, Value>) -> Self {
        Self {
            api_type,
            api_params,
            token: Some(default_token()),
            generation_kwargs: Map::new(),
            stop_words: Vec::new(),
            streaming_callback: None,
            tools: None,
        }
    }

    /// Replace the credential; `None` sends requests without authorization
    #[must_use]
    pub fn with_token(mut self, token: Option<Secret>) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn with_generation_kwargs(mut self, generation_kwargs: Map<String, Value>) -> Self {
        self.generation_kwargs = generation_kwargs;
        self
    }

    #[must_use]
    pub fn with_stop_words(mut self, stop_words: Vec<String>) -> Self {
        self.stop_words = stop_words;
        self
    }

    /// Stream every call by default through this callback
    #[must_use]
    pub fn with_streaming_callback(mut self, callback: impl Into<StreamingCallback>) -> Self {
        self.streaming_callback = Some(callback.into());
        self
    }

    /// Offer these tools on every call that does not bring its own
    #[must_use]
    pub fn with_tools(mut self, tools: impl Into<Tools>) -> Self {
        self.tools = Some(tools.into());
        self
    }

    /// Build parameters from the `[generator]` config section
    pub fn from_config(config: &GeneratorConfig) -> std::result::Result<Self, CoreError> {
        let api_type = HfApiType::parse(&config.api_type)?;

        let token = match &config.token {
            None => default_token(),
            Some(TokenConfig::Value { value }) => Secret::Token(value.clone()),
            Some(TokenConfig::EnvVars { env_vars, strict }) => Secret::from_env_vars(env_vars.iter().cloned(), *strict),
        };

        Ok(Self::new(api_type, config.api_params.clone())
            .with_token(Some(token))
            .with_generation_kwargs(config.generation_kwargs.clone())
            .with_stop_words(config.stop_words.clone()))
    }
}

// -- Output --

/// Result of one generator call
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneratorOutput {
    /// Zero or one assistant message
    pub replies: Vec<ChatMessage>,
}

impl GeneratorOutput {
    fn single(message: ChatMessage) -> Self {
        Self { replies: vec![message] }
    }
}

// -- Generator --

/// Chat generator backed by a Hugging Face inference API
///
/// Works with self-hosted Text Generation Inference servers, dedicated
/// Inference Endpoints and the serverless Inference Providers router.
#[derive(Debug)]
pub struct HfApiChatGenerator {
    api_type: HfApiType,
    api_params: Map<String, Value>,
    token: Option<Secret>,
    generation_kwargs: Map<String, Value>,
    streaming_callback: Option<StreamingCallback>,
    tools: Option<Tools>,
    name: Option<String>,
    endpoint: Endpoint,
    resolved_token: Option<SecretString>,
    async_client: AsyncInferenceClient,
    client: OnceLock<InferenceClient>,
}

impl HfApiChatGenerator {
    /// Validate the parameters and set up the clients
    ///
    /// The blocking client is created on the first synchronous call.
    pub fn new(params: GeneratorParams) -> Result<Self> {
        let GeneratorParams {
            api_type,
            api_params,
            token,
            mut generation_kwargs,
            stop_words,
            streaming_callback,
            tools,
        } = params;

        let endpoint = Endpoint::resolve(api_type, &api_params)?;

        let tools = tools.filter(|t| !t.is_empty());
        if tools.is_some() && streaming_callback.is_some() {
            return Err(HfError::config(
                "using tools and streaming at the same time is not supported; choose one",
            ));
        }
        if let Some(tools) = &tools {
            check_duplicate_tool_names(tools.as_slice())?;
        }

        merge_stop_words(&mut generation_kwargs, stop_words)?;
        generation_kwargs
            .entry("max_tokens")
            .or_insert_with(|| Value::from(DEFAULT_MAX_TOKENS));

        let resolved_token = token.as_ref().map(Secret::resolve_value).transpose()?.flatten();
        let async_client = AsyncInferenceClient::new(endpoint.clone(), resolved_token.clone())?;

        tracing::debug!(
            api_type = %api_type,
            model = %endpoint.model_or_url(),
            authenticated = resolved_token.is_some(),
            "chat generator created"
        );

        Ok(Self {
            api_type,
            api_params,
            token,
            generation_kwargs,
            streaming_callback,
            tools,
            name: None,
            endpoint,
            resolved_token,
            async_client,
            client: OnceLock::new(),
        })
    }

    /// Name this instance so its chunks can be told apart in traces
    #[must_use]
    pub fn with_component_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub const fn api_type(&self) -> HfApiType {
        self.api_type
    }

    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Generation parameters sent with every call, after stop-word merging
    pub const fn generation_kwargs(&self) -> &Map<String, Value> {
        &self.generation_kwargs
    }

    pub const fn streaming_callback(&self) -> Option<&StreamingCallback> {
        self.streaming_callback.as_ref()
    }

    pub const fn tools(&self) -> Option<&Tools> {
        self.tools.as_ref()
    }

    /// Generate a reply with a blocking request
    ///
    /// `generation_kwargs` are merged over the instance defaults key by key.
    /// `tools` and `streaming_callback` replace the instance defaults. A
    /// call with a callback streams; one without returns the whole reply,
    /// including any tool calls.
    ///
    /// Must not be called from inside an async runtime; use
    /// [`Self::run_async`] there.
    pub fn run(
        &self,
        messages: &[ChatMessage],
        generation_kwargs: Option<Map<String, Value>>,
        tools: Option<Tools>,
        streaming_callback: Option<SyncStreamingCallback>,
    ) -> Result<GeneratorOutput> {
        let tools = self.effective_tools(tools, streaming_callback.is_some())?;
        let callback = select_sync_callback(self.streaming_callback.as_ref(), streaming_callback)?;
        let request = self.build_request(messages, generation_kwargs, tools.as_ref(), callback.is_some())?;
        let client = self.blocking_client()?;

        let Some(callback) = callback else {
            let output = client.chat_completion(&request)?;
            return Ok(self.reply_from_output(output));
        };

        let component_info = self.component_info();
        let mut accumulator = StreamAccumulator::new();

        for event in client.chat_completion_stream(&request)? {
            let chunk = convert_stream_output(&event?, accumulator.chunks(), Some(&component_info));
            callback.call(&chunk);
            accumulator.push(chunk);
        }

        Ok(Self::reply_from_stream(accumulator))
    }

    /// Async twin of [`Self::run`]
    pub async fn run_async(
        &self,
        messages: &[ChatMessage],
        generation_kwargs: Option<Map<String, Value>>,
        tools: Option<Tools>,
        streaming_callback: Option<AsyncStreamingCallback>,
    ) -> Result<GeneratorOutput> {
        let tools = self.effective_tools(tools, streaming_callback.is_some())?;
        let callback = select_async_callback(self.streaming_callback.as_ref(), streaming_callback)?;
        let request = self.build_request(messages, generation_kwargs, tools.as_ref(), callback.is_some())?;

        let Some(callback) = callback else {
            let output = self.async_client.chat_completion(&request).await?;
            return Ok(self.reply_from_output(output));
        };

        let component_info = self.component_info();
        let mut accumulator = StreamAccumulator::new();
        let mut events = self.async_client.chat_completion_stream(&request).await?;

        while let Some(event) = events.next().await {
            let chunk = convert_stream_output(&event?, accumulator.chunks(), Some(&component_info));
            callback.call(chunk.clone()).await;
            accumulator.push(chunk);
        }

        Ok(Self::reply_from_stream(accumulator))
    }

    /// Tools for this call, after the checks that must pass before any request
    fn effective_tools(&self, tools: Option<Tools>, has_call_callback: bool) -> Result<Option<Tools>> {
        let tools = tools.filter(|t| !t.is_empty()).or_else(|| self.tools.clone());

        let Some(tools) = tools else {
            return Ok(None);
        };

        check_duplicate_tool_names(tools.as_slice())?;

        if has_call_callback || self.streaming_callback.is_some() {
            return Err(HfError::config(
                "using tools and streaming at the same time is not supported; choose one",
            ));
        }

        Ok(Some(tools))
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        generation_kwargs: Option<Map<String, Value>>,
        tools: Option<&Tools>,
        stream: bool,
    ) -> Result<ChatCompletionRequest> {
        let messages = messages
            .iter()
            .map(convert_message)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut merged = self.generation_kwargs.clone();
        merged.extend(generation_kwargs.unwrap_or_default());
        for key in REQUEST_FIELDS {
            if merged.remove(key).is_some() {
                tracing::warn!(key = %key, "ignoring generation_kwargs key that the generator sets itself");
            }
        }

        Ok(ChatCompletionRequest {
            model: self.endpoint.payload_model().to_owned(),
            messages,
            stream,
            stream_options: stream.then_some(StreamOptions { include_usage: true }),
            tools: if stream { None } else { convert_tools(tools) },
            generation_kwargs: merged,
        })
    }

    fn blocking_client(&self) -> Result<&InferenceClient> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        let client = InferenceClient::new(self.endpoint.clone(), self.resolved_token.clone())?;
        Ok(self.client.get_or_init(|| client))
    }

    fn reply_from_output(&self, output: ChatCompletionOutput) -> GeneratorOutput {
        let Some(choice) = output.choices.and_then(|choices| choices.into_iter().next()) else {
            tracing::debug!(model = %self.endpoint.model_or_url(), "server returned no choices");
            return GeneratorOutput::default();
        };

        let tool_calls = convert_tool_calls(choice.message.tool_calls.as_deref());

        let mut meta = Meta::new();
        meta.insert("model".to_owned(), Value::String(self.endpoint.model_or_url().to_owned()));
        meta.insert(
            "finish_reason".to_owned(),
            choice.finish_reason.map_or(Value::Null, Value::String),
        );
        meta.insert("index".to_owned(), Value::from(choice.index));
        meta.insert("usage".to_owned(), usage_or_zero(output.usage.as_ref()));

        GeneratorOutput::single(ChatMessage::from_assistant(choice.message.content, tool_calls, meta))
    }

    fn reply_from_stream(accumulator: StreamAccumulator) -> GeneratorOutput {
        GeneratorOutput::single(accumulator.finish())
    }
}

/// Extend `generation_kwargs.stop` with the configured stop words
fn merge_stop_words(generation_kwargs: &mut Map<String, Value>, stop_words: Vec<String>) -> Result<()> {
    let stop = generation_kwargs
        .entry("stop")
        .or_insert_with(|| Value::Array(Vec::new()));

    if let Value::String(single) = stop {
        let single = std::mem::take(single);
        *stop = Value::Array(vec![Value::String(single)]);
    }

    let Value::Array(stop) = stop else {
        return Err(HfError::config("generation_kwargs.stop must be a list of strings"));
    };
    stop.extend(stop_words.into_iter().map(Value::String));

    Ok(())
}

impl Component for HfApiChatGenerator {
    const TYPE_NAME: &'static str = "weft_hf::HfApiChatGenerator";

    fn to_dict(&self) -> std::result::Result<Value, CoreError> {
        let token = match &self.token {
            Some(token) => serde_json::to_value(token).map_err(|e| CoreError::config(e.to_string()))?,
            None => Value::Null,
        };
        let tools = match &self.tools {
            Some(tools) => serde_json::to_value(tools).map_err(|e| CoreError::config(e.to_string()))?,
            None => Value::Null,
        };

        let mut params = Map::new();
        params.insert("api_type".to_owned(), Value::String(self.api_type.to_string()));
        params.insert("api_params".to_owned(), Value::Object(self.api_params.clone()));
        params.insert("token".to_owned(), token);
        params.insert("generation_kwargs".to_owned(), Value::Object(self.generation_kwargs.clone()));
        params.insert(
            "streaming_callback".to_owned(),
            self.streaming_callback
                .as_ref()
                .map_or(Value::Null, |cb| Value::String(cb.name().to_owned())),
        );
        params.insert("tools".to_owned(), tools);

        Ok(default_to_dict(Self::TYPE_NAME, params))
    }

    fn from_dict(data: Value, registry: &CallbackRegistry) -> std::result::Result<Self, CoreError> {
        let mut init = default_from_dict(Self::TYPE_NAME, data)?;

        let api_type = match init.remove("api_type") {
            Some(Value::String(api_type)) => HfApiType::parse(&api_type)?,
            _ => return Err(CoreError::deserialization("`api_type` must be a string")),
        };
        let api_params = take_object(&mut init, "api_params")?;

        let token = match init.remove("token") {
            None => Some(default_token()),
            Some(Value::Null) => None,
            Some(value) if value.get("type").and_then(Value::as_str) == Some("token") => {
                return Err(CoreError::config(
                    "a serialized token secret is redacted and cannot be restored; use an environment variable",
                ));
            }
            Some(value) => Some(
                serde_json::from_value::<Secret>(value)
                    .map_err(|e| CoreError::deserialization(format!("invalid `token`: {e}")))?,
            ),
        };

        let stop_words = match init.remove("stop_words") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| CoreError::deserialization(format!("invalid `stop_words`: {e}")))?,
        };

        let mut params = GeneratorParams::new(api_type, api_params)
            .with_token(token)
            .with_generation_kwargs(take_object(&mut init, "generation_kwargs")?)
            .with_stop_words(stop_words);

        match init.remove("streaming_callback") {
            None | Some(Value::Null) => {}
            Some(Value::String(name)) => params = params.with_streaming_callback(registry.resolve(&name)?),
            Some(_) => return Err(CoreError::deserialization("`streaming_callback` must be a string")),
        }

        match init.remove("tools") {
            None | Some(Value::Null) => {}
            Some(value) => {
                let tools: Tools = serde_json::from_value(value)
                    .map_err(|e| CoreError::deserialization(format!("invalid `tools`: {e}")))?;
                params = params.with_tools(tools);
            }
        }

        Self::new(params).map_err(|e| match e {
            HfError::Config(e) => e,
            other => CoreError::config(other.to_string()),
        })
    }

    fn component_info(&self) -> ComponentInfo {
        ComponentInfo::new(Self::TYPE_NAME).with_name(self.name.clone())
    }
}

fn take_object(init: &mut Map<String, Value>, key: &str) -> std::result::Result<Map<String, Value>, CoreError> {
    match init.remove(key) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(CoreError::deserialization(format!("`{key}` must be an object"))),
    }
}
