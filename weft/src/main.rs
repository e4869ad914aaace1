#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod telemetry;

use args::{Args, Command};
use clap::Parser;
use weft_config::{Config, GeneratorConfig};
use weft_core::{ChatMessage, Component, Usage, print_streaming_chunk, print_streaming_chunk_async};
use weft_hf::{GeneratorOutput, GeneratorParams, HfApiChatGenerator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    telemetry::init(&config.logging)?;

    tracing::debug!(config_path = %args.config.display(), "configuration loaded");

    let generator_config = config
        .generator
        .ok_or_else(|| anyhow::anyhow!("a [generator] section must be configured"))?;

    match args.command {
        Command::Describe => {
            let generator = build_generator(&generator_config)?;
            println!("{}", serde_json::to_string_pretty(&generator.to_dict()?)?);
        }
        Command::Chat {
            prompt,
            system,
            stream,
            blocking,
        } => {
            let mut messages = Vec::with_capacity(2);
            if let Some(system) = system {
                messages.push(ChatMessage::from_system(system));
            }
            messages.push(ChatMessage::from_user(prompt));

            let output = if blocking {
                // The blocking client must live and die off the async runtime
                tokio::task::spawn_blocking(move || -> anyhow::Result<GeneratorOutput> {
                    let generator = build_generator(&generator_config)?;
                    let callback = stream.then(print_streaming_chunk);
                    Ok(generator.run(&messages, None, None, callback)?)
                })
                .await??
            } else {
                let generator = build_generator(&generator_config)?;
                let callback = stream.then(print_streaming_chunk_async);
                generator.run_async(&messages, None, None, callback).await?
            };

            print_output(&output, stream);
        }
    }

    Ok(())
}

fn build_generator(config: &GeneratorConfig) -> anyhow::Result<HfApiChatGenerator> {
    let params = GeneratorParams::from_config(config)?;
    Ok(HfApiChatGenerator::new(params)?)
}

fn print_output(output: &GeneratorOutput, streamed: bool) {
    let Some(reply) = output.replies.first() else {
        eprintln!("no reply returned");
        return;
    };

    if !streamed && let Some(text) = reply.text() {
        println!("{text}");
    }

    for tool_call in reply.tool_calls() {
        println!(
            "tool call {} -> {}({})",
            tool_call.id,
            tool_call.tool_name,
            serde_json::Value::Object(tool_call.arguments.clone())
        );
    }

    let usage = reply
        .meta()
        .get("usage")
        .and_then(|usage| serde_json::from_value::<Usage>(usage.clone()).ok())
        .unwrap_or_default();

    eprintln!(
        "usage: prompt_tokens={} completion_tokens={}",
        usage.prompt_tokens, usage.completion_tokens
    );
}
