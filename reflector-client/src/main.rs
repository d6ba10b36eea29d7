use anyhow::Result;
use clap::Parser;
use colored::*;
use log::*;

mod inference;
mod output;
mod relay_client;

use inference::InferenceClient;
use relay_client::{IdentifyAck, RelayConnection};

#[derive(Parser)]
#[command(name = "reflector-client")]
#[command(about = "Answers relayed agent messages with a local language model")]
struct Cli {
    /// WebSocket URL of the relay (e.g., ws://localhost:4000/ws)
    #[arg(long, env)]
    relay_url: String,

    /// Generate endpoint of the inference service
    #[arg(long, env, default_value = "http://localhost:11434/api/generate")]
    inference_url: String,

    /// Model the inference service should use
    #[arg(long, env, default_value = "gemma3:1b")]
    model: String,

    /// Payload sent on open to register as a counterpart
    #[arg(long, env, default_value = "AIConnect")]
    identify_token: String,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== REFLECTOR CLIENT ===".bright_white().bold());

    let inference = InferenceClient::new(reqwest::Client::new(), cli.inference_url, cli.model);
    let mut relay = RelayConnection::establish(&cli.relay_url).await?;

    output::print_connected(&cli.relay_url, &cli.identify_token);
    relay.send(&cli.identify_token).await?;

    // Only the first matching payload is the acknowledgment; later ones are prompts
    let mut pending_ack = Some(IdentifyAck::for_token(&cli.identify_token));

    while let Some(text) = relay.next_text().await? {
        if pending_ack.as_ref().is_some_and(|ack| ack.matches(&text)) {
            pending_ack = None;
            output::print_acknowledgment(&text);
            continue;
        }

        output::print_prompt(&text);

        match inference.complete(&text).await {
            Ok(reply) => {
                output::print_reply(&reply);
                relay.send(&reply).await?;
            }
            Err(e) => {
                error!("Inference failed: {e:?}");
                output::print_inference_failure(&e);
            }
        }
    }

    output::print_closed();
    Ok(())
}
