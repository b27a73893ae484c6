//! Text console for the realtime chat client.
//!
//! This binary is a thin caller around `azure-realtime`: it loads
//! configuration, initializes logging, runs a connectivity self-test, and
//! then loops over stdin lines until the user types `exit`. All protocol
//! logic lives in the library.

mod config;

use anyhow::Context;
use azure_realtime::{ChatClient, TurnError};
use clap::Parser;
use config::ChatConfig;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chat", about = "Console chat over the Azure OpenAI realtime protocol")]
struct Args {
    /// Enable verbose frame-level logging.
    #[arg(long)]
    debug: bool,
}

const APOLOGY: &str = "I encountered an error processing your request. Please try again.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let default_filter = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = ChatConfig::from_env().context("Failed to load configuration")?;

    // Connectivity self-test on a throwaway session before the real chat.
    info!("Testing realtime connection...");
    let mut probe = ChatClient::connect(config.connection.clone(), config.system_prompt.clone())
        .await
        .context("Connection test failed")?;
    probe
        .submit_user_utterance("test")
        .await
        .context("Connection test turn failed")?;
    probe.close().await;
    info!("Connection test succeeded.");

    let mut client = ChatClient::connect(config.connection.clone(), config.system_prompt.clone())
        .await
        .context("Failed to negotiate chat session")?;
    println!("Connected. Type a message and press Enter; type 'exit' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("exit") {
            println!("\nGoodbye!");
            break;
        }

        match client.submit_user_utterance(text).await {
            Ok(reply) => println!("\nAI: {reply}"),
            Err(TurnError::ConnectionClosed) => {
                error!("Connection dropped mid-turn; re-negotiating session");
                client
                    .reconnect()
                    .await
                    .context("Failed to re-negotiate after a dropped connection")?;
                println!("\nAI: {APOLOGY}");
            }
            Err(err) => {
                // The turn failed but the session is still usable; the user
                // can resend the same input.
                error!(error = %err, "Turn failed");
                println!("\nAI: {APOLOGY}");
            }
        }
    }

    client.close().await;
    Ok(())
}
