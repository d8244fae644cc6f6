//! `medifind chat`

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use medifind_core::Config;
use medifind_llm::{format_segments, ChatMessage, ChatSession, GeminiClient, HistoryMode, Segment};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::load_config;

#[derive(Args)]
pub struct ChatArgs {
    /// Start by asking about this medicine
    #[arg(long)]
    about: Option<String>,

    /// Replay up to this many earlier exchanges with every message
    #[arg(long)]
    replay: Option<usize>,
}

const QUIT: &[&str] = &["/quit", "/exit"];

fn gemini_client(config: &Config) -> Result<GeminiClient> {
    let key = config
        .gemini_api_key
        .clone()
        .context("MEDIFIND_GEMINI_API_KEY is not set")?;
    Ok(GeminiClient::new(key).with_timeout(config.request_timeout))
}

fn render(message: &ChatMessage) {
    let text: String = format_segments(&message.text)
        .iter()
        .map(|segment| match segment {
            Segment::Plain(text) => text.clone(),
            Segment::Bold(text) => text.to_uppercase(),
        })
        .collect();
    println!("\nMedAssist: {text}");

    let actions = message.quick_actions();
    if !actions.is_empty() {
        println!("  search: {}", actions.join(" | "));
    }
}

pub async fn run(args: ChatArgs) -> Result<()> {
    let config = load_config()?;
    let mode = match args.replay {
        Some(max_turns) => HistoryMode::Replay { max_turns },
        None => HistoryMode::Stateless,
    };
    let mut session = ChatSession::with_mode(std::sync::Arc::new(gemini_client(&config)?), mode);

    if let Some(greeting) = session.messages().first() {
        render(greeting);
    }
    println!("  try: {}", medifind_llm::QUICK_SUGGESTIONS.join(" | "));

    if let Some(name) = args.about.as_deref() {
        if let Some(reply) = session.ask_about(name).await {
            render(reply);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nyou> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if QUIT.contains(&line.trim()) {
            break;
        }
        if let Some(reply) = session.send(&line).await {
            render(reply);
        }
    }
    Ok(())
}
