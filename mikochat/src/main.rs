//! mikochat - terminal chat with Miko
//!
//! Interactive chat plus a few one-shot commands for sessions and plans.

mod commands;
mod render;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::Engine;
use clap::{Parser, Subcommand};
use mikochat_core::{build_services, ChatEvent, ChatService, ChatSettings, Config, SqliteStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::commands::{Command, HELP};
use crate::render::{plan_lines, session_lines, Renderer};

#[derive(Parser)]
#[command(name = "mikochat")]
#[command(about = "Chat with Miko from the terminal")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Interactive chat (default)
    Chat,
    /// List saved chats, newest first
    Sessions,
    /// Show the current plan and today's image usage
    Plan,
    /// Redeem an activation code
    Activate {
        /// Code such as USI-HAI-001
        code: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        mikochat_core::logging::init(&config.logging).context("failed to initialize logging")?;
    tracing::info!("mikochat starting up");

    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening session store");
    let store = SqliteStore::open(&db_path, config.storage.max_bytes)
        .context("failed to open session store")?;

    let services = build_services(&config).context("failed to configure services")?;
    let chat = ChatService::new(services, ChatSettings::from(&config.chat), Arc::new(store));

    match args.command.unwrap_or(Cmd::Chat) {
        Cmd::Chat => {
            let renderer = Renderer::new(
                config.chat.assistant_name.clone(),
                Config::state_dir().join("audio"),
            );
            run_chat(&chat, &renderer).await?;
        }
        Cmd::Sessions => {
            chat.start();
            print_lines(session_lines(&chat.sessions()));
        }
        Cmd::Plan => {
            chat.start();
            print_lines(plan_lines(&chat.plan()));
        }
        Cmd::Activate { code } => {
            chat.start();
            let status = chat
                .activate(&code)
                .with_context(|| format!("could not activate '{code}'"))?;
            println!("Successfully activated {}!", status.info().name);
        }
    }

    tracing::info!("mikochat shutting down");
    Ok(())
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

/// Print pending events. Returns `true` if any notification was shown.
fn drain_events(rx: &mut mpsc::UnboundedReceiver<ChatEvent>, renderer: &Renderer) -> bool {
    let mut notified = false;
    while let Ok(event) = rx.try_recv() {
        notified |= matches!(event, ChatEvent::NotificationShown(_));
        print_lines(renderer.lines(&event));
    }
    notified
}

async fn run_chat(chat: &ChatService, renderer: &Renderer) -> Result<()> {
    let mut events = chat.subscribe();
    chat.start();
    drain_events(&mut events, renderer);
    println!("Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().context("failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("failed to read input")? else {
            break;
        };
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(usage) => {
                println!("* {usage}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }

        let result = dispatch(chat, renderer, command).await;
        let notified = drain_events(&mut events, renderer);
        if let Err(e) = result {
            tracing::debug!(error = %e, "Command failed");
            if !notified {
                println!("* {e:#}");
            }
        }

        // Audio is written to disk rather than played
        if chat.is_playing() {
            chat.playback_finished();
            drain_events(&mut events, renderer);
        }
    }

    chat.flush().context("failed to save chat")?;
    Ok(())
}

async fn dispatch(chat: &ChatService, renderer: &Renderer, command: Command) -> Result<()> {
    match command {
        Command::Say(text) => {
            chat.send_message(&text, false).await?;
        }
        Command::New => chat.start_new_chat()?,
        Command::Sessions => print_lines(session_lines(&chat.sessions())),
        Command::Load(n) => {
            let index = chat
                .sessions()
                .get(n - 1)
                .map(|s| s.index)
                .with_context(|| format!("no chat numbered {n}"))?;
            chat.load_session(index)?;
        }
        Command::Think => {
            chat.toggle_thinking_mode();
        }
        Command::Image {
            style,
            ratio,
            prompt,
        } => {
            chat.generate_images(&prompt, style.as_deref(), ratio.as_deref())
                .await?;
        }
        Command::Reply { target_id, text } => {
            chat.send_reply(&target_id, &text).await?;
        }
        Command::Analyze { path, question } => {
            let data_url = image_data_url(&path)?;
            chat.analyze_image(&data_url, &question).await?;
        }
        Command::Speak(id) => chat.speak(&id).await?,
        Command::Plan => print_lines(plan_lines(&chat.plan())),
        Command::Activate(code) => {
            chat.activate(&code)?;
        }
        Command::History => {
            for message in chat.history() {
                let mut lines = renderer.message(&message);
                if let Some(first) = lines.first_mut() {
                    *first = format!("[{}] {first}", message.id);
                }
                print_lines(lines);
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

/// Read an image file into a `data:` URL.
fn image_data_url(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => anyhow::bail!("unsupported image type: {}", path.display()),
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}
