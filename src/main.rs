use clap::{Parser, Subcommand};
use colored::*;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use nector_chat::ai::{ChatReply, ChatService, ImageClassifier, ImageReply, ImageService};
use nector_chat::app::App;
use nector_chat::config::Config;
use nector_chat::controller::{ConversationController, Services};
use nector_chat::postprocess::process_reply;
use nector_chat::{handler, logging, tui, ui};

#[derive(Parser)]
#[command(name = "nector")]
#[command(about = "Chat with a hosted model, generate images, and label photos from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Send one message and print the reply
    Ask {
        /// Your message
        text: String,
    },
    /// Generate an image and print where it was saved
    Imagine {
        /// Image prompt
        prompt: String,
    },
    /// Classify a photo and print its labels
    Label {
        /// Path to an image file
        photo: PathBuf,
    },
    /// Show the config file location, writing a template if none exists
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("{}: {}", "Ignoring unreadable config".yellow(), e);
        Config::new()
    });

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let _guard = logging::init_logging();
            run_chat(&config).await
        }
        Commands::Ask { text } => {
            logging::init_stderr_logging();
            ask(&config, &text).await
        }
        Commands::Imagine { prompt } => {
            logging::init_stderr_logging();
            imagine(&config, &prompt).await
        }
        Commands::Label { photo } => {
            logging::init_stderr_logging();
            label(&config, &photo).await
        }
        Commands::Config => show_config(&config),
    }
}

async fn run_chat(config: &Config) -> Result<()> {
    let services = Services::from_config(config)?;
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();
    let controller = ConversationController::new(services, completion_tx);
    let mut app = App::new(controller, config.chat_model());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new(completion_rx);
    tracing::info!(model = config.chat_model(), "chat session started");

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event),
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    tracing::info!("chat session ended");
    result
}

async fn ask(config: &Config, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        println!("{}", "Nothing to send".yellow());
        return Ok(());
    }

    let services = Services::from_config(config)?;
    println!("🤖 Asking {}...\n", config.chat_model().bold().magenta());

    match services.chat.send_chat_turn(text.trim()).await {
        ChatReply::Content(content) => {
            println!("{}", "Response:".bold().green());
            println!("{}", process_reply(&content));
        }
        ChatReply::Error(err) => println!("{}", err.red()),
    }
    Ok(())
}

async fn imagine(config: &Config, prompt: &str) -> Result<()> {
    let services = Services::from_config(config)?;
    println!("🎨 Generating with {}...", config.image_model().bold().magenta());

    match services.images.generate_image(prompt.trim()).await {
        ImageReply::Saved(path) => println!("{} {}", "Saved:".bold().green(), path.display()),
        ImageReply::Error(err) => println!("{}", err.red()),
    }
    Ok(())
}

async fn label(config: &Config, photo: &Path) -> Result<()> {
    let services = Services::from_config(config)?;
    let bytes = tokio::fs::read(photo).await?;

    match services.classifier.classify(&bytes).await {
        Ok(labels) if labels.is_empty() => println!("{}", "No labels detected.".yellow()),
        Ok(labels) => {
            println!("\n{}", "🏷  Labels".bold().blue());
            println!("{}", "=".repeat(30).dimmed());
            for l in labels {
                println!("  • {} {}", l.label.green(), format!("{:.2}", l.score).dimmed());
            }
        }
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    let path = Config::get_config_path()?;
    if !path.exists() {
        config.save()?;
        println!("{} {}", "Wrote".bold().green(), path.display());
    } else {
        println!("{}", path.display());
    }

    let key_status = |key: String| if key.is_empty() { "missing".red() } else { "set".green() };
    println!("  chat model:  {}", config.chat_model());
    println!("  chat key:    {}", key_status(config.chat_api_key()));
    println!("  image model: {}", config.image_model());
    println!("  hf key:      {}", key_status(config.image_api_key()));
    println!("  cache dir:   {}", config.cache_dir()?.display());
    Ok(())
}
