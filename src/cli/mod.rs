//! CLI definitions for parley.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::error::{ParleyError, RecoverySuggestion, Result};
use crate::types::ImageAttachment;

/// Chat with a local model, with tool calling.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Streaming chat with tool calling for Ollama")]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one prompt and stream the reply
    Chat(ChatArgs),
    /// List models served by the backend
    Models,
    /// List registered tools
    Tools,
    /// Run a slash command (/search, /scrape, /time) without the model
    Run(RunArgs),
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Model name as known to the backend
    #[arg(short, long, default_value = "llama3.2")]
    pub model: String,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Do not offer tools to the model
    #[arg(long)]
    pub no_tools: bool,

    /// Attach an image (png, jpeg, gif, webp)
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Keep the conversation in the data directory
    #[arg(long)]
    pub save: bool,

    /// User prompt
    pub prompt: String,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Slash command, e.g. "/time" or "/search rust async"
    pub command: Vec<String>,
}

/// Read an image file and guess its MIME type from the extension.
pub fn load_image(path: &Path) -> Result<ImageAttachment> {
    let mime_type = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => {
            return Err(ParleyError::Configuration(format!(
                "unsupported image type: {}",
                path.display()
            )))
        }
    };
    let bytes = std::fs::read(path)?;
    Ok(ImageAttachment::from_bytes(&bytes, mime_type))
}

/// Shorten `text` to at most `max` bytes for terminal display.
pub fn preview(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// One-line hint printed under a fatal error.
pub fn recovery_hint(error: &ParleyError) -> Option<&'static str> {
    match error.recovery_suggestion() {
        RecoverySuggestion::CheckServer => Some("is `ollama serve` running? set OLLAMA_BASE_URL otherwise"),
        RecoverySuggestion::CheckCredentials => Some("check OLLAMA_BEARER_TOKEN"),
        RecoverySuggestion::CheckConfiguration => Some("check the config file and PARLEY_* variables"),
        RecoverySuggestion::IncreaseTimeout => Some("raise request_timeout_secs in the config file"),
        RecoverySuggestion::RetryWithBackoff => Some("the server is busy; try again shortly"),
        RecoverySuggestion::CheckStorage => Some("check PARLEY_DATA_DIR is writable"),
        RecoverySuggestion::CheckToolImplementation | RecoverySuggestion::ReportIssue => None,
    }
}
