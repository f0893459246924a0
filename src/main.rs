//! parley CLI binary entry point.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use parley::cli::{load_image, preview, recovery_hint, ChatArgs, Cli, Commands, RunArgs};
use parley::config::ParleyConfig;
use parley::conversation::{ConversationEvent, Orchestrator, OrchestratorDeps, PromptRequest};
use parley::error::ParleyError;
use parley::models::LanguageModel;
use parley::provider::{ChatBackend, OllamaBackend};
use parley::storage::{FileStorage, MemoryStorage, Storage};
use parley::tools::{ToolCommand, ToolExecutor, ToolRegistry};
use parley::types::ConversationState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parley=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match load_config(&cli) {
        Ok(config) => match cli.command {
            Commands::Chat(args) => handle_chat(config, args).await,
            Commands::Models => handle_models(config).await,
            Commands::Tools => handle_tools(config),
            Commands::Run(args) => handle_run(config, args).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        if let Some(hint) = recovery_hint(&e) {
            eprintln!("hint: {hint}");
        }
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<ParleyConfig, ParleyError> {
    match &cli.config {
        Some(path) => ParleyConfig::load_from(path),
        None => ParleyConfig::load(),
    }
}

async fn handle_chat(config: ParleyConfig, args: ChatArgs) -> Result<(), ParleyError> {
    let storage: Arc<dyn Storage> = if args.save {
        Arc::new(FileStorage::new(config.resolved_data_dir()))
    } else {
        Arc::new(MemoryStorage::new())
    };

    let sink = Arc::new(|event: ConversationEvent| match event {
        ConversationEvent::MessageDelta { text, .. } => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        ConversationEvent::ToolCallsDetected { calls, .. } => {
            for call in calls {
                eprintln!("\n⚡ {} {}", call.name(), call.arguments());
            }
        }
        ConversationEvent::ToolResults { results, .. } => {
            for result in results {
                match result.error() {
                    Some(error) => eprintln!("  ❌ {}", preview(error, 200)),
                    None => eprintln!("  ✅ {}", preview(result.result().unwrap_or_default(), 200)),
                }
            }
        }
        ConversationEvent::RoundLimitReached { limit, .. } => {
            eprintln!("\n⚠ tool round limit ({limit}) reached");
        }
        _ => {}
    });

    let handle = Orchestrator::spawn(OrchestratorDeps {
        backend: Arc::new(OllamaBackend::from_config(&config)),
        storage,
        registry: Arc::new(ToolRegistry::builtin(&config)),
        config,
        event_sink: Some(sink),
    });
    handle.set_tools_enabled(!args.no_tools).await?;

    let mut request = PromptRequest::new(args.prompt, LanguageModel::named(args.model));
    if let Some(system) = args.system {
        request = request.with_system_prompt(system);
    }
    if let Some(path) = &args.image {
        request = request.with_image(load_image(path)?);
    }
    handle.send_prompt(request).await?;

    let snapshot = tokio::select! {
        snapshot = handle.wait_for_idle() => snapshot,
        _ = tokio::signal::ctrl_c() => {
            handle.cancel().await?;
            handle.wait_for_idle().await
        }
    };
    println!();
    handle.shutdown().await?;

    match snapshot.state {
        ConversationState::Error(message) => Err(ParleyError::Stream(message)),
        _ => Ok(()),
    }
}

async fn handle_models(config: ParleyConfig) -> Result<(), ParleyError> {
    let backend = OllamaBackend::from_config(&config);
    for model in backend.list_models().await? {
        let mut flags = Vec::new();
        if model.supports_tools {
            flags.push("tools");
        }
        if model.supports_images {
            flags.push("images");
        }
        if flags.is_empty() {
            println!("{model}");
        } else {
            println!("{model}  [{}]", flags.join(", "));
        }
    }
    Ok(())
}

fn handle_tools(config: ParleyConfig) -> Result<(), ParleyError> {
    for definition in ToolRegistry::builtin(&config).list() {
        let function = &definition.function;
        println!("{}  {}", function.name, function.description);
    }
    Ok(())
}

async fn handle_run(config: ParleyConfig, args: RunArgs) -> Result<(), ParleyError> {
    let line = args.command.join(" ");
    let command = ToolCommand::parse(&line).ok_or_else(|| {
        ParleyError::Configuration(format!(
            "not a slash command: '{line}' (expected /search, /scrape or /time)"
        ))
    })?;
    let executor = ToolExecutor::new(Arc::new(ToolRegistry::builtin(&config)));
    let result = executor.execute(&command.to_tool_call()).await;
    match result.error() {
        Some(error) => Err(ParleyError::Stream(error.to_string())),
        None => {
            println!("{}", result.result().unwrap_or_default());
            Ok(())
        }
    }
}
