use anyhow::{bail, Context};
use chat_ragent::diagnostics;
use chat_ragent::dom::RegionSnapshot;
use chat_ragent::{
    AdapterRegistry, AgentRequest, AutomationAgent, ChatSession, ChromeBrowser, Config,
    ExtractionPipeline, ExtractionResult, FileScriptStore, Language, SiteAdapter, Validator,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chat-ragent", version, about = "Drive a browser-hosted AI chat and extract its JSON answer")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Site adapter to drive
    #[arg(long, global = true, default_value = "chatgpt")]
    adapter: String,

    /// Extra adapter definitions (one object or an array)
    #[arg(long, global = true)]
    adapter_file: Option<PathBuf>,

    /// Websocket debugger URL of a running Chrome to attach to
    #[arg(long, global = true)]
    connect: Option<String>,

    #[arg(long, global = true)]
    headless: bool,

    /// Keep a field-diagnostics log for the run
    #[arg(long, global = true)]
    debug_log: bool,

    /// Export the diagnostics snapshot here when a run fails
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Put a prompt into the chat input
    Fill {
        prompt: String,
        /// Click send afterwards
        #[arg(long)]
        send: bool,
    },
    /// Send a prompt, wait for the answer and print the validated script
    Run {
        prompt: String,
        #[arg(long, default_value = "en-US")]
        language: Language,
        #[arg(long)]
        max_wait_ms: Option<u64>,
        /// Save the script as <uuid>.json in this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Answer one JSON request per stdin line, one JSON response per stdout line
    Handle {
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Run extraction over a saved response (HTML or text)
    Extract { file: PathBuf },
    /// Run extraction and validation over a saved response
    Validate { file: PathBuf },
    /// List the registered site adapters
    Adapters,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // stdout is reserved for responses in `handle` mode.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if cli.headless {
        config.browser.headless = true;
    }
    if let Some(url) = &cli.connect {
        config.browser.connect_url = Some(url.clone());
    }
    if cli.debug_log {
        config.diagnostics.enabled = true;
    }
    if let Some(path) = &cli.snapshot {
        config.diagnostics.enabled = true;
        config.diagnostics.snapshot_path = Some(path.clone());
    }
    Ok(config)
}

fn load_adapter(cli: &Cli) -> anyhow::Result<(AdapterRegistry, SiteAdapter)> {
    let mut registry = AdapterRegistry::with_builtins();
    if let Some(path) = &cli.adapter_file {
        let count = registry
            .load_file(path)
            .with_context(|| format!("loading adapters from {}", path.display()))?;
        info!(count, path = %path.display(), "adapters loaded");
    }
    let adapter = registry.get(&cli.adapter)?.clone();
    Ok((registry, adapter))
}

async fn open_session(
    config: Config,
    adapter: SiteAdapter,
    out_dir: Option<&PathBuf>,
) -> anyhow::Result<ChatSession<ChromeBrowser>> {
    let log = diagnostics::from_flag(config.diagnostics.enabled, config.diagnostics.capacity);
    let session = ChatSession::open(ChromeBrowser::new(), config, adapter, log).await?;
    Ok(match out_dir {
        Some(dir) => session.with_store(Arc::new(FileScriptStore::new(dir.clone()))),
        None => session,
    })
}

fn read_region(path: &Path) -> anyhow::Result<RegionSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let is_html = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("html") | Some("htm")
    ) || raw.trim_start().starts_with('<');

    Ok(if is_html {
        RegionSnapshot::from_html(&raw)
    } else {
        RegionSnapshot::from_text(&raw)
    })
}

fn print_extraction(result: &ExtractionResult) {
    println!("strategy:  {:?}", result.strategy_used);
    println!("parses:    {}", result.success);
    println!("candidate:\n{}", result.candidate_json_text);
}

async fn serve_stdin(mut agent: AutomationAgent<ChromeBrowser>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = agent.handle_json(&line).await;
        println!("{}", serde_json::to_string(&response)?);
    }
    agent.into_session().close().await?;
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let (registry, adapter) = load_adapter(&cli)?;

    match &cli.command {
        Command::Adapters => {
            for adapter in registry.iter() {
                println!("{:<10} {}", adapter.name, adapter.hosts.join(", "));
            }
        }
        Command::Extract { file } => {
            let region = read_region(file)?;
            print_extraction(&ExtractionPipeline::new(adapter.heuristic).extract(&region));
        }
        Command::Validate { file } => {
            let region = read_region(file)?;
            let extraction = ExtractionPipeline::new(adapter.heuristic).extract(&region);
            print_extraction(&extraction);

            let outcome = Validator::default().validate(&extraction.candidate_json_text);
            if outcome.valid {
                println!("valid");
            } else {
                for violation in outcome.violations() {
                    println!("- {}", violation);
                }
                bail!("{} violation(s)", outcome.violations().len());
            }
        }
        Command::Fill { prompt, send } => {
            let mut agent = AutomationAgent::new(open_session(config, adapter, None).await?);
            let response = agent
                .handle(AgentRequest::FillPrompt {
                    prompt: prompt.clone(),
                    auto_send: *send,
                })
                .await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Run {
            prompt,
            language,
            max_wait_ms,
            out_dir,
        } => {
            let session = open_session(config, adapter, out_dir.as_ref()).await?;
            let mut agent = AutomationAgent::new(session);
            let response = agent
                .handle(AgentRequest::AutomateFullFlow {
                    prompt: prompt.clone(),
                    language: *language,
                    max_wait_time_ms: *max_wait_ms,
                })
                .await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.is_success() {
                bail!("automation failed");
            }
        }
        Command::Handle { out_dir } => {
            let session = open_session(config, adapter, out_dir.as_ref()).await?;
            serve_stdin(AutomationAgent::new(session)).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
