use std::env;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use config::{Config, Environment, File, FileFormat};
use log::{LevelFilter, debug, info};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use paperqa::api;
use paperqa::db;
use paperqa::document::{DocumentProcessor, DocumentRepository};
use paperqa::llm::{DeepSeekClient, DeepSeekConfig, ModelInfo};

const APP_NAME: &str = "paperqa";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_main(ctx: RuntimeContext, cmd: ServeCommand) -> Result<()> {
    handle_serve(&ctx, cmd).await
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("resolved paths: {:#?}", ctx.paths);

    match cli.command {
        Command::Serve(cmd) => async_main(ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => handle_completions(shell),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Paperqa - document Q&A chat backend.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve(ServeCommand),
    /// Inspect the resolved configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
struct ServeCommand {
    /// Address to bind
    #[arg(long, value_name = "HOST")]
    host: Option<String>,
    /// Port to bind
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,
    /// Override the data directory
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
}

/// Server bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct ServerConfig {
    host: String,
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct LlmConfig {
    /// API key; falls back to the DEEPSEEK_API_KEY environment variable.
    api_key: Option<String>,
    base_url: String,
    default_model: String,
    max_tokens: u32,
    temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.deepseek.com/v1".to_string(),
            default_model: "deepseek-chat".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

/// Application configuration, loaded from TOML with environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    server: ServerConfig,
    /// Data directory for the database and stored uploads.
    data_dir: Option<PathBuf>,
    /// Directory of frontend assets to serve, if any.
    static_dir: Option<PathBuf>,
    llm: LlmConfig,
    /// Models offered to clients via GET /models.
    models: Vec<ModelInfo>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            data_dir: None,
            static_dir: None,
            llm: LlmConfig::default(),
            models: default_models(),
        }
    }
}

fn default_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "deepseek-chat".to_string(),
            name: "DeepSeek Chat".to_string(),
            description: "General-purpose chat model".to_string(),
        },
        ModelInfo {
            id: "deepseek-reasoner".to_string(),
            name: "DeepSeek Reasoner".to_string(),
            description: "Reasoning model for harder questions".to_string(),
        },
    ]
}

#[derive(Debug, Clone)]
struct AppPaths {
    config_file: PathBuf,
    data_dir: PathBuf,
}

struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let config_file = match &common.config {
            Some(path) => path.clone(),
            None => dirs::config_dir()
                .ok_or_else(|| anyhow!("could not determine config directory"))?
                .join(APP_NAME)
                .join("config.toml"),
        };

        let config = load_config(&config_file)?;

        let data_dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .ok_or_else(|| anyhow!("could not determine data directory"))?
                .join(APP_NAME),
        };

        Ok(Self {
            common,
            paths: AppPaths {
                config_file,
                data_dir,
            },
            config,
        })
    }

    fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }

        let level = match self.effective_log_level() {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        };

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("paperqa={level},tower_http={level}")));

        let disable_color = env::var_os("NO_COLOR").is_some() || !io::stderr().is_terminal();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_ansi(!disable_color))
            .try_init()
            .ok();

        // Also init env_logger for compatibility with log crate users
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
        builder.filter_level(self.effective_log_level());
        builder.try_init().ok();

        Ok(())
    }

    fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => LevelFilter::Info,
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

/// Load configuration from the TOML file (when present) with PAPERQA_*
/// environment overrides.
fn load_config(config_file: &Path) -> Result<AppConfig> {
    let mut builder = Config::builder();
    if config_file.exists() {
        builder = builder.add_source(
            File::from(config_file.to_path_buf())
                .format(FileFormat::Toml)
                .required(false),
        );
    }
    builder = builder.add_source(Environment::with_prefix("PAPERQA").separator("__"));

    let config = builder
        .build()
        .with_context(|| format!("loading config from {}", config_file.display()))?;

    config
        .try_deserialize::<AppConfig>()
        .context("parsing configuration")
}

async fn handle_serve(ctx: &RuntimeContext, cmd: ServeCommand) -> Result<()> {
    info!("Starting paperqa backend server...");

    let data_dir = cmd.data_dir.unwrap_or_else(|| ctx.paths.data_dir.clone());
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;

    // Database
    let db_path = data_dir.join("db").join("documents.db");
    info!("Database path: {}", db_path.display());
    let database = db::Database::new(&db_path).await?;
    let documents = DocumentRepository::new(database.pool().clone());

    // Upload storage
    let processor = DocumentProcessor::new(&data_dir);
    processor
        .ensure_directories()
        .await
        .context("creating upload directories")?;

    // Response generator
    let api_key = ctx
        .config
        .llm
        .api_key
        .clone()
        .or_else(|| env::var("DEEPSEEK_API_KEY").ok())
        .ok_or_else(|| {
            anyhow!("no API key configured: set llm.api_key or the DEEPSEEK_API_KEY environment variable")
        })?;
    let generator = DeepSeekClient::new(DeepSeekConfig {
        api_key,
        base_url: ctx.config.llm.base_url.clone(),
        max_tokens: ctx.config.llm.max_tokens,
        temperature: ctx.config.llm.temperature,
    })
    .context("creating model API client")?;

    let mut state = api::AppState::new(
        documents,
        processor,
        Arc::new(generator),
        ctx.config.models.clone(),
        ctx.config.llm.default_model.clone(),
    );
    if let Some(static_dir) = &ctx.config.static_dir {
        info!("Serving frontend assets from {}", static_dir.display());
        state = state.with_static_dir(static_dir.clone());
    }

    let app = api::create_router(state);

    let host = cmd.host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = cmd.port.unwrap_or(ctx.config.server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {host}:{port}"))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let rendered =
                toml::to_string_pretty(&ctx.config).context("serializing configuration")?;
            print!("{rendered}");
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
        }
    }
    Ok(())
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}
