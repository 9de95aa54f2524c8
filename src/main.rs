use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docchat::app::{App, TextRenderer};
use docchat::clock::SystemClock;
use docchat::config::Config;
use docchat::gateway::ReqwestTransport;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "docchat")]
#[command(author, version, about = "Docchat - chat with your documents from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backend base URL (overrides config and DOCCHAT_API_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Path to a config file (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session (default)
    Chat,

    /// Show the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env();
            config
        }
        None => Config::load()?,
    };
    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
    }
    Ok(config)
}

async fn run_chat(config: Config) -> Result<()> {
    let base_url = config.base_url()?;
    let transport = ReqwestTransport::new(&base_url).context("Failed to build HTTP client")?;
    tracing::info!("Using backend at {}", base_url);

    let mut app = App::new(
        config,
        Arc::new(transport),
        Arc::new(SystemClock),
        TextRenderer::stdout(),
    );
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    app.run(stdin).await
}

fn run_config(cli: &Cli, config: &Config, init: bool) -> Result<()> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    if init {
        Config::default().save_to(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "docchat=debug"
    } else {
        "docchat=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        None | Some(Commands::Chat) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let result = runtime.block_on(run_chat(config));
            // A pending stdin read would otherwise hold the process open
            runtime.shutdown_background();
            result?;
        }
        Some(Commands::Config { init }) => run_config(&cli, &config, init)?,
    }

    Ok(())
}
