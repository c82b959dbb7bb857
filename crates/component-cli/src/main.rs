use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use component_core::{
    config::Config, diagnostics::Tee, field_options, BlockDeriver, CancelSignal, CollectingSink,
    ComponentDiscovery, Registry, TracingSink,
};
use component_manifest::ComponentManifest;
use regex::Regex;
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_CONFIG: &str = "demos/minimal.components.toml";

#[derive(Parser, Debug)]
#[command(
    name = "component",
    author,
    version,
    about = "Discover component manifests and derive block definitions"
)]
struct Cli {
    /// Sets the log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan every configured root and print the component registry.
    Scan {
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
        config: PathBuf,
        /// Scan roots in parallel on the blocking pool.
        #[arg(long)]
        concurrent: bool,
        /// Print collected diagnostics after the registry.
        #[arg(long)]
        diagnostics: bool,
        /// One line per component instead of JSON.
        #[arg(long)]
        summary: bool,
    },
    /// Print the block definitions derived from the registry.
    Blocks {
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
    /// List components selectable as entity field values.
    Fields {
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
    /// Print the search directories in scan order.
    Roots {
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
    /// Interact with configuration files (validate, sample output, etc.)
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validates the provided configuration file.
    Validate {
        #[arg(value_name = "FILE")]
        config: PathBuf,
    },
    /// Prints the bundled minimal example configuration.
    Example,
    /// Dump the resolved configuration as JSON.
    Show {
        #[arg(value_name = "FILE")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;
    match cli.command {
        Commands::Scan {
            config,
            concurrent,
            diagnostics,
            summary,
        } => handle_scan(&config, concurrent, diagnostics, summary).await,
        Commands::Blocks { config } => handle_blocks(&config),
        Commands::Fields { config } => handle_fields(&config),
        Commands::Roots { config } => handle_roots(&config),
        Commands::Config { command } => handle_config(command),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
    Ok(())
}

async fn handle_scan(
    config_path: &Path,
    concurrent: bool,
    show_diagnostics: bool,
    summary: bool,
) -> Result<()> {
    let cfg = load_valid_config(config_path)?;
    let collected = Arc::new(CollectingSink::new());
    let discovery = ComponentDiscovery::from_config(&cfg)?
        .with_sink(Arc::new(Tee(TracingSink, Arc::clone(&collected))));

    let registry = if concurrent || cfg.concurrent {
        let (handle, cancel) = CancelSignal::pair();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; cancelling scan");
                handle.cancel();
            }
        });
        let result = Arc::new(discovery).discover_concurrent(cancel).await;
        interrupt.abort();
        result?
    } else {
        discovery.discover()?
    };

    if summary {
        for manifest in registry.iter() {
            println!("{}", summary_line(manifest));
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&registry)?);
    }

    if show_diagnostics {
        let diagnostics = collected.take();
        eprintln!("{} diagnostic(s)", diagnostics.len());
        for diagnostic in diagnostics {
            eprintln!("{diagnostic}");
        }
    }
    Ok(())
}

fn summary_line(manifest: &ComponentManifest) -> String {
    let location = if manifest.subpath.is_empty() {
        manifest.path.display().to_string()
    } else {
        format!("{} ({})", manifest.path.display(), manifest.subpath)
    };
    format!(
        "{}:{}\t{}\t{location}",
        manifest.component_type, manifest.machine_name, manifest.name
    )
}

fn handle_blocks(config_path: &Path) -> Result<()> {
    let registry = scan(config_path)?;
    let blocks = BlockDeriver::default().derive(&registry);
    println!("{}", serde_json::to_string_pretty(&blocks)?);
    Ok(())
}

fn handle_fields(config_path: &Path) -> Result<()> {
    let registry = scan(config_path)?;
    let options = field_options(&registry);
    if options.is_empty() {
        println!("no components enable field selection");
    }
    for option in options {
        println!("{}\t{}", option.machine_name, option.label);
    }
    Ok(())
}

#[derive(Serialize)]
struct RootListing {
    roots: Vec<component_core::resolver::SearchRoot>,
}

fn handle_roots(config_path: &Path) -> Result<()> {
    let cfg = load_valid_config(config_path)?;
    let roots = ComponentDiscovery::from_config(&cfg)?.roots()?;
    println!("{}", serde_json::to_string_pretty(&RootListing { roots })?);
    Ok(())
}

fn handle_config(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Validate { config } => {
            let cfg = load_config(&config)?;
            cfg.validate()?;
            println!("configuration OK: {}", config.display());
        }
        ConfigCommands::Example => {
            println!(
                "{}",
                include_str!("../../../demos/minimal.components.toml")
            );
        }
        ConfigCommands::Show { config } => {
            let cfg = load_config(&config)?;
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
    }
    Ok(())
}

fn scan(config_path: &Path) -> Result<Registry> {
    let cfg = load_valid_config(config_path)?;
    Ok(ComponentDiscovery::from_config(&cfg)?.discover()?)
}

fn load_valid_config(path: &Path) -> Result<Config> {
    let cfg = load_config(path)?;
    cfg.validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(cfg)
}

fn load_config(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let expanded = interpolate_env(&raw)?;
    let cfg = toml::from_str::<Config>(&expanded)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(cfg)
}

fn interpolate_env(input: &str) -> Result<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let regex = match RE.get() {
        Some(regex) => regex,
        None => {
            let compiled = Regex::new(r"\$\{([A-Z0-9_]+)(?::([^}]+))?\}")?;
            RE.get_or_init(|| compiled)
        }
    };
    let result = regex.replace_all(input, |caps: &regex::Captures| {
        let key = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(key).unwrap_or_else(|_| default.to_string())
    });
    Ok(result.into_owned())
}
