// tessdb command-line entrypoint
//!
//! Store opening lives in `lifecycle` and the commands in `commands`, so this
//! file only parses arguments, loads configuration and dispatches.

mod logging;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{debug, info};
use tessdb_catalog::ShutdownRegistry;
use tessdb_configs::{EngineConfig, StorageBackendKind};
use tessdb_server::commands::{self, ShowFormat};
use tessdb_server::lifecycle::open_database;

#[derive(Debug, Parser)]
#[command(name = "tessdb", version, about = "Create and inspect tessdb catalog stores")]
struct Cli {
    /// Configuration file; defaults are used when it does not exist
    #[arg(short, long, default_value = "tessdb.toml")]
    config: PathBuf,

    /// Override `storage.path`
    #[arg(long)]
    path: Option<String>,

    /// Override `storage.backend`
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum BackendArg {
    Memory,
    File,
    Rocksdb,
}

impl From<BackendArg> for StorageBackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Memory => StorageBackendKind::Memory,
            BackendArg::File => StorageBackendKind::File,
            BackendArg::Rocksdb => StorageBackendKind::Rocksdb,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write the reserved records into an empty store
    Init,
    /// List cataloged names and their types
    Names,
    /// Print the parameters of one name
    Show {
        name: String,
        #[arg(long, value_enum, default_value_t = ShowFormat::Text)]
        format: ShowFormat,
    },
    /// Check the catalog for structural problems
    Verify,
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = if Path::new(&cli.config).exists() {
        let config = EngineConfig::from_file(&cli.config)?;
        eprintln!("Loaded config from: {}", cli.config.display());
        config
    } else {
        EngineConfig::default()
    };

    if let Some(path) = &cli.path {
        config.storage.path = path.clone();
    }
    if let Some(backend) = cli.backend {
        config.storage.backend = backend.into();
    }
    // Inspection never writes; `init` is the only command that needs a writable store.
    if !matches!(cli.command, Command::Init)
        && config.storage.backend != StorageBackendKind::Memory
    {
        config.storage.read_only = true;
    }
    // Verify reports problems itself instead of refusing to open.
    if matches!(cli.command, Command::Verify) {
        config.catalog.verify_on_open = false;
    }
    config.shutdown.close_on_exit = true;
    config.shutdown.weak_reference = false;
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli, config: &EngineConfig) -> Result<ExitCode> {
    let mut out = io::stdout().lock();
    if let Command::Init = cli.command {
        commands::init(config, &mut out)?;
        return Ok(ExitCode::SUCCESS);
    }

    let db = open_database(config)?;
    let code = match &cli.command {
        Command::Init => ExitCode::SUCCESS,
        Command::Names => {
            commands::names(&db, &mut out)?;
            ExitCode::SUCCESS
        }
        Command::Show { name, format } => {
            commands::show(&db, name, *format, &mut out)?;
            ExitCode::SUCCESS
        }
        Command::Verify => {
            if commands::verify(&db, &mut out)?.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    };
    Ok(code)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: invalid configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("FATAL: failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }
    info!("tessdb v{}", env!("CARGO_PKG_VERSION"));

    let code = run(&cli, &config).unwrap_or_else(|e| {
        eprintln!("error: {:#}", e);
        ExitCode::FAILURE
    });

    let closed = ShutdownRegistry::global().run_now();
    debug!("Closed {} database(s) at exit", closed);
    code
}
