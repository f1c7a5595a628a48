//! Command-line interface implementation
//!
//! Parses the task list and options, loads the configuration and drives the
//! executor on a tokio runtime.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::build::{BuildContext, ExecuteError, Executor, RunOutcome, TaskRegistry, DEFAULT_TASK};
use crate::config::loader::{
    default_config, find_config, load_config, merge_cli_overrides, CliOverrides,
};
use crate::config::{AssetflowConfig, ConfigError};

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Assetflow - run declarative asset pipelines
#[derive(Parser, Debug)]
#[command(name = "assetflow")]
#[command(about = "Assetflow - build styles, scripts, images and templates, and serve them with live reload")]
#[command(version)]
pub struct Cli {
    /// Tasks to run in order (default: `default`)
    #[arg(value_name = "TASK")]
    pub tasks: Vec<String>,

    /// Config file (default: nearest assetflow.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output root, overriding `project.out`
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Dev server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Dev server host
    #[arg(long)]
    pub host: Option<String>,

    /// Skip lossy image steps
    #[arg(long)]
    pub no_lossy: bool,

    /// Show debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Exit with an error if any file failed
    #[arg(long)]
    pub strict: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// List available tasks and exit
    #[arg(long)]
    pub list: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            out: self.out.clone(),
            host: self.host.clone(),
            port: self.port,
            lossy: self.no_lossy.then_some(false),
        }
    }

    /// Requested tasks, or the default task when none was named.
    pub fn task_names(&self) -> Vec<String> {
        if self.tasks.is_empty() {
            vec![DEFAULT_TASK.to_string()]
        } else {
            self.tasks.clone()
        }
    }
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    crate::logging::init(cli.verbose);

    let registry = TaskRegistry::standard();
    if cli.list {
        print_tasks(&registry);
        return ExitCode::from(EXIT_SUCCESS);
    }

    let (config, project_root) = match load(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let context = BuildContext::new(config, project_root).with_verbose(cli.verbose);
    let executor = Executor::new(Arc::new(context), registry);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    runtime.block_on(run_tasks(&cli, &executor))
}

/// Load the configuration and work out the project root.
///
/// The root is the directory holding the config file, or the working
/// directory when running on defaults.
fn load(cli: &Cli) -> Result<(AssetflowConfig, PathBuf), ConfigError> {
    let cwd = std::env::current_dir()?;
    let config_path = match &cli.config {
        Some(path) => Some(cwd.join(path)),
        None => find_config(),
    };

    let (mut config, root) = match config_path {
        Some(path) => {
            tracing::debug!("Using config: {}", path.display());
            let config = load_config(Some(&path))?;
            (config, project_root_for(&path, &cwd))
        }
        None => {
            tracing::debug!("No assetflow.toml found, using defaults");
            (default_config(), cwd)
        }
    };

    merge_cli_overrides(&mut config, &cli.overrides());
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok((config, root))
}

fn project_root_for(config_path: &Path, cwd: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => cwd.join(parent),
        _ => cwd.to_path_buf(),
    }
}

fn print_tasks(registry: &TaskRegistry) {
    println!("Available tasks:");
    for task in registry.tasks() {
        println!("  {:<12} {}", task.name, task.description);
    }
}

async fn run_tasks(cli: &Cli, executor: &Executor) -> ExitCode {
    let outcome = match executor.run(&cli.task_names()).await {
        Ok(outcome) => outcome,
        Err(ExecuteError::Task(e)) => {
            eprintln!("Error: {}", e);
            eprintln!("Run 'assetflow --list' to see available tasks");
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    print_report(cli, &outcome);
    let failed = !outcome.report.is_success();

    if !outcome.services.is_empty() {
        wait_for_shutdown(&outcome).await;
    }

    if failed && cli.strict {
        ExitCode::from(EXIT_ERROR)
    } else {
        ExitCode::from(EXIT_SUCCESS)
    }
}

fn print_report(cli: &Cli, outcome: &RunOutcome) {
    if cli.json {
        match serde_json::to_string_pretty(&outcome.report) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing report: {}", e),
        }
    } else if outcome.report.is_success() {
        println!("{}", outcome.report.summary());
    } else {
        eprintln!("{}", outcome.report.summary());
    }
}

async fn wait_for_shutdown(outcome: &RunOutcome) {
    for service in &outcome.services {
        if let Some(addr) = service.addr {
            println!("Serving at http://{}", addr);
        }
    }
    println!("Press Ctrl+C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
    }
    outcome.shutdown();
}
