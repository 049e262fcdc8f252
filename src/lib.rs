pub mod cli;
pub mod commands;
pub mod error;
pub mod file_manager;
pub mod frontend;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod process_manager;
pub mod utils;

use clap::Parser;
use cli::{Cli, Command, Selection};
use commands::{default_download_dir, default_settings_path, download_predictions, load_app_settings, run_batch};
use file_manager::{list_phenotypes, upload_files};
use frontend::ConsoleFrontend;
use log::{error, info};
use models::{AppSettings, RunMode};
use orchestrator::{OrchestratorConfig, RunSummary};
use std::io::{self, BufRead, Write};
use std::path::Path;
use utils::WorkspaceLayout;

fn initialize_workspace(layout: &WorkspaceLayout, settings: &AppSettings) -> Result<(), String> {
    layout.initialize_directories()?;
    let removed = logging::cleanup_old_logs(&layout.logs_dir(), settings.log_retention_days);
    if removed > 0 {
        info!("Removed {} expired log file(s)", removed);
    }
    Ok(())
}

fn resolve_items(layout: &WorkspaceLayout, selection: &Selection) -> Vec<String> {
    if selection.all {
        list_phenotypes(layout)
    } else {
        selection.items.clone()
    }
}

fn confirm_overwrite(path: &Path) -> bool {
    print!("{} already exists. Overwrite? [y/N] ", path.display());
    let _ = io::stdout().flush();
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn run_jobs(cli: &Cli, config: OrchestratorConfig, mode: RunMode, items: Vec<String>) -> i32 {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return 2;
        }
    };

    let layout = config.layout.clone();
    let summary = match runtime.block_on(run_batch(ConsoleFrontend::new(cli.yes), config, mode, items)) {
        Ok(summary) => summary,
        // Already shown through the frontend alert
        Err(_) => return 2,
    };

    if let Command::Predict { download: Some(dest), .. } = &cli.command {
        let succeeded: Vec<String> = summary.succeeded().into_iter().map(str::to_string).collect();
        match download_predictions(&layout, &succeeded, dest) {
            Ok(report) => println!("{}", report.render()),
            Err(e) => eprintln!("error: {}", e),
        }
    }

    exit_code(&summary)
}

/// 1 when any item failed; a run where every item was skipped is not a failure
fn exit_code(summary: &RunSummary) -> i32 {
    i32::from(summary.entries.iter().any(|e| !e.success))
}

/// Parse arguments, prepare the workspace and dispatch. Returns the process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();

    let settings_path = cli.config.clone().unwrap_or_else(default_settings_path);
    let settings = load_app_settings(&settings_path);

    let layout = cli
        .root
        .clone()
        .or_else(|| settings.workspace_root.clone())
        .map(WorkspaceLayout::new)
        .unwrap_or_default();
    let model = cli.model.unwrap_or(settings.model);

    if let Some(path) = logging::init_logging(cli.verbose, Some(&layout.logs_dir())) {
        info!("Logging to {:?}", path);
    }
    info!("Using settings from {:?}, workspace {:?}", settings_path, layout.root());

    if let Err(e) = initialize_workspace(&layout, &settings) {
        eprintln!("Failed to initialize workspace: {}", e);
        return 2;
    }

    let config = OrchestratorConfig {
        layout: layout.clone(),
        model,
        poll_interval: settings.poll_interval(),
    };

    match &cli.command {
        Command::Train(selection) | Command::Transfer(selection) | Command::Predict { selection, .. } => {
            let items = resolve_items(&layout, selection);
            match cli.command.run_mode() {
                Some(mode) => run_jobs(&cli, config, mode, items),
                None => 2,
            }
        }
        Command::Upload { kind, files, overwrite } => {
            let force = *overwrite || cli.yes;
            match upload_files(&layout, *kind, files, |path| force || confirm_overwrite(path)) {
                Ok(report) => {
                    println!("{}", report.render(*kind));
                    i32::from(!report.failed.is_empty())
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    2
                }
            }
        }
        Command::List => {
            let phenotypes = list_phenotypes(&layout);
            if phenotypes.is_empty() {
                println!("No phenotype files in {}", layout.data_dir(utils::DataKind::Phen).display());
            }
            for phenotype in phenotypes {
                println!("{}", phenotype);
            }
            0
        }
        Command::Download { selection, dest } => {
            let dest = dest.clone().unwrap_or_else(default_download_dir);
            match download_predictions(&layout, &resolve_items(&layout, selection), &dest) {
                Ok(report) => {
                    println!("{}", report.render());
                    i32::from(!report.failed.is_empty())
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    2
                }
            }
        }
    }
}
