use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    load_settings, AddOutcome, ControllerError, ControllerEvent, ExtensionSetController,
    ExtensionView,
};
use tokio::sync::broadcast;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Manage the file extensions blocked from upload")]
struct Cli {
    /// Settings file; defaults to ./blocklist.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Extension store collection url, overriding the settings file.
    #[arg(long)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show fixed checkboxes and custom tags.
    List,
    /// Register a custom extension.
    Add { extension: String },
    /// Remove a custom extension.
    Remove { extension: String },
    /// Check or uncheck a fixed extension.
    Fixed { extension: String, state: Toggle },
    /// Test whether a file could be uploaded.
    Check { filename: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    let controller = ExtensionSetController::from_settings(&settings)
        .with_context(|| format!("invalid extension store url '{}'", settings.base_url))?;
    let mut events = controller.subscribe_events();

    if let Err(err) = controller.load_snapshot().await {
        debug!(%err, "continuing with an empty blocklist");
    }

    let result = match cli.command {
        Command::List => Ok(()),
        Command::Add { extension } => match controller.add_custom(&extension).await {
            Ok(AddOutcome::Added(name)) => {
                println!("added '{name}'");
                Ok(())
            }
            Ok(AddOutcome::Unlisted(_)) | Ok(AddOutcome::Ignored) => Ok(()),
            Err(err) => Err(err),
        },
        Command::Remove { extension } => controller.remove_custom(&extension).await,
        Command::Fixed { extension, state } => {
            controller
                .set_fixed_membership(&extension, matches!(state, Toggle::On))
                .await
        }
        Command::Check { filename } => {
            let checked = controller.check_file_against_blocklist(&filename).await;
            if checked.is_ok() {
                println!("'{filename}' may be uploaded");
            }
            checked
        }
    };

    let shown = print_events(&mut events);
    if let Err(err) = &result {
        if !surfaced_as_notice(err) || shown == 0 {
            eprintln!("error: {err}");
        }
    }
    print!("{}", render(&controller.view().await));

    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Prints notices; returns how many were shown.
fn print_events(events: &mut broadcast::Receiver<ControllerEvent>) -> usize {
    let mut shown = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            ControllerEvent::Notice(text) => {
                eprintln!("! {text}");
                shown += 1;
            }
            ControllerEvent::SelectionCleared => eprintln!("file selection cleared"),
            other => debug!(?other, "controller event"),
        }
    }
    shown
}

fn surfaced_as_notice(err: &ControllerError) -> bool {
    !matches!(
        err,
        ControllerError::InitialLoad(_)
            | ControllerError::UnknownFixedExtension(_)
            | ControllerError::NotRegistered(_)
    )
}

fn render(view: &ExtensionView) -> String {
    let checkboxes: Vec<String> = view
        .checkboxes
        .iter()
        .map(|(name, checked)| format!("[{}] {name}", if *checked { 'x' } else { ' ' }))
        .collect();
    let tags: Vec<&str> = view.tags.iter().map(|name| name.as_str()).collect();
    format!(
        "fixed:  {}\ncustom ({}): {}\n",
        checkboxes.join("  "),
        view.count_display,
        if tags.is_empty() {
            "-".to_string()
        } else {
            tags.join(", ")
        }
    )
}
