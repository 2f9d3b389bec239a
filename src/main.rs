//! HubVault CLI - full auditable snapshots of a GitHub account.
//!
//! Usage:
//!   hv backup                     - Back up the whole account
//!   hv backup --repos a,b         - Back up a named subset (no gists)
//!   hv settings set|get|list|...  - Manage the encrypted settings store
//!   hv profile create|use|...     - Manage settings profiles

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use hubvault::backup::clone::GitCloneExecutor;
use hubvault::{
    BackupOptions, BackupOrchestrator, GitHubClient, NoopReporter, ProgressReporter, RunStatus,
    SettingsStore,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::sync::Arc;

/// HubVault - GitHub account backup
#[derive(Parser)]
#[command(name = "hv")]
#[command(about = "Full auditable snapshots of a GitHub account", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backup (full account, or a subset with --repos)
    Backup {
        /// Comma-separated repository names for a selective run
        #[arg(short, long, value_delimiter = ',')]
        repos: Vec<String>,

        /// GitHub token (falls back to the settings store)
        #[arg(short, long)]
        token: Option<String>,

        /// Backup directory (falls back to the settings store)
        #[arg(short = 'd', long)]
        backup_dir: Option<String>,

        /// Parallel clone workers (falls back to the settings store)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Re-clone into existing destinations instead of failing
        #[arg(long)]
        overwrite: bool,

        /// Run without a progress bar
        #[arg(long)]
        quiet: bool,
    },

    /// Manage tool settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Manage settings profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Set a configuration value
    Set {
        key: String,
        value: String,
        /// Encrypt the value (for sensitive data)
        #[arg(short, long)]
        encrypted: bool,
        /// Description for the setting
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Get a configuration value
    Get { key: String },
    /// List all configuration settings (values are never shown)
    List,
    /// Delete a configuration setting
    Delete { key: String },
    /// Interactive first-run configuration
    Setup,
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Snapshot the current plain settings into a named profile
    Create { name: String },
    /// Show a profile's settings map
    Show { name: String },
    /// Activate a profile (deactivates all others)
    Use { name: String },
    /// Print the active profile name
    Active,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("hubvault={}", log_level).parse()?)
                .add_directive(format!("hv={}", log_level).parse()?),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Backup {
            repos,
            token,
            backup_dir,
            workers,
            overwrite,
            quiet,
        } => cmd_backup(repos, token, backup_dir, workers, overwrite, quiet),
        Commands::Settings { command } => cmd_settings(command),
        Commands::Profile { command } => cmd_profile(command),
    }
}

// ============ BACKUP COMMAND ============

/// Progress bar sink for orchestrator events.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:40.cyan/blue}] {percent:>3}% {msg}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }
}

impl ProgressReporter for BarReporter {
    fn report(&self, _phase: &str, percent: u8, message: &str) {
        self.bar.set_position(u64::from(percent));
        if percent >= 100 {
            self.bar.finish_with_message(message.to_string());
        } else {
            self.bar.set_message(message.to_string());
        }
    }
}

fn cmd_backup(
    repos: Vec<String>,
    token: Option<String>,
    backup_dir: Option<String>,
    workers: Option<usize>,
    overwrite: bool,
    quiet: bool,
) -> Result<()> {
    let store = SettingsStore::open_default()?;

    let token = match token.or(store.github_token()?) {
        Some(token) => token,
        None => anyhow::bail!(
            "GitHub token not provided and not found in settings (run `hv settings setup`)"
        ),
    };
    let backup_dir = match backup_dir {
        Some(dir) => dir.into(),
        None => store.backup_directory()?,
    };
    let workers = match workers {
        Some(workers) => workers.max(1),
        None => store.parallel_workers()?,
    };

    let options = if repos.is_empty() {
        BackupOptions::full(&backup_dir)
    } else {
        BackupOptions::selective(&backup_dir, repos)
    };
    let options = options.with_workers(workers);

    println!("{}", "HubVault Backup".bold().green());
    println!("  Directory: {}", backup_dir.display());
    println!("  Workers:   {}", workers);
    println!();

    let api = Arc::new(GitHubClient::new(&token)?);
    let cloner = Arc::new(GitCloneExecutor::new(&token).with_overwrite(overwrite));
    let reporter: Arc<dyn ProgressReporter> = if quiet {
        Arc::new(NoopReporter)
    } else {
        Arc::new(BarReporter::new()?)
    };

    let manifest = BackupOrchestrator::new(api, cloner, options)
        .with_reporter(reporter)
        .run()
        .context("backup run failed")?;

    println!();
    match manifest.status {
        RunStatus::Completed => println!("{}", "Backup completed successfully!".bold().green()),
        RunStatus::CompletedWithErrors => {
            println!("{}", "Backup completed with errors".bold().yellow());
        }
        RunStatus::Cancelled => println!("{}", "Backup cancelled".bold().red()),
    }
    println!("  Location:     {}", manifest.location);
    println!("  Repositories: {}", manifest.repositories_count);
    println!(
        "  Clones:       {} ok, {} failed",
        manifest.clone_successes, manifest.clone_failures
    );
    if let Some(gists) = manifest.gists_backed_up {
        println!("  Gists:        {}", gists);
    }

    for outcome in manifest.repositories.iter().filter(|o| !o.is_clean()) {
        println!("  {} {}", "!".yellow(), outcome.name);
    }

    Ok(())
}

// ============ SETTINGS COMMANDS ============

fn cmd_settings(command: SettingsCommands) -> Result<()> {
    let store = SettingsStore::open_default()?;

    match command {
        SettingsCommands::Set {
            key,
            value,
            encrypted,
            description,
        } => {
            store.set(&key, &value, encrypted, description.as_deref())?;
            let shown = if encrypted { "<encrypted>" } else { value.as_str() };
            println!("{} Set {} = {}", "✓".green(), key.cyan(), shown);
        }
        SettingsCommands::Get { key } => match store.get(&key)? {
            Some(value) => println!("{} = {}", key.cyan(), value.as_string()),
            None => println!("{}", format!("Setting '{}' not found", key).red()),
        },
        SettingsCommands::List => {
            let infos = store.list()?;
            if infos.is_empty() {
                println!("{}", "No settings configured".yellow());
                return Ok(());
            }
            for info in infos {
                let lock = if info.encrypted { " 🔒" } else { "" };
                println!(
                    "{}{}  {}  (updated {})",
                    info.key.cyan(),
                    lock,
                    info.description.unwrap_or_default().dimmed(),
                    info.updated_at
                );
            }
        }
        SettingsCommands::Delete { key } => {
            if store.delete(&key)? {
                println!("{} Deleted setting '{}'", "✓".green(), key);
            } else {
                println!("{}", format!("Setting '{}' not found", key).red());
            }
        }
        SettingsCommands::Setup => {
            println!("{}", "HubVault Setup".bold().cyan());

            let token = rpassword::prompt_password("GitHub Personal Access Token: ")?;
            store.set_github_token(token.trim())?;
            println!("{} GitHub token saved (encrypted)", "✓".green());

            let dir = prompt_with_default("Default backup directory", "./backups")?;
            store.set_backup_directory(&dir)?;
            println!("{} Backup directory set to {}", "✓".green(), dir);

            let workers = prompt_with_default("Number of parallel workers", "4")?;
            let workers: usize = workers.trim().parse().context("not a number")?;
            store.set_parallel_workers(workers.max(1))?;
            println!("{} Parallel workers set to {}", "✓".green(), workers);

            println!();
            println!("{} Run `hv backup` to start a backup.", "Setup complete!".bold().green());
        }
    }

    Ok(())
}

fn prompt_with_default(label: &str, default: &str) -> Result<String> {
    use std::io::Write;
    print!("{} [{}]: ", label, default);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let line = line.trim();
    Ok(if line.is_empty() {
        default.to_string()
    } else {
        line.to_string()
    })
}

// ============ PROFILE COMMANDS ============

fn cmd_profile(command: ProfileCommands) -> Result<()> {
    let store = SettingsStore::open_default()?;

    match command {
        ProfileCommands::Create { name } => {
            // Snapshot only plain settings; secrets stay out of profiles
            let mut snapshot = BTreeMap::new();
            for info in store.list()? {
                if info.encrypted {
                    continue;
                }
                if let Some(value) = store.get(&info.key)? {
                    snapshot.insert(info.key, value.as_string());
                }
            }
            store.create_profile(&name, &snapshot)?;
            println!(
                "{} Profile '{}' created with {} settings",
                "✓".green(),
                name,
                snapshot.len()
            );
        }
        ProfileCommands::Show { name } => match store.load_profile(&name)? {
            Some(settings) => {
                for (key, value) in settings {
                    println!("{} = {}", key.cyan(), value);
                }
            }
            None => println!("{}", format!("Profile '{}' not found", name).red()),
        },
        ProfileCommands::Use { name } => {
            store.set_active_profile(&name)?;
            // Apply the profile's plain settings back onto the store
            if let Some(settings) = store.load_profile(&name)? {
                for (key, value) in &settings {
                    store.set(key, value, false, None)?;
                }
            }
            println!("{} Active profile: {}", "✓".green(), name);
        }
        ProfileCommands::Active => match store.get_active_profile()? {
            Some(name) => println!("{}", name),
            None => println!("{}", "No active profile".yellow()),
        },
    }

    Ok(())
}
