//! parse-schema CLI
//!
//! Pulls, pushes and drops Parse Server class schemas and generates TypeScript definitions.

use clap::{Parser, Subcommand};
use parse_schema_sync::config::Operation;
use parse_schema_sync::reconcile::ReconcileReport;
use parse_schema_sync::sync::{self, DeleteOptions, DownOptions, UpOptions};
use parse_schema_sync::typescript::load_custom_class_field_types;
use parse_schema_sync::{
    FailurePolicy, ParseClient, ParseError, ReconcileOptions, SyncConfig, TypescriptOptions,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "parse-schema")]
#[command(about = "Sync Parse Server class schemas with local JSON files")]
struct Cli {
    /// Path to a JSON config file (publicServerURL, appId, masterKey)
    #[arg(long, global = true)]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the schema from the server and write it to local files
    Down {
        /// Directory of per-class files, or a single `.json` file
        #[arg(default_value = parse_schema_sync::store::DEFAULT_SCHEMA_PATH)]
        schema_path: PathBuf,
        /// Only pull classes with this prefix and remove it locally
        #[arg(long)]
        prefix: Option<String>,
        /// Class names to skip (`Name`, `Prefix*` or `*Suffix`)
        #[arg(long, num_args = 1..)]
        ignore: Vec<String>,
    },

    /// Apply the local schema to the server
    Up {
        #[arg(default_value = parse_schema_sync::store::DEFAULT_SCHEMA_PATH)]
        schema_path: PathBuf,
        /// Push classes with this prefix and only touch prefixed remote classes
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long, num_args = 1..)]
        ignore: Vec<String>,
        /// Never delete classes or fields
        #[arg(long)]
        safe: bool,
        /// Delete all objects of a class before dropping it
        #[arg(long)]
        delete_non_empty_class: bool,
        /// Go on with the next class when a request fails
        #[arg(long)]
        continue_on_error: bool,
        /// Print the changes without applying them
        #[arg(long)]
        dry_run: bool,
    },

    /// Drop the classes of the local schema from the server
    Delete {
        #[arg(default_value = parse_schema_sync::store::DEFAULT_SCHEMA_PATH)]
        schema_path: PathBuf,
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        delete_non_empty_class: bool,
    },

    /// Generate TypeScript definitions from the server schema
    Typescript {
        /// Output directory
        #[arg(default_value = "schema/typescript")]
        out_path: PathBuf,
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long, num_args = 1..)]
        ignore: Vec<String>,
        /// Generate these classes even outside the prefix
        #[arg(long, num_args = 1..)]
        include: Vec<String>,
        /// Emit plain JSON shapes instead of Parse SDK types
        #[arg(long)]
        no_sdk: bool,
        /// Emit type aliases instead of Parse.Object subclasses
        #[arg(long)]
        no_class: bool,
        /// Use the global Parse object instead of importing it
        #[arg(long)]
        global_sdk: bool,
        /// Use `.js` extensions in imports
        #[arg(long)]
        esm: bool,
        /// JSON file with custom field types, overriding the config's
        #[arg(long)]
        custom_class_field_types_config: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}

impl Commands {
    fn operation(&self) -> Operation {
        match self {
            Commands::Down { .. } => Operation::Down,
            Commands::Up { .. } => Operation::Up,
            _ => Operation::Other,
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `false` when some classes failed under `--continue-on-error`.
async fn run(cli: Cli) -> Result<bool, ParseError> {
    let config = SyncConfig::load(cli.config_path.as_deref(), cli.command.operation())?;
    let client = ParseClient::from_config(&config)?;

    match cli.command {
        Commands::Down {
            schema_path,
            prefix,
            ignore,
        } => {
            let schemas =
                sync::down(&client, &schema_path, &DownOptions { prefix, ignore }).await?;
            println!(
                "Pulled {} classes into {}",
                schemas.len(),
                schema_path.display()
            );
            Ok(true)
        }

        Commands::Up {
            schema_path,
            prefix,
            ignore,
            safe,
            delete_non_empty_class,
            continue_on_error,
            dry_run,
        } => {
            let mut reconcile = if safe {
                ReconcileOptions::safe()
            } else {
                ReconcileOptions::default()
            };
            reconcile.delete_non_empty_class = delete_non_empty_class;
            if continue_on_error {
                reconcile.failure_policy = FailurePolicy::Continue;
            }
            let options = UpOptions {
                prefix,
                ignore,
                reconcile,
            };

            if dry_run {
                let plan = sync::plan_up(&client, &schema_path, &options).await?;
                if plan.is_empty() {
                    println!("No changes");
                }
                for step in plan.steps() {
                    println!("  {}", step);
                }
                return Ok(true);
            }

            let report = sync::up(&client, &schema_path, &options).await?;
            Ok(print_report(&report))
        }

        Commands::Delete {
            schema_path,
            prefix,
            delete_non_empty_class,
        } => {
            let options = DeleteOptions {
                prefix,
                delete_non_empty_class,
                ..DeleteOptions::default()
            };
            let report = sync::delete(&client, &schema_path, &options).await?;
            Ok(print_report(&report))
        }

        Commands::Typescript {
            out_path,
            prefix,
            ignore,
            include,
            no_sdk,
            no_class,
            global_sdk,
            esm,
            custom_class_field_types_config,
        } => {
            let custom_class_field_types = match custom_class_field_types_config {
                Some(path) => load_custom_class_field_types(&path).await?,
                None => config.custom_class_field_types.clone(),
            };
            let options = TypescriptOptions {
                prefix,
                ignore,
                include,
                sdk: !no_sdk,
                global_sdk,
                class: !no_class,
                is_esm: esm,
                custom_class_field_types,
            };
            let files = sync::typescript(&client, &out_path, &options).await?;
            println!("Generated {} files in {}", files.len(), out_path.display());
            Ok(true)
        }

        Commands::Config => {
            println!("Server URL:  {}", config.server_url);
            println!("App ID:      {}", config.app_id);
            println!("Master key:  {}", config.masked_master_key());
            println!(
                "Custom class field types: {}",
                config.custom_class_field_types.len()
            );
            Ok(true)
        }
    }
}

fn print_report(report: &ReconcileReport) -> bool {
    for step in &report.applied {
        println!("  ✅ {}", step);
    }
    for failure in &report.failures {
        println!("  ❌ {}: {}", failure.class_name, failure.error);
    }
    if report.applied.is_empty() && report.failures.is_empty() {
        println!("No changes");
    }
    report.is_success()
}
