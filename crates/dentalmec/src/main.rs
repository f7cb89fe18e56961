//! Maintenance tool for the order database.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use dentalmec::db::order_repo::OrderFilter;
use dentalmec::db::{default_database_path, user_repo};
use dentalmec::sanitize::mask_email;
use dentalmec::{
    load_config, Actor, Config, Database, FileService, FileStorage, OrderService, OrderStatus,
    SystemClock,
};

#[derive(Parser, Debug)]
#[command(name = "dentalmec", about = "Order management for the dental workshop", version)]
struct Cli {
    /// JSON config file; built-in defaults are used when omitted
    #[arg(short, long, env = "DENTALMEC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Override the database location from the config
    #[arg(long, env = "DENTALMEC_DB", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database and apply pending migrations
    InitDb,

    /// Print one order with its history
    Show {
        reference: String,

        /// Id or e-mail of the user performing the lookup
        #[arg(long)]
        actor: String,
    },

    /// List orders
    List {
        #[arg(long)]
        actor: String,

        #[arg(long)]
        status: Option<OrderStatus>,

        /// Match on reference, client name or e-mail
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value = "50")]
        limit: u64,
    },

    /// Change the status of an order
    SetStatus {
        reference: String,
        status: OrderStatus,

        #[arg(long)]
        notes: Option<String>,

        /// Id or e-mail of the staff member making the change
        #[arg(long)]
        actor: String,
    },

    /// Delete unconfirmed drafts older than the TTL
    ReapDrafts {
        /// Defaults to `wizard.draftTtlHours` from the config
        #[arg(long)]
        ttl_hours: Option<u32>,
    },

    /// Remove stale download copies from the temp directory
    CleanupTemp {
        #[arg(long, default_value = "3600")]
        max_age_secs: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    dentalmec::logging::init_logging(&config.log)?;

    let db_path = cli
        .database
        .clone()
        .or_else(|| config.database_path.clone())
        .or_else(default_database_path)
        .context("No database path configured and no home directory found")?;
    let db = Database::open(&db_path)?;

    let config = Arc::new(config);
    let clock = Arc::new(SystemClock);
    let storage = Arc::new(FileStorage::new(
        &config.upload_directory,
        &config.temp_directory,
    ));
    let files = FileService::new(db.clone(), storage.clone(), config.uploads.clone(), clock.clone());
    let orders = OrderService::new(db.clone(), config.clone(), clock, files);

    match cli.command {
        Commands::InitDb => {
            println!("Database ready at {}", db_path.display());
        }
        Commands::Show { reference, actor } => {
            let actor = resolve_actor(&db, &actor)?;
            let order = orders.find_by_reference(&actor, &reference)?;
            let view = orders.order_details(&actor, order.id)?;
            let o = &view.order;
            println!("#{}  {}  {}", o.reference_number, o.process_type, o.status.label());
            println!("  estimated completion: {}", o.estimated_completion_date);
            if let Some(done) = o.completion_date {
                println!("  completed:            {}", done.format("%Y-%m-%d %H:%M"));
            }
            for (label, value) in [
                ("material", &o.material),
                ("color", &o.color),
                ("observations", &o.observations),
            ] {
                if let Some(value) = value {
                    println!("  {}: {}", label, value);
                }
            }
            println!("  files: {}", view.files.len());
            for file in &view.files {
                println!("    {} ({} bytes)", file.stored_name, file.file_size);
            }
            println!("  history:");
            for entry in &view.history {
                println!(
                    "    {}  {:<10} {}",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.status.as_str(),
                    entry.notes.as_deref().unwrap_or("")
                );
            }
        }
        Commands::List {
            actor,
            status,
            search,
            limit,
        } => {
            let actor = resolve_actor(&db, &actor)?;
            let filter = OrderFilter {
                status,
                search,
                limit: Some(limit),
                ..Default::default()
            };
            let page = orders.list_orders(&actor, &filter)?;
            for summary in &page.orders {
                println!(
                    "{}  {:<10} {:<10} {:<24} files={}",
                    summary.order.reference_number,
                    summary.order.process_type.as_str(),
                    summary.order.status.as_str(),
                    summary.owner_name,
                    summary.file_count
                );
            }
            println!("{} of {} orders", page.orders.len(), page.total);
            if actor.is_staff() {
                for (status, count) in orders.status_counts(&actor)? {
                    println!("  {:<10} {}", status.as_str(), count);
                }
            }
        }
        Commands::SetStatus {
            reference,
            status,
            notes,
            actor,
        } => {
            let actor = resolve_actor(&db, &actor)?;
            let order = orders.find_by_reference(&actor, &reference)?;
            let record = orders.update_status(&actor, order.id, status, notes.as_deref())?;
            println!(
                "#{}: {} -> {}",
                record.reference_number,
                record.previous_status.as_str(),
                record.status.as_str()
            );
        }
        Commands::ReapDrafts { ttl_hours } => {
            let hours = ttl_hours.unwrap_or(config.wizard.draft_ttl_hours);
            let removed = orders.reap_stale_drafts(chrono::Duration::hours(i64::from(hours)))?;
            println!("Removed {} stale drafts", removed);
        }
        Commands::CleanupTemp { max_age_secs } => {
            let removed = storage.cleanup_temporary(StdDuration::from_secs(max_age_secs))?;
            println!("Removed {} temporary files", removed);
        }
    }

    Ok(())
}

fn resolve_actor(db: &Database, actor: &str) -> anyhow::Result<Actor> {
    let user = db
        .with_conn(|conn| match actor.parse::<i64>() {
            Ok(id) => user_repo::find_by_id(conn, id),
            Err(_) => user_repo::find_by_email(conn, actor),
        })?
        .with_context(|| format!("User {} does not exist", actor))?;
    if !user.active {
        bail!("User {} is deactivated", actor);
    }
    tracing::info!(
        user_id = user.id,
        email = %mask_email(&user.email),
        role = %user.role,
        "Acting user resolved"
    );
    Ok(user.actor())
}
