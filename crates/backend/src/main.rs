//! Meta Achiever job runner
//!
//! Drives library syncs, evaluation, community maintenance and collection
//! progress from the command line or a scheduler.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use meta_achiever_backend::config::{Config, CONFIG_PATH};
use meta_achiever_backend::db::{self, activity, users};
use meta_achiever_backend::error::DbResultExt;
use meta_achiever_backend::steam_api::SteamClient;
use meta_achiever_backend::sync::{sync_user, SyncOptions};
use meta_achiever_backend::{definitions, registry, tracker};
use meta_achiever_core::{
    ActivityKind, CollectionProgress, Condition, ConditionData, MetaAchieverError, NewCollection, NewDefinition,
    Result, User,
};
use rusqlite::Connection;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "meta-achiever", version)]
#[command(about = "Steam meta-achievement tracker")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a user or update their Steam credentials
    AddUser {
        username: String,
        #[arg(long)]
        steam_id: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Sync a user's Steam library
    Sync { username: String },
    /// Evaluate and list a user's achievements
    Definitions { username: String },
    /// Author a new achievement
    CreateDefinition {
        username: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        /// all-games-complete, all-games-owned or total-playtime
        #[arg(long)]
        kind: String,
        /// Comma-separated Steam app ids
        #[arg(long, value_delimiter = ',')]
        games: Vec<String>,
        /// Target hours for total-playtime
        #[arg(long, default_value_t = 0.0)]
        target_hours: f64,
    },
    /// Delete one of a user's achievements
    DeleteDefinition { username: String, definition_id: i64 },
    /// Share an achievement with the community
    Share { username: String, definition_id: i64 },
    /// Withdraw a shared achievement
    Unshare { username: String, definition_id: i64 },
    /// Import a community achievement
    Import { username: String, shared_id: i64 },
    /// Browse community achievements as a user
    Community { username: String },
    /// Remove duplicate shares, keeping the most recent of each
    CleanupDuplicates,
    /// Create a collection owned by a user
    CreateCollection {
        username: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "seasonal")]
        collection_type: String,
        #[arg(long, default_value = "medium")]
        difficulty: String,
        #[arg(long)]
        featured: bool,
        /// Start of the active window, RFC 3339
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// End of the active window, RFC 3339
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },
    /// Retire a collection from the current listing
    RetireCollection {
        collection_id: i64,
        /// Make a retired collection active again
        #[arg(long)]
        restore: bool,
    },
    /// Add a shared achievement to a collection
    AddCollectionItem {
        collection_id: i64,
        shared_id: i64,
        #[arg(long, default_value_t = 0)]
        order: i32,
        #[arg(long, default_value_t = 10)]
        points: i64,
        #[arg(long)]
        optional: bool,
    },
    /// List collections
    Collections {
        /// Only collections active right now
        #[arg(long)]
        current: bool,
    },
    /// Recompute a user's progress in a collection
    CollectionProgress {
        username: String,
        collection_id: i64,
        /// Join the collection first if needed
        #[arg(long)]
        join: bool,
    },
    /// Recompute every collection a user has joined
    RefreshCollections { username: String },
    /// Show recent activity
    Feed {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        include_private: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "meta_achiever_backend=info,meta_achiever=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env(&cli.config)?;
    if config.steam_api_key.is_none() {
        tracing::warn!("STEAM_API_KEY not set - users need their own key to sync");
    }

    let mut conn = db::open_connection(&config.database_path).db_err()?;
    tracing::info!(path = %config.database_path.display(), "Opened database");

    match cli.command {
        Command::AddUser { username, steam_id, api_key } => {
            let id = users::save_user(&conn, &username, steam_id.as_deref(), api_key.as_deref()).db_err()?;
            println!("User {} has id {}", username, id);
        }
        Command::Sync { username } => {
            let user = find_user(&conn, &username)?;
            let options = SyncOptions::from(&config.sync);
            let client = SteamClient::new(options.request_timeout)?;
            let report = sync_user(&mut conn, &client, user.id, config.steam_api_key.as_deref(), &options).await?;
            println!("{}", report.summary());
            for failure in &report.failed_batches {
                println!("  failed: {}", failure);
            }
        }
        Command::Definitions { username } => {
            let user = find_user(&conn, &username)?;
            let evaluated = definitions::evaluate_definitions(&mut conn, user.id)?;
            if evaluated.is_empty() {
                println!("{} has no achievements yet", user.username);
            }
            for item in evaluated {
                let def = &item.definition;
                let mark = if item.evaluation.complete { "x" } else { " " };
                println!("[{}] #{} {} ({:.2}%)", mark, def.id, def.name, item.evaluation.progress);
                println!("      {}", item.game_names.join(", "));
                if let Some(provenance) = &def.provenance {
                    println!("      imported from {}", provenance.original_creator);
                }
                if item.newly_completed {
                    println!("      unlocked just now!");
                }
            }
        }
        Command::CreateDefinition { username, name, description, kind, games, target_hours } => {
            let user = find_user(&conn, &username)?;
            let condition = Condition::from_parts(&kind, ConditionData { games, playtime_target: target_hours });
            if condition.kind().is_none() {
                return Err(MetaAchieverError::InvalidData(format!("unknown condition kind '{}'", kind)));
            }
            let def = definitions::create_definition(
                &conn,
                user.id,
                NewDefinition { name, description, condition, image: None },
            )?;
            println!("Created achievement #{} {}", def.id, def.name);
        }
        Command::DeleteDefinition { username, definition_id } => {
            let user = find_user(&conn, &username)?;
            definitions::delete_definition(&conn, user.id, definition_id)?;
            println!("Deleted achievement #{}", definition_id);
        }
        Command::Share { username, definition_id } => {
            let user = find_user(&conn, &username)?;
            println!("{}", registry::share_definition(&conn, user.id, definition_id)?.notice());
        }
        Command::Unshare { username, definition_id } => {
            let user = find_user(&conn, &username)?;
            println!("{}", registry::unshare_definition(&conn, user.id, definition_id)?.notice());
        }
        Command::Import { username, shared_id } => {
            let user = find_user(&conn, &username)?;
            println!("{}", registry::import_shared(&mut conn, user.id, shared_id)?.notice());
        }
        Command::Community { username } => {
            let user = find_user(&conn, &username)?;
            for entry in registry::community_listing(&conn, user.id)? {
                let s = &entry.shared;
                println!(
                    "#{} {} by {} - {} tries, {} completions, {:.2}% compatible{}",
                    s.id,
                    s.name,
                    s.creator_name,
                    s.tries_count,
                    s.completions_count,
                    entry.compatibility,
                    if entry.already_imported { " (imported)" } else { "" }
                );
                println!("      {}", entry.game_names.join(", "));
            }
        }
        Command::CleanupDuplicates => {
            let report = registry::cleanup_duplicate_shares(&mut conn)?;
            for group in &report.groups {
                println!(
                    "{} / \"{}\": kept #{}, removed {:?}",
                    group.creator_name, group.name, group.kept_id, group.removed_ids
                );
            }
            println!("Removed {} duplicate shares", report.removed);
        }
        Command::CreateCollection { username, name, description, collection_type, difficulty, featured, start, end } => {
            let user = find_user(&conn, &username)?;
            let collection = tracker::create_collection(
                &conn,
                &NewCollection {
                    name,
                    description,
                    collection_type,
                    difficulty,
                    is_featured: featured,
                    start_date: start,
                    end_date: end,
                    created_by: user.id,
                },
            )?;
            println!("Created collection #{} {}", collection.id, collection.name);
        }
        Command::RetireCollection { collection_id, restore } => {
            let collection = tracker::set_collection_active(&conn, collection_id, restore)?;
            let state = if collection.is_active { "active" } else { "retired" };
            println!("Collection #{} {} is {}", collection.id, collection.name, state);
        }
        Command::AddCollectionItem { collection_id, shared_id, order, points, optional } => {
            let item = tracker::add_collection_item(&conn, collection_id, shared_id, order, !optional, points)?;
            println!("Added item #{} to collection #{}", item.id, collection_id);
        }
        Command::Collections { current } => {
            for c in tracker::list_collections(&conn, current)? {
                println!(
                    "#{} {} [{} / {}] {} participants, {} completions",
                    c.id, c.name, c.collection_type, c.difficulty, c.participants_count, c.completions_count
                );
            }
        }
        Command::CollectionProgress { username, collection_id, join } => {
            let user = find_user(&conn, &username)?;
            let progress = if join {
                tracker::join_collection(&mut conn, user.id, collection_id)?
            } else {
                tracker::recompute_collection_progress(&mut conn, user.id, collection_id)?
            };
            print_progress(&progress);
        }
        Command::RefreshCollections { username } => {
            let user = find_user(&conn, &username)?;
            let refreshed = tracker::refresh_joined_collections(&mut conn, user.id)?;
            if refreshed.is_empty() {
                println!("{} has not joined any collections", user.username);
            }
            for progress in &refreshed {
                print!("#{} ", progress.collection_id);
                print_progress(progress);
            }
        }
        Command::Feed { limit, user, kind, include_private } => {
            let user_id = match user {
                Some(name) => Some(find_user(&conn, &name)?.id),
                None => None,
            };
            let kind = match kind {
                Some(tag) => Some(
                    ActivityKind::parse(&tag)
                        .ok_or_else(|| MetaAchieverError::InvalidData(format!("unknown activity kind '{}'", tag)))?,
                ),
                None => None,
            };
            let filter = activity::FeedFilter { user_id, kind, include_private };
            for entry in activity::recent_activities(&conn, limit, &filter).db_err()? {
                println!(
                    "{} {} [{}] {}",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.username,
                    entry.kind.label(),
                    entry.title
                );
            }
        }
    }

    Ok(())
}

fn print_progress(progress: &CollectionProgress) {
    println!(
        "{}: {}/{} achievements ({:.1}%), {}/{} points ({:.1}%)",
        progress.status.as_str(),
        progress.achievements_completed,
        progress.total_achievements,
        progress.completion_percentage(),
        progress.points_earned,
        progress.total_points,
        progress.points_percentage()
    );
}

fn find_user(conn: &Connection, username: &str) -> Result<User> {
    users::get_user_by_name(conn, username)
        .db_err()?
        .ok_or_else(|| MetaAchieverError::NotFound(format!("user '{}'", username)))
}
