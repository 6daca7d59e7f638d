//! Command line client for the task service.
//!
//! Usage:
//!   todo-sync list [--category Personal]
//!   todo-sync add Personal Buy milk
//!   todo-sync done 1a2b
//!   todo-sync clear-completed personal

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};

use todo_sync::client::{FileStore, HttpTaskApi, TaskBoard};
use todo_sync::config::{ClientConfig, LogFormat};
use todo_sync::domain::{Category, Task, TaskId};
use todo_sync::telemetry::init_tracing;

/// Length of the id prefix shown in listings.
const SHORT_ID_LENGTH: usize = 8;

#[derive(Parser)]
#[command(name = "todo-sync")]
#[command(about = "Personal and professional task lists, synced with a task server")]
struct Cli {
    /// Base URL of the task API
    #[arg(long, global = true, env = "TODO_API_URL")]
    api_url: Option<String>,

    /// Directory for the local copy and pending changes
    #[arg(long, global = true, env = "TODO_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show tasks
    List {
        /// Only show one category
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,
    },
    /// Add a task
    Add {
        #[arg(value_parser = parse_category)]
        category: Category,
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,
    },
    /// Mark a task as completed
    Done { id: String },
    /// Mark a task as not completed
    Undo { id: String },
    /// Replace the description of a task
    Edit {
        id: String,
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,
    },
    /// Delete a task
    Rm { id: String },
    /// Delete every completed task in a category
    ClearCompleted {
        #[arg(value_parser = parse_category)]
        category: Category,
    },
    /// Send pending changes and refresh from the server
    Sync,
}

/// Accepts category names in any letter case.
fn parse_category(value: &str) -> Result<Category, String> {
    Category::ALL
        .into_iter()
        .find(|category| category.as_str().eq_ignore_ascii_case(value.trim()))
        .ok_or_else(|| format!("expected one of: Personal, Professional (got '{value}')"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("todo_sync=warn", LogFormat::Pretty);

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("Invalid client configuration")?;
    if let Some(api_url) = cli.api_url {
        config.api_base_url = api_url.trim_end_matches('/').to_string();
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let api = Arc::new(HttpTaskApi::new(
        config.api_base_url.clone(),
        config.request_timeout,
    ));
    let store = Arc::new(FileStore::new(config.data_dir.clone()));

    let mut board = TaskBoard::new(api, store);
    board.mount().await;

    let result = execute(&mut board, cli.command).await;

    board.settle().await;
    let pending = board.pending_sync();
    board.shutdown().await;

    result?;
    if pending > 0 {
        println!("{pending} change(s) waiting to sync with {}", config.api_base_url);
    }
    Ok(())
}

async fn execute(board: &mut TaskBoard, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::List { category } => print_board(board, category),
        Commands::Add {
            category,
            description,
        } => {
            let id = board.add_task(&description.join(" "), category)?;
            println!("Added {}", short_id(&id));
        }
        Commands::Done { id } => {
            let id = resolve_id(board, &id)?;
            board.set_completed(&id, true);
            println!("Completed {}", short_id(&id));
        }
        Commands::Undo { id } => {
            let id = resolve_id(board, &id)?;
            board.set_completed(&id, false);
            println!("Reopened {}", short_id(&id));
        }
        Commands::Edit { id, description } => {
            let id = resolve_id(board, &id)?;
            board.edit_description(&id, &description.join(" "))?;
            println!("Updated {}", short_id(&id));
        }
        Commands::Rm { id } => {
            let id = resolve_id(board, &id)?;
            board.delete_task(&id);
            println!("Deleted {}", short_id(&id));
        }
        Commands::ClearCompleted { category } => {
            let removed = board.clear_completed(category);
            println!("Cleared {removed} completed {category} task(s)");
        }
        Commands::Sync => {
            let report = board.flush().await;
            board.reload().await;
            println!(
                "Sent {} change(s), {} rejected, {} still pending",
                report.replayed, report.dropped, report.pending
            );
            print_board(board, None);
        }
    }
    Ok(())
}

/// Finds the single task whose id starts with `prefix`.
fn resolve_id(board: &TaskBoard, prefix: &str) -> anyhow::Result<TaskId> {
    let prefix = prefix.trim().to_lowercase();
    if prefix.is_empty() {
        bail!("Task id must not be empty");
    }

    let mut matches = board
        .tasks()
        .iter()
        .filter(|task| task.id.to_string().starts_with(&prefix));

    match (matches.next(), matches.next()) {
        (Some(task), None) => Ok(task.id.clone()),
        (None, _) => bail!("No task matches '{prefix}'"),
        (Some(_), Some(_)) => bail!("'{prefix}' matches more than one task, use a longer prefix"),
    }
}

fn short_id(id: &TaskId) -> String {
    id.to_string().chars().take(SHORT_ID_LENGTH).collect()
}

fn print_board(board: &TaskBoard, only: Option<Category>) {
    let categories: Vec<Category> =
        only.map_or_else(|| Category::ALL.to_vec(), |category| vec![category]);

    for category in categories {
        println!(
            "{category} ({}/{} done)",
            board.completed_count(category),
            board.count(category)
        );
        let tasks: Vec<&Task> = board.tasks_in(category).collect();
        if tasks.is_empty() {
            println!("  (no tasks)");
        }
        for task in tasks {
            let mark = if task.completed { 'x' } else { ' ' };
            println!("  [{mark}] {}  {}", short_id(&task.id), task.description);
        }
    }
}
