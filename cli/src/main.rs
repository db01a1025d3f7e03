mod commands;
mod config;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_dinner_list, cmd_dinner_set, cmd_grocery_refresh, cmd_grocery_show, cmd_grocery_toggle,
    cmd_meal_add, cmd_meal_delete, cmd_meal_edit, cmd_meal_import, cmd_meal_list, cmd_meal_show,
    cmd_pantry_add, cmd_pantry_delete, cmd_pantry_edit, cmd_pantry_list, cmd_pantry_seed,
    cmd_suggest,
};
use crate::config::Config;
use supper_core::service::PlannerService;
use supper_core::suggestions::DEFAULT_SUGGESTION_LIMIT;

#[derive(Parser)]
#[command(
    name = "supper",
    version,
    about = "Plan the week's dinners, build the shopping list, and get meal ideas"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or inspect this week's grocery list
    Grocery {
        #[command(subcommand)]
        command: GroceryCommands,
    },
    /// Suggest meals that reuse what you already have
    Suggest {
        /// Maximum number of suggestions
        #[arg(short, long, default_value_t = DEFAULT_SUGGESTION_LIMIT)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the meal catalog
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Manage pantry items
    Pantry {
        #[command(subcommand)]
        command: PantryCommands,
    },
    /// Plan dinners
    Dinner {
        #[command(subcommand)]
        command: DinnerCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum GroceryCommands {
    /// Rebuild the list from this week's dinners
    Refresh {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the active list
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check or uncheck an item
    Toggle {
        /// Grocery item ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MealCommands {
    /// Add a meal
    Add {
        /// Meal name
        name: String,
        /// Short description
        #[arg(short, long)]
        description: Option<String>,
        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Ingredient as "name" or "name:category" (repeatable)
        #[arg(short, long = "ingredient")]
        ingredients: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all meals
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a meal's details
    Show {
        /// Meal ID or name
        meal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a meal. Tags and ingredients replace the existing ones.
    Edit {
        /// Meal ID or name
        meal: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New description
        #[arg(short, long, conflicts_with = "clear_description")]
        description: Option<String>,
        /// Remove the description
        #[arg(long)]
        clear_description: bool,
        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Option<Vec<String>>,
        /// Ingredient as "name" or "name:category" (repeatable)
        #[arg(short, long = "ingredient")]
        ingredients: Option<Vec<String>>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a meal
    Delete {
        /// Meal ID or name
        meal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import meals from a CSV export
    Import {
        /// Path to the CSV file
        file: PathBuf,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PantryCommands {
    /// Add a pantry item
    Add {
        /// Item name
        name: String,
        /// Category (e.g. pantry, produce, dairy)
        #[arg(short, long, default_value = "pantry")]
        category: String,
        /// Keep it on grocery lists (not always on hand)
        #[arg(long)]
        occasional: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List pantry items
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a pantry item
    Edit {
        /// Pantry item ID
        id: i64,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New category
        #[arg(short, long)]
        category: Option<String>,
        /// Whether the item is always on hand
        #[arg(long)]
        always_on_hand: Option<bool>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a pantry item
    Delete {
        /// Pantry item ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add the usual staples (salt, pepper, olive oil, garlic, butter)
    Seed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum DinnerCommands {
    /// Set the dinner for a date, replacing any existing one
    Set {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: String,
        /// What's for dinner; matched against meal names
        title: String,
        /// Optional notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List this week's dinners
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = PlannerService::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;

    let result = match cli.command {
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?)
            };
            return server::start_server(svc, port, &bind, api_key, Config::webhook_secret())
                .await;
        }
        Commands::Grocery { command } => run_grocery(&svc, command),
        Commands::Suggest { limit, json } => cmd_suggest(&svc, limit, json),
        Commands::Meal { command } => run_meal(&svc, command),
        Commands::Pantry { command } => run_pantry(&svc, command),
        Commands::Dinner { command } => run_dinner(&svc, command),
    };
    svc.close().context("Failed to close database")?;
    result
}

fn run_grocery(svc: &PlannerService, command: GroceryCommands) -> Result<()> {
    match command {
        GroceryCommands::Refresh { json } => cmd_grocery_refresh(svc, json),
        GroceryCommands::Show { json } => cmd_grocery_show(svc, json),
        GroceryCommands::Toggle { id, json } => cmd_grocery_toggle(svc, id, json),
    }
}

fn run_meal(svc: &PlannerService, command: MealCommands) -> Result<()> {
    match command {
        MealCommands::Add {
            name,
            description,
            tags,
            ingredients,
            json,
        } => cmd_meal_add(svc, name, description, tags, &ingredients, json),
        MealCommands::List { json } => cmd_meal_list(svc, json),
        MealCommands::Show { meal, json } => cmd_meal_show(svc, &meal, json),
        MealCommands::Edit {
            meal,
            name,
            description,
            clear_description,
            tags,
            ingredients,
            json,
        } => cmd_meal_edit(
            svc,
            &meal,
            name,
            description,
            clear_description,
            tags,
            ingredients,
            json,
        ),
        MealCommands::Delete { meal, json } => cmd_meal_delete(svc, &meal, json),
        MealCommands::Import {
            file,
            dry_run,
            json,
        } => cmd_meal_import(svc, &file, dry_run, json),
    }
}

fn run_pantry(svc: &PlannerService, command: PantryCommands) -> Result<()> {
    match command {
        PantryCommands::Add {
            name,
            category,
            occasional,
            json,
        } => cmd_pantry_add(svc, name, category, occasional, json),
        PantryCommands::List { json } => cmd_pantry_list(svc, json),
        PantryCommands::Edit {
            id,
            name,
            category,
            always_on_hand,
            json,
        } => cmd_pantry_edit(svc, id, name, category, always_on_hand, json),
        PantryCommands::Delete { id, json } => cmd_pantry_delete(svc, id, json),
        PantryCommands::Seed { json } => cmd_pantry_seed(svc, json),
    }
}

fn run_dinner(svc: &PlannerService, command: DinnerCommands) -> Result<()> {
    match command {
        DinnerCommands::Set {
            date,
            title,
            notes,
            json,
        } => cmd_dinner_set(svc, date, title, notes, json),
        DinnerCommands::List { json } => cmd_dinner_list(svc, json),
    }
}
