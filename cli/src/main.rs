mod commands;
mod config;
mod demo;
mod rest;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::process;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    DropEdge, cmd_amount, cmd_clear, cmd_duplicate, cmd_eat, cmd_move, cmd_remove, cmd_show,
    cmd_window,
};
use crate::config::Config;
use crate::demo::demo_api;
use crate::rest::RestPlanApi;
use platter_core::api::MealPlanApi;

#[derive(Parser)]
#[command(
    name = "platter",
    version,
    about = "A meal planner CLI: browse planned days and rearrange meals"
)]
struct Cli {
    /// Meal plan API base URL (overrides config.json)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// User whose plan to load (overrides config.json)
    #[arg(long, global = true)]
    user: Option<String>,
    /// Use a built-in sample plan instead of the API. Nothing is saved.
    #[arg(long, global = true)]
    demo: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the meals planned for a day (defaults to today)
    Show {
        /// Date to show (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the viewing window around a day, optionally after stepping through it
    Window {
        /// Date the window starts on (default: today)
        date: Option<String>,
        /// Number of one-day steps to take
        #[arg(short, long, default_value = "0")]
        steps: usize,
        /// Step backwards instead of forwards
        #[arg(long)]
        back: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a meal item, like dragging it to a new position
    Move {
        /// Item to move as "date:slot:index" (e.g. "today:lunch:0")
        from: String,
        /// Drop target as "date:slot:index", or "date:slot" to append
        to: String,
        /// Which edge of the target item to drop on (default: top)
        #[arg(long, value_enum)]
        edge: Option<DropEdge>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the amount (and optionally the unit) of a meal item
    Amount {
        /// Meal as "date:slot"
        meal: String,
        /// Item ID (or a unique prefix of it)
        item_id: String,
        /// New amount in the item's unit
        amount: f64,
        /// Unit index from the food's unit list (default: keep current unit)
        #[arg(short, long)]
        unit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a meal item
    Remove {
        /// Item as "date:slot:index"
        item: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Duplicate a meal item directly below itself
    Duplicate {
        /// Item as "date:slot:index"
        item: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a meal item as eaten
    Eat {
        /// Meal as "date:slot"
        meal: String,
        /// Item ID (or a unique prefix of it)
        item_id: String,
        /// Mark as not eaten instead
        #[arg(long)]
        undo: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear a whole day, or one meal of it
    Clear {
        /// "date" or "date:slot"
        target: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PLATTER_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?.with_overrides(cli.api_url, cli.user);
    config.validate()?;
    debug!(api_url = %config.api_url, user = %config.user_id, demo = cli.demo, "starting");
    let api: Arc<dyn MealPlanApi> = if cli.demo {
        Arc::new(demo_api(Local::now().date_naive()))
    } else {
        Arc::new(RestPlanApi::new(&config)?)
    };

    match cli.command {
        Commands::Show { date, json } => cmd_show(&config, api, date, json).await,
        Commands::Window {
            date,
            steps,
            back,
            json,
        } => cmd_window(&config, api, date, steps, back, json).await,
        Commands::Move {
            from,
            to,
            edge,
            json,
        } => cmd_move(&config, api, &from, &to, edge, json).await,
        Commands::Amount {
            meal,
            item_id,
            amount,
            unit,
            json,
        } => cmd_amount(&config, api, &meal, &item_id, amount, unit, json).await,
        Commands::Remove { item, json } => cmd_remove(&config, api, &item, json).await,
        Commands::Duplicate { item, json } => cmd_duplicate(&config, api, &item, json).await,
        Commands::Eat {
            meal,
            item_id,
            undo,
            json,
        } => cmd_eat(&config, api, &meal, &item_id, undo, json).await,
        Commands::Clear { target, json } => cmd_clear(&config, api, &target, json).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_move_with_edge() {
        let cli = Cli::try_parse_from([
            "platter",
            "move",
            "today:lunch:0",
            "today:dinner:1",
            "--edge",
            "bottom",
            "--demo",
        ])
        .unwrap();
        assert!(cli.demo);
        match cli.command {
            Commands::Move { from, to, edge, .. } => {
                assert_eq!(from, "today:lunch:0");
                assert_eq!(to, "today:dinner:1");
                assert_eq!(edge, Some(DropEdge::Bottom));
            }
            _ => panic!("expected move"),
        }
    }

    #[test]
    fn test_parse_amount_with_unit() {
        let cli = Cli::try_parse_from([
            "platter",
            "--user",
            "alex",
            "amount",
            "2024-06-15:lunch",
            "0f8c",
            "2.5",
            "--unit",
            "1",
        ])
        .unwrap();
        assert_eq!(cli.user.as_deref(), Some("alex"));
        match cli.command {
            Commands::Amount {
                amount, unit, json, ..
            } => {
                assert!((amount - 2.5).abs() < f64::EPSILON);
                assert_eq!(unit, Some(1));
                assert!(!json);
            }
            _ => panic!("expected amount"),
        }
    }
}
