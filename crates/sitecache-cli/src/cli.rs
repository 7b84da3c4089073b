//! Command-line argument definitions.

use clap::{Parser, Subcommand};

use sitecache_core::models::Priority;
use sitecache_core::sync::Route;

#[derive(Parser, Debug)]
#[command(
    name = "sitecache",
    version,
    about = "Read a personal site's data from local cache, reconciling with the server in the background"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Site API base URL (overrides config and SITECACHE_API_URL).
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show what is cached and how fresh it is.
    Status,

    /// Check versions now and refetch whatever changed.
    Sync {
        /// Refetch everything, ignoring debounce and versions.
        #[arg(long)]
        force: bool,
    },

    /// Simulate a page transition and run the reconciliation it triggers.
    Navigate {
        /// Page the visitor is on (e.g. `/`, `/todo`).
        from: Route,
        /// Page the visitor goes to.
        to: Route,
    },

    /// Todo list.
    #[command(subcommand)]
    Todos(TodoCommand),

    /// Profile card and timeline.
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Site configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// GitHub projects.
    #[command(subcommand)]
    Projects(ProjectCommand),
}

#[derive(Subcommand, Debug)]
pub enum TodoCommand {
    /// List cached todos.
    List,
    /// Create a todo.
    Add {
        text: String,
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
        #[arg(short, long, default_value = "other")]
        category: String,
    },
    /// Flip a todo's completed state.
    Toggle { id: String },
    /// Delete a todo.
    Remove { id: String },
    /// Delete every completed todo.
    ClearCompleted,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Print the cached profile.
    Show,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Store a GitHub token on the server.
    SetToken { token: String },
    /// Remove the stored GitHub token.
    DeleteToken,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Refresh the project list if stale.
    Refresh {
        /// Fetch even if the cached list is fresh.
        #[arg(long)]
        force: bool,
    },
    /// Drop the cached project list.
    Clear,
}
