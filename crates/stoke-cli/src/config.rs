//! CLI arguments and environment variable handling using clap.

use clap::{Parser, Subcommand};

use stoke_core::{Frequency, SessionConfig};
use stoke_store::StoreConfig;

/// stoke - habit tracking over a remote document store
#[derive(Parser, Debug)]
#[command(name = "stoke")]
#[command(about = "Track habits and streaks against a remote document store")]
pub struct Args {
    /// Document store HTTP endpoint
    #[arg(long, env = "STOKE_ENDPOINT", default_value = "http://localhost:8080")]
    pub endpoint: String,

    /// Project id
    #[arg(long, env = "STOKE_PROJECT", default_value = "stoke")]
    pub project: String,

    /// Database id
    #[arg(long, env = "STOKE_DATABASE", default_value = "main")]
    pub database: String,

    /// Authenticated user id
    #[arg(long, env = "STOKE_USER")]
    pub user: Option<String>,

    /// API key for the store
    #[arg(long, env = "STOKE_API_KEY")]
    pub api_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List habits with streaks and today's completion state
    List,
    /// Add a habit
    Add {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "daily")]
        frequency: Frequency,
    },
    /// Record today's completion for a habit
    Complete { habit_id: String },
    /// Delete a habit
    Delete { habit_id: String },
    /// Follow the habit list as remote changes land
    Watch,
    /// Run a scripted walkthrough against the in-memory store
    Demo,
}

impl Args {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            endpoint: self.endpoint.clone(),
            project_id: self.project.clone(),
            database_id: self.database.clone(),
            api_key: self.api_key.clone(),
            ..Default::default()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            database_id: self.database.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_parses_from_cli() {
        let args = Args::parse_from(["stoke", "add", "Read", "--frequency", "weekly"]);
        match args.command {
            Command::Add { frequency, .. } => assert_eq!(frequency, Frequency::Weekly),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["stoke", "list"]);
        assert_eq!(args.database, "main");
        assert_eq!(args.session_config().habits_collection, "habits");
    }
}
