use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use fieldwork_core::QueueStatus;

#[derive(Parser)]
#[command(name = "fieldwork")]
#[command(about = "Inspect and drain the offline field-work queue")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the local queue database
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Backend API base URL (e.g. <https://api.example.com>)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue an operation for delivery
    Enqueue {
        /// Operation type (e.g. update_location, start-session)
        operation: String,
        /// JSON payload
        #[arg(long, default_value = "{}")]
        payload: String,
    },
    /// Queue a GPS location update
    Location {
        /// Latitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Longitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Horizontal accuracy in meters
        #[arg(long)]
        accuracy: Option<f64>,
        /// Field session the ping belongs to
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Show queue statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List queued items
    List {
        /// Only show items with this status
        #[arg(long, value_enum)]
        status: Option<StatusFilter>,
        /// Number of items to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one sync pass now
    Sync,
    /// Move failed items with retries left back to pending
    Retry,
    /// Remove delivered items older than the retention window
    Gc {
        /// Retention in days (defaults to the configured value)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Remove one item regardless of status
    Remove {
        /// Item ID
        id: String,
    },
    /// Drop every queued item
    Clear {
        /// Confirm the destructive operation
        #[arg(long)]
        yes: bool,
    },
    /// Run the background sync service until interrupted
    Run,
    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusFilter {
    Pending,
    Processing,
    Failed,
    Completed,
}

impl From<StatusFilter> for QueueStatus {
    fn from(value: StatusFilter) -> Self {
        match value {
            StatusFilter::Pending => Self::Pending,
            StatusFilter::Processing => Self::Processing,
            StatusFilter::Failed => Self::Failed,
            StatusFilter::Completed => Self::Completed,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update the config file
    Init {
        /// Backend API base URL
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Bearer token sent with every request
        #[arg(long, value_name = "TOKEN")]
        auth_token: Option<String>,
        /// Directory holding the local queue database
        #[arg(long, value_name = "PATH")]
        data_dir: Option<PathBuf>,
    },
    /// Show the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
