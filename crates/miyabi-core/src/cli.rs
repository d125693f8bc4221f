use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::task::{Priority, Repeat};
use crate::view::{PriorityFilter, SortKey, StatusFilter};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "miyabi",
    version,
    about = "Task list manager with reminders, recurrence and focus tracking"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add a task
    Add {
        /// Task text; joined with spaces
        text: Vec<String>,

        #[arg(short, long, default_value = "none")]
        priority: Priority,

        #[arg(short, long, default_value = "none")]
        repeat: Repeat,

        /// Reminder date-time, e.g. 2024-06-01T09:00
        #[arg(long)]
        remind: Option<String>,
    },

    /// List tasks
    List {
        /// Case-insensitive substring match on the task text
        #[arg(short, long, default_value = "")]
        search: String,

        /// all | active | completed
        #[arg(long, default_value = "all")]
        status: StatusFilter,

        /// all | none | low | medium | high
        #[arg(long, default_value = "all")]
        priority: PriorityFilter,

        /// priority | date; repeat the same mode to flip direction
        #[arg(long = "sort", action = ArgAction::Append)]
        sort: Vec<SortKey>,
    },

    /// Toggle a task's completed state
    Done { id: u64 },

    /// Delete a task
    Rm { id: u64 },

    /// Delete every completed task
    Clear,

    /// Replace a task's text
    Edit { id: u64, text: Vec<String> },

    /// Change a task's priority
    Priority { id: u64, priority: Priority },

    /// Set or clear a task's reminder
    Remind {
        id: u64,

        /// New reminder; omit to clear
        when: Option<String>,
    },

    /// Move a task into another task's slot
    Move { dragged: u64, target: u64 },

    /// Focus session control
    Focus {
        #[command(subcommand)]
        action: FocusAction,
    },

    /// Print all tasks as interchange CSV
    Export,

    /// Import interchange CSV; "-" reads stdin
    Import {
        #[arg(default_value = "-")]
        path: PathBuf,
    },

    /// Print a calendar event link for a task
    Calendar { id: u64 },

    /// Run the reminder scheduler until interrupted
    Watch,
}

#[derive(Subcommand, Debug, Clone)]
pub enum FocusAction {
    /// Start (or hand over) the focus session
    Start { id: u64 },

    /// End the active focus session
    Stop,

    /// Show the focused task, if any
    Show,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
