use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "kursplan",
    version,
    about = "Kursplan: static course task calendar",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Site data directory holding tasks.yml and courses/.
    #[arg(long = "site", global = true)]
    pub site: Option<PathBuf>,

    /// Config file, defaults to <site>/kursplan.toml.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Render the static site into the output directory.
    Build {
        #[arg(long = "out")]
        out: Option<PathBuf>,
    },
    /// Print the day-grouped task timeline.
    Timeline {
        /// Window length in days ahead of today.
        #[arg(long = "window")]
        window: Option<u32>,
        /// Emit the timeline as JSON instead of a table.
        #[arg(long = "json")]
        json: bool,
    },
    /// List the course index.
    Courses,
    /// Validate the site data files.
    Check,
}

impl Default for Command {
    fn default() -> Self {
        Self::Timeline {
            window: None,
            json: false,
        }
    }
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
