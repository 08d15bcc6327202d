use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "scanbox",
    version,
    about = "Run static-analysis tools inside throwaway Docker containers bound to the project."
)]
pub(crate) struct Cli {
    /// YAML config file (environment variables override its values)
    #[arg(long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Print detailed execution info
    #[arg(long, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Run one tool command in a fresh container and print its stdout.
    ///
    /// The run's working copy is mounted from <project>/.scanbox/<run id>.
    Run {
        /// Tool name, used to look up custom image overrides
        #[arg(long)]
        tool: String,
        /// Default image reference for the tool
        #[arg(long)]
        image: String,
        /// Reuse an existing run id instead of generating one
        #[arg(long = "run-id")]
        run_id: Option<String>,
        /// Remove every container of the run after the tool finishes
        #[arg(long)]
        cleanup: bool,
        /// Shell command executed in /src; ANALYSISID is replaced with the run id
        #[arg(trailing_var_arg = true, required = true)]
        cmd: Vec<String>,
    },
    /// Pull an image unless it is already cached locally
    Pull {
        /// Image reference
        image: String,
    },
    /// Force-remove every container that belongs to a run
    Cleanup {
        #[arg(long = "run-id")]
        run_id: String,
    },
    /// Check that the docker runtime is installed and reachable
    Doctor,
}
