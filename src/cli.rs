use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "glrecon")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative GitLab resources: plan, apply, refresh, import", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Resource manifest
    #[arg(
        short,
        long,
        global = true,
        env = "GLRECON_MANIFEST",
        default_value = "glrecon.toml"
    )]
    pub manifest: PathBuf,

    /// State file (default: <state dir>/state.json)
    #[arg(long, global = true, env = "GLRECON_STATE")]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(PlanArgs),

    /// Make GitLab match the manifest
    Apply(ApplyArgs),

    /// Update the state file from GitLab without changing anything
    Refresh,

    /// Delete every managed resource
    Destroy(DestroyArgs),

    /// Adopt an existing GitLab object under a manifest address
    Import(ImportArgs),

    /// Show managed resources from the state file
    Show(ShowArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Plan / Apply / Destroy
// ============================================================================

#[derive(Args)]
pub struct PlanArgs {
    /// Limit to a resource type or address (e.g., gitlab_group, gitlab_group.platform)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Plan against the state file without reading GitLab first
    #[arg(long)]
    pub no_refresh: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Limit to a resource type or address (e.g., gitlab_group, gitlab_group.platform)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Plan against the state file without reading GitLab first
    #[arg(long)]
    pub no_refresh: bool,

    /// Give up on the whole run after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args)]
pub struct DestroyArgs {
    /// Limit to a resource type or address
    #[arg(short, long)]
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Give up on the whole run after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

// ============================================================================
// Import / Show
// ============================================================================

#[derive(Args)]
pub struct ImportArgs {
    /// Manifest address, e.g. gitlab_group.platform
    pub address: String,

    /// GitLab identity, e.g. 42 or group/project:KEY:*
    pub id: String,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Resource type or address to show (default: all)
    pub address: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}
