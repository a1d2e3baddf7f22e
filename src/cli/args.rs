use clap::{Parser, Subcommand, ValueEnum};

/// Mole: reclaim Mac disk space, uninstall apps cleanly, run maintenance
#[derive(Parser, Debug)]
#[command(
    name = "mole",
    version,
    about = "Reclaim Mac disk space and uninstall apps with their leftovers",
    long_about = "Mole measures and clears caches and logs, moves applications and their\n\
                   leftover files to the Trash, and runs routine maintenance tasks.",
    after_help = "EXAMPLES:\n  \
        mole scan                          Measure reclaimable space\n  \
        mole clean --yes                   Clear caches and logs without asking\n  \
        mole auth login < password.txt     Cache the admin password\n  \
        mole apps list --sort size         List apps by size\n  \
        mole apps remove Slack --dry-run   Preview an uninstall\n  \
        mole optimize                      Flush DNS, purge memory, restart Finder"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode, minimal output
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Measure how much space the cache and log directories hold
    Scan,

    /// Clear the cache and log directories
    Clean {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// List and uninstall applications
    Apps {
        #[command(subcommand)]
        action: AppsAction,
    },

    /// Run maintenance tasks (DNS, memory, Launch Services, QuickLook, Finder)
    Optimize,

    /// Manage the cached administrator password
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand, Debug)]
pub enum AppsAction {
    /// List installed applications
    List {
        /// Sort order
        #[arg(long, default_value = "name")]
        sort: AppSort,
    },

    /// Show details about a specific app
    Info {
        /// Application name
        name: String,
    },

    /// Move an application and its leftover files to the Trash
    Remove {
        /// Application name
        name: String,

        /// Preview what would be removed
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Read the administrator password from stdin and cache it
    Login,

    /// Forget the cached password
    Logout,

    /// Show whether a password is cached
    Status,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset to default configuration
    Reset,

    /// Initialize Mole directories and default config
    Init,

    /// Print the config file location
    Path,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Quiet,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum AppSort {
    Name,
    Size,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
