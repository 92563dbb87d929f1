//! Command-line argument model.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ConfigKey;

#[derive(Debug, Parser)]
#[command(name = "mockfactory")]
#[command(author, version, about = "Secure code execution sandbox client")]
pub struct Cli {
    /// Directory holding config.json and the token (default: ~/.mockfactory)
    #[arg(long, global = true, env = "MOCKFACTORY_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in to your account
    Login {
        /// Your email address (prompted if omitted)
        #[arg(long)]
        email: Option<String>,
        /// Your password (prompted if omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Create a new account
    Signup {
        /// Your email address (prompted if omitted)
        #[arg(long)]
        email: Option<String>,
        /// Your password (prompted with confirmation if omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign out and remove the stored token
    Logout,

    /// Show authentication status and usage
    Status,

    /// Execute code in the sandbox
    ///
    /// Example: mockfactory run python -c "print('Hello World')"
    Run {
        /// Programming language (python, javascript, php, perl, go, shell, html)
        language: String,

        /// Code to execute inline
        #[arg(short, long, conflicts_with = "file", required_unless_present = "file")]
        code: Option<String>,

        /// File containing the code to execute
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Execution timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Print the raw output without formatting
        #[arg(long)]
        raw: bool,
    },

    /// Execute a code file, detecting the language from its extension
    Execute {
        /// Path to the code file (.py, .js, .php, .pl, .go, .sh, .html)
        file: PathBuf,

        /// Execution timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Print the raw output without formatting
        #[arg(long)]
        raw: bool,
    },

    /// Show current usage statistics
    Usage,

    /// Manage CLI configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        #[arg(value_enum)]
        key: ConfigKey,
        value: String,
    },
    /// Reset configuration to defaults
    Reset,
}
