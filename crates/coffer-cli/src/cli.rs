use clap::{Args, Parser, Subcommand};

use coffer_core::VERSION;

/// Coffer - group-shared encryption for sensitive values and columns
#[derive(Parser)]
#[command(name = "coffer")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, env = "COFFER_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Login of the first group member
    #[arg(value_name = "LOGIN")]
    pub login: String,

    /// Path where the database will be created
    #[arg(long, value_name = "PATH")]
    pub database: Option<String>,
}

/// Arguments for the `enroll` command
#[derive(Args)]
pub struct EnrollArgs {
    /// Login of the member to enroll
    #[arg(value_name = "LOGIN")]
    pub login: String,

    /// Existing member authorizing the enrollment
    #[arg(long, value_name = "LOGIN")]
    pub by: String,
}

/// Arguments for the `passwd` command
#[derive(Args)]
pub struct PasswdArgs {
    /// Login of the member changing their password
    #[arg(value_name = "LOGIN")]
    pub login: String,
}

/// Arguments for the `rotate` command
#[derive(Args)]
pub struct RotateArgs {
    /// Member authorizing the rotation
    #[arg(long, value_name = "LOGIN")]
    pub by: String,
}

/// Arguments for the `check` command
#[derive(Args)]
pub struct CheckArgs {
    /// Login of the member to check
    #[arg(value_name = "LOGIN")]
    pub login: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new coffer: database, system key, first member
    Init(InitArgs),

    /// Enroll a member into the group
    Enroll(EnrollArgs),

    /// Regenerate a member's key pair after a password change
    Passwd(PasswdArgs),

    /// Rotate the system key and re-encrypt all registered columns
    Rotate(RotateArgs),

    /// Verify a member can unwrap the current system key
    Check(CheckArgs),
}
