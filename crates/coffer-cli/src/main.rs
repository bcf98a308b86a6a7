//! Coffer CLI - operator tooling for the group key lifecycle
//!
//! This is the command-line interface for Coffer. It covers the off-path
//! maintenance operations: initialization, member enrollment, password
//! changes, key rotation, and session checks.

use clap::Parser;

mod app;
mod cli;
mod commands;
mod config;
mod helpers;

use app::AppContext;
use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let ctx = AppContext::new(&cli);

    match cli.command {
        Commands::Init(ref args) => commands::init::handle_init(&ctx, args),
        Commands::Enroll(ref args) => commands::enroll::handle_enroll(&ctx, args),
        Commands::Passwd(ref args) => commands::passwd::handle_passwd(&ctx, args),
        Commands::Rotate(ref args) => commands::rotate::handle_rotate(&ctx, args),
        Commands::Check(ref args) => commands::check::handle_check(&ctx, args),
    }
}
