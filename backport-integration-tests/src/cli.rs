use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "backport-integration-tests")]
#[command(about = "Integration test suite for backport")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Copy)]
pub struct RunOptions {
    /// Show verbose output
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Keep temporary directories after tests
    #[arg(long)]
    pub keep_temp: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run all integration tests
    All(RunOptions),

    /// Run commit listing tests
    Commits(RunOptions),

    /// Run cherry-pick workflow tests
    Pick(RunOptions),

    /// Run settings tests
    Config(RunOptions),
}
