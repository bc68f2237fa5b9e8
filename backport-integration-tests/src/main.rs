use anyhow::Result;
use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

mod cli;
mod helpers;
mod tests;

use cli::{Cli, Commands, RunOptions};
use tests::{commits, config, pick};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::All(options) => run_all_tests(options).await,
        Commands::Commits(options) => {
            println!("{}", "📜 Running Commit Listing Tests".blue().bold());
            let (passed, failed) = commits::run_tests(options).await?;
            print_test_summary(passed, failed);
            Ok(())
        }
        Commands::Pick(options) => {
            println!("{}", "🍒 Running Cherry-Pick Workflow Tests".blue().bold());
            let (passed, failed) = pick::run_tests(options).await?;
            print_test_summary(passed, failed);
            Ok(())
        }
        Commands::Config(options) => {
            println!("{}", "⚙️  Running Settings Tests".blue().bold());
            let (passed, failed) = config::run_tests(options).await?;
            print_test_summary(passed, failed);
            Ok(())
        }
    }
}

async fn run_all_tests(options: RunOptions) -> Result<()> {
    println!("{}", "🧪 Running all backport integration tests...".bold());
    println!();

    let mut passed = 0;
    let mut failed = 0;

    println!("{}", "📜 Commit Listing Tests".blue().bold());
    let (p, f) = commits::run_tests(options).await?;
    passed += p;
    failed += f;

    println!();
    println!("{}", "🍒 Cherry-Pick Workflow Tests".blue().bold());
    let (p, f) = pick::run_tests(options).await?;
    passed += p;
    failed += f;

    println!();
    println!("{}", "⚙️  Settings Tests".blue().bold());
    let (p, f) = config::run_tests(options).await?;
    passed += p;
    failed += f;

    println!();
    println!("{}", "═".repeat(60).blue());
    print_test_summary(passed, failed);
    Ok(())
}

fn print_test_summary(passed: usize, failed: usize) {
    println!();
    if failed == 0 {
        println!(
            "{} {} tests passed!",
            "✅".green(),
            format!("All {passed}").green().bold()
        );
    } else {
        println!(
            "{} {} tests passed, {} failed",
            "❌".red(),
            passed.to_string().green(),
            failed.to_string().red().bold()
        );
        std::process::exit(1);
    }
}
