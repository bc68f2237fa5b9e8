pub mod assertions;
pub mod runner;
pub mod setup;
pub mod types;

pub use assertions::*;
pub use runner::*;
pub use setup::*;
pub use types::*;

use anyhow::Result;
use colored::*;

/// Print the outcome of one test and count it
pub fn record(name: &str, outcome: Result<()>, passed: &mut usize, failed: &mut usize) {
    match outcome {
        Ok(()) => {
            println!("  {check} {name}", check = "✓".green());
            *passed += 1;
        }
        Err(e) => {
            println!(
                "  {cross} {name}: {error:#}",
                cross = "✗".red(),
                error = e
            );
            *failed += 1;
        }
    }
}
