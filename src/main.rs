//! Pickup Planner - donation pickup network route optimization
//!
//! A CLI tool that selects depots and builds daily truck routes to
//! maximize weekly net contribution.

use clap::Parser;
use pickup_planner::cli::Cli;
use pickup_planner::commands;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = commands::execute(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
