//! # Ferry Ridership
//!
//! Batch command-line runner over [`ferry_forecast`]: stationarity checks,
//! SARIMA parameter search and forecasts for monthly ferry ridership.
//!
//! ```no_run
//! use clap::Parser;
//! use ferry_ridership::cli::{run, Cli};
//!
//! let cli = Cli::parse_from(["ferry-ridership", "stationarity", "--data", "2023.csv"]);
//! println!("{}", run(cli).unwrap());
//! ```

pub mod cli;

pub use ferry_forecast;
