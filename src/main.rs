// src/main.rs
mod cli;
mod config;
mod error;
mod generate;
mod nested;
mod opts;
mod parser;
mod repository;
mod utils;

use std::env;
use std::process;

use nested::Reporter;

fn main() {
  let argv: Vec<String> = env::args().skip(1).collect();
  let reporter = Reporter::new(cli::usage(), true);

  if argv.is_empty() {
    reporter.print_usage();
    process::exit(1);
  }
  if argv[0] == "-h" || argv[0] == "--help" {
    reporter.print_usage();
    process::exit(0);
  }

  // A fatal reporter already printed and exited on any parse failure, so
  // the Err arm below is only reachable with a lenient reporter.
  let options = match cli::parse_command_line(&argv, &reporter) {
    Ok(options) => options,
    Err(err) => process::exit(err.exit_code()),
  };
  if options.flag("help") {
    reporter.print_usage();
    process::exit(0);
  }

  let loglevel = options.str_value("loglevel").unwrap_or_default().to_string();
  env_logger::Builder::new()
    .filter_level(cli::level_filter_from(&loglevel))
    .init();
  log::debug!("Options: {options:?}");

  if let Err(err) = generate::run_generate(&options) {
    eprintln!("Error: {err}");
    process::exit(err.exit_code());
  }
}
