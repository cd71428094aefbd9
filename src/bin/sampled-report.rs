#![warn(rust_2018_idioms)]

use clap::Parser;
use sampled::report::{self, Query, USAGE};
use sampled::ReportArgs;
use std::process::ExitCode;
use std::time::SystemTime;

fn main() -> ExitCode {
    let args = ReportArgs::parse();

    let options = match args.validate() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let query = Query::new(&args.identifier, &options, SystemTime::now());
    let stdout = std::io::stdout();
    match report::run(&args, &query, &mut stdout.lock()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sampled-report: {e}");
            ExitCode::FAILURE
        }
    }
}
