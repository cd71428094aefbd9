//! # Running under systemd
//!
//! `sampled.socket`:
//! ```text
//! [Socket]
//! ListenStream=5000
//! FileDescriptorName=MyListenerSocket
//!
//! [Install]
//! WantedBy=sockets.target
//! ```
//!
//! `sampled.service`:
//! ```text
//! [Unit]
//! Requires=sampled.socket
//!
//! [Service]
//! Type=notify
//! ExecStart=/usr/bin/sampled
//! ```
//!
//! # Alternately, using `systemfd`
//!
//! ```text
//! systemfd -s 5000 -- sampled --socket-group unknown --stderr
//! ```

#![warn(rust_2018_idioms)]

use clap::Parser;
use log::LevelFilter;
use sampled::journal::JournalLog;
use sampled::logging::{JournalSink, Sink, StderrSink};
use sampled::{service, DaemonConfig, Logger, Systemd};
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = DaemonConfig::parse();

    // Low-level diagnostics through the `log` facade; connection records
    // go through `Logger`. `--stderr` echoes both.
    let _ = JournalLog::init(&config.identifier, LevelFilter::Info, config.log_stderr);

    let mut sinks: Vec<Box<dyn Sink>> = vec![Box::new(JournalSink)];
    if config.log_stderr {
        sinks.push(Box::new(StderrSink));
    }
    let log = Logger::new(&config.identifier, sinks);

    let supervisor = Systemd::new(!config.keep_environment);
    let result = service::run(&config, supervisor, &log);
    service::exit_status(result, &log)
}
