//! Entry point for the `biolinkd` sensor daemon.

use std::process::ExitCode;

fn main() -> ExitCode {
    match biolinkd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) if error.is_already_running() => {
            eprintln!("biolinkd: already running: {error}");
            ExitCode::FAILURE
        }
        Err(error) => {
            tracing::error!(target: "biolinkd::process", error = %error, "daemon exited with an error");
            if !tracing::dispatcher::has_been_set() {
                eprintln!("biolinkd: {error}");
            }
            ExitCode::FAILURE
        }
    }
}
