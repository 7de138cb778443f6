use karaprep_core::logging;

mod cli;

use crate::cli::CliCommand;

fn main() {
    // Logging goes to the XDG state file (stderr if that fails); stdout is
    // reserved for the status protocol.
    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    match CliCommand::run_from_args() {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("karaprep error: {:#}", err);
            std::process::exit(1);
        }
    }
}
