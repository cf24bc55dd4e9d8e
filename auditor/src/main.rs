use args::Args;
use lineage_core::{error, info, log::init_logger, panic::configure_panic};
use std::{path::Path, process::ExitCode};

mod args;
mod audit;

fn main() -> ExitCode {
    let args = match Args::parse(std::env::args_os()) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };

    if let Err(err) = init_logger(args.logdir.as_deref().map(Path::new), &args.log_level) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::from(2);
    }
    configure_panic();

    if let Err(err) = rayon::ThreadPoolBuilder::new().num_threads(args.thread_count()).build_global() {
        error!("failed to configure the worker pool: {}", err);
        return ExitCode::from(2);
    }

    match audit::run(&args) {
        Ok(outcome) if outcome.is_clean() => {
            info!("all {} records verified", outcome.verification.processed);
            ExitCode::SUCCESS
        }
        Ok(outcome) => {
            error!(
                "{} of {} records failed verification, see {}",
                outcome.verification.failures.len(),
                outcome.verification.processed,
                outcome.exceptions.display()
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
