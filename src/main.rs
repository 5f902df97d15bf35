use aps_integration_lib::{logging, run, Cli};
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref());

    match run(cli).await {
        Ok(state) if state.is_success() => ExitCode::SUCCESS,
        Ok(state) => {
            log::error!("Pipeline ended in state {}", state.as_str());
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("Pipeline could not start ({}): {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}
