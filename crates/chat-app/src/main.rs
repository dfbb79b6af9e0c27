use clap::Parser;
use samvad::{AppError, Cli};

#[snafu::report]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AppError> {
    samvad::logging::init_tracing();
    samvad::run(Cli::parse()).await
}
