use std::process::ExitCode;

use clap::Parser;
use pg_dbutils::cli::{Args, init_tracing, run};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = match args.to_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let settings_json = serde_json::to_string(&args.settings(&config))
        .unwrap_or_else(|_| "{}".to_string());
    tracing::info!("config: {}", settings_json);

    match run(config, &args.command, args.pretty).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}
