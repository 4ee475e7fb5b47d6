use branch_guard_cli::errors::Error;
use branch_guard_cli::{app, summary, Cli};
use clap::Parser;
use colored::Colorize;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter, e.g. `debug` or `bitbucket_client=trace`.
const LOG_ENV: &str = "BRANCH_GUARD_LOG";

#[tokio::main]
async fn main() {
    // Logs go to stderr so the summary on stdout stays readable
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Prompts block their thread, so the run gets its own task and Ctrl-C stays responsive
    let run = tokio::spawn(app::execute(cli));
    let result = tokio::select! {
        joined = run => joined.unwrap_or_else(|e| Err(Error::Aborted(e.to_string()))),
        _ = tokio::signal::ctrl_c() => {
            warn!("Received CTRL+C, stopping");
            Err(Error::Interrupted)
        }
    };

    match result {
        Ok(run_summary) => {
            println!("{}", summary::render_summary(&run_summary));
            std::process::exit(summary::exit_code(&run_summary));
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(e.exit_code());
        }
    }
}
