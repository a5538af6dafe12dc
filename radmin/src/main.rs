//! # Radmin CLI Entry Point
//!
//! The main executable for the replica admin client. One invocation performs one call:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`].
//! 2. **Resolution**: Turns the flags into a transport and protocol via `radmin_core`.
//! 3. **Execution**: Decodes the argument, connects, calls and closes via `RadminClient`.
//! 4. **Presentation**: Prints the response as JSON on stdout, or the error on stderr.

mod cli;
mod formatter;

use clap::Parser;
use cli::Cli;
use formatter::FormattedString;
use radmin_core::{DynamicCallError, DynamicRequest, RadminClient};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let args = Cli::parse_from(cli::normalize_args(std::env::args()));
    let config = args.connection_config();
    debug!(?config, method = ?args.method, "parsed command line");

    let Some(method) = args.method.filter(|method| !method.is_empty()) else {
        eprintln!("{}", cli::usage());
        return;
    };

    let client = match RadminClient::offline(&config) {
        Ok(client) => client,
        Err(err) => exit_with_usage(FormattedString::from(err)),
    };

    let request = DynamicRequest::new(method, args.args);

    match client.dynamic(request).await {
        Ok(response) => match response.render() {
            Ok(json) => println!("{json}"),
            Err(err) => exit(FormattedString::from(err)),
        },
        Err(err @ DynamicCallError::Prepare(_)) => exit_with_usage(FormattedString::from(err)),
        Err(err) => exit(FormattedString::from(err)),
    }
}

/// Logs go to stderr so stdout only ever carries the response.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit(message: FormattedString) -> ! {
    eprintln!("{message}");
    process::exit(1);
}

fn exit_with_usage(message: FormattedString) -> ! {
    eprintln!("{message}");
    eprintln!("{}", cli::usage());
    process::exit(1);
}
