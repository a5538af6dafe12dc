//! # CLI
//!
//! This module defines the command-line interface of `radmin` using `clap`.
//!
//! The flags follow the conventions of the replica admin tooling: `-h` is the host (so
//! help is `--help` only) and the boolean switches are also accepted in their
//! single-dash form (`-framed`, `-http`, `-help`).
use clap::{ArgAction, CommandFactory, Parser};
use radmin_core::client::dispatch::DispatchTable;
use radmin_core::transport::{
    ConnectionConfig,
    resolver::{DEFAULT_HOST, DEFAULT_PORT},
};

/// Single-dash spellings accepted for the long boolean flags.
const SINGLE_DASH_FLAGS: [&str; 3] = ["-framed", "-http", "-help"];

#[derive(Parser, Debug)]
#[command(
    name = "radmin",
    version,
    about = "Replica admin RPC client",
    override_usage = "radmin [-h host[:port]] [-u url] [-framed] [-http] function [arg]",
    disable_help_flag = true,
    after_help = functions_help()
)]
pub struct Cli {
    /// Specify host and port
    #[arg(short = 'h', long = "host", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Specify port
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Specify the protocol (binary, compact, simplejson, json)
    #[arg(short = 'P', long = "protocol", default_value = "binary")]
    pub protocol: String,

    /// Specify the url
    #[arg(short = 'u', long = "url")]
    pub url: Option<String>,

    /// Use framed transport
    #[arg(long)]
    pub framed: bool,

    /// Use http
    #[arg(long)]
    pub http: bool,

    /// Headers to set on the http(s) request (e.g. -H "Key: Value")
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Function to call
    pub method: Option<String>,

    /// Function arguments, one simplejson document per request struct
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            protocol: self.protocol.clone(),
            url: self.url.clone(),
            framed: self.framed,
            http: self.http,
            headers: self.headers.clone(),
        }
    }
}

/// Flags that consume the following token as their value.
const VALUE_FLAGS: [&str; 10] = [
    "-h", "--host", "-p", "--port", "-P", "--protocol", "-u", "--url", "-H", "--header",
];

/// Rewrites `-framed`, `-http` and `-help` to their double-dash form.
///
/// Only the flags in front of the function name are rewritten; the function
/// arguments are passed through untouched.
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut out: Vec<String> = args.next().into_iter().collect();
    let mut expects_value = false;

    while let Some(arg) = args.next() {
        if expects_value {
            expects_value = false;
            out.push(arg);
            continue;
        }
        if arg == "--" || !arg.starts_with('-') {
            out.push(arg);
            out.extend(args.by_ref());
            break;
        }

        expects_value = VALUE_FLAGS.contains(&arg.as_str());
        if SINGLE_DASH_FLAGS.contains(&arg.as_str()) {
            out.push(format!("-{arg}"));
        } else {
            out.push(arg);
        }
    }
    out
}

/// The full help text, printed alongside configuration and argument errors.
pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

fn functions_help() -> String {
    let mut out = String::from("Functions:\n");
    for entry in DispatchTable::new().entries() {
        out.push_str(&format!("  {}\n", entry.signature()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let argv = std::iter::once("radmin")
            .chain(args.iter().copied())
            .map(String::from);
        Cli::try_parse_from(normalize_args(argv)).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        let config = cli.connection_config();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 9090);
        assert_eq!(config.protocol, "binary");
        assert!(!config.framed && !config.http);
        assert!(cli.method.is_none());
    }

    #[test]
    fn test_single_dash_flags() {
        let cli = parse(&["-framed", "-http", "-h", "10.0.0.1:7000", "add_disk", "{}"]);

        assert!(cli.framed);
        assert!(cli.http);
        assert_eq!(cli.host, "10.0.0.1:7000");
        assert_eq!(cli.method.as_deref(), Some("add_disk"));
        assert_eq!(cli.args, ["{}"]);
    }

    #[test]
    fn test_repeated_headers() {
        let cli = parse(&["-H", "A: 1", "-H", "B: 2", "-P", "json", "query_disk_info"]);

        assert_eq!(cli.headers, ["A: 1", "B: 2"]);
        assert_eq!(cli.protocol, "json");
        assert!(cli.args.is_empty());
    }

    #[test]
    fn test_normalize_stops_at_function_name() {
        let argv = ["radmin", "-framed", "-h", "-http", "add_disk", "-http"].map(String::from);

        assert_eq!(
            normalize_args(argv),
            ["radmin", "--framed", "-h", "-http", "add_disk", "-http"]
        );
    }

    #[test]
    fn test_argument_is_passed_through() {
        let cli = parse(&["-http", "add_disk", r#"{"disk_str":"-http"}"#]);

        assert!(cli.http);
        assert_eq!(cli.args, [r#"{"disk_str":"-http"}"#]);
    }

    #[test]
    fn test_usage_lists_functions() {
        let usage = usage();

        assert!(usage.contains("Functions:"));
        assert!(usage.contains(
            "  query_disk_info_response query_disk_info(query_disk_info_request req)"
        ));
        assert!(usage.contains("add_new_disk_response add_disk(add_new_disk_request req)"));
    }
}
