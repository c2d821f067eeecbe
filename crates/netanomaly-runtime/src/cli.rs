//! Command line and environment configuration for the `netanomaly` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::decode::JSON_CONTENT_TYPE;
use crate::hooks::DEFAULT_MODEL_DIR;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 6000;
/// Model loaded by the HTTP shim, relative to the working directory.
pub const DEFAULT_MODEL: &str = "xgboost_model.json";

#[derive(Parser, Debug)]
#[command(
    name = "netanomaly",
    version,
    about = "Serve the network anomaly detection model"
)]
pub struct Cli {
    /// Log filter directive (e.g. `info`, `netanomaly_runtime=debug`). Defaults to `RUST_LOG`.
    #[arg(long, global = true, env = "NETANOMALY_LOG")]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP prediction endpoint.
    Serve(ServeArgs),
    /// Run the container hooks once over a payload and print the response.
    Invoke(InvokeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Interface to bind.
    #[arg(long, env = "NETANOMALY_HOST", default_value = DEFAULT_HOST)]
    pub host: String,
    /// Port to bind.
    #[arg(long, env = "NETANOMALY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Model artifact (JSON or UBJSON document).
    #[arg(long, env = "NETANOMALY_MODEL", default_value = DEFAULT_MODEL)]
    pub model: PathBuf,
}

impl ServeArgs {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Args, Debug, Clone)]
pub struct InvokeArgs {
    /// Directory holding `model.xgb`.
    #[arg(long, env = "NETANOMALY_MODEL_DIR", default_value = DEFAULT_MODEL_DIR)]
    pub model_dir: PathBuf,
    /// Declared content type of the request body.
    #[arg(long, default_value = JSON_CONTENT_TYPE)]
    pub content_type: String,
    /// Requested response content type.
    #[arg(long, default_value = JSON_CONTENT_TYPE)]
    pub accept: String,
    /// Read the request body from this file instead of stdin.
    #[arg(long)]
    pub input: Option<PathBuf>,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["netanomaly", "serve"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, DEFAULT_PORT);
        assert_eq!(args.model, PathBuf::from(DEFAULT_MODEL));
        assert_eq!(args.bind_addr(), "0.0.0.0:6000");
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from([
            "netanomaly",
            "--log-level",
            "debug",
            "serve",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--model",
            "/models/anomaly.ubj",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.bind_addr(), "127.0.0.1:8080");
        assert_eq!(args.model, PathBuf::from("/models/anomaly.ubj"));
    }

    #[test]
    fn test_invoke_args() {
        let cli = Cli::try_parse_from([
            "netanomaly",
            "invoke",
            "--model-dir",
            "/tmp/model",
            "--input",
            "request.json",
        ])
        .unwrap();
        let Command::Invoke(args) = cli.command else {
            panic!("expected invoke");
        };
        assert_eq!(args.model_dir, PathBuf::from("/tmp/model"));
        assert_eq!(args.content_type, "application/json");
        assert_eq!(args.input, Some(PathBuf::from("request.json")));
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(Cli::try_parse_from(["netanomaly", "serve", "--port", "99999"]).is_err());
    }
}
