//! Command-line front end for oauth-desk.

pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Local OAuth2 authorization-code desk
#[derive(Parser, Debug)]
#[command(name = "oauth-desk", version, about = "OAuth2 authorization-code desk")]
pub struct Cli {
    /// Settings file (default: ~/.oauth-desk/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Session key (default: the configured default session)
    #[arg(long, global = true)]
    pub session: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the status page and OAuth callback
    Serve(ServeArgs),
    /// Show the stored token status
    Status(StatusArgs),
    /// Authorize from the terminal by pasting the redirect URL
    Login,
    /// Refresh the stored access token
    Refresh,
    /// Remove stored tokens
    Clear,
    /// Decode the stored access token (no signature check)
    Inspect,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address, overriding the settings file
    #[arg(short, long)]
    pub bind: Option<String>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the full access token instead of a masked one
    #[arg(long)]
    pub reveal: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_serve_with_bind() {
        let cli = Cli::try_parse_from(["oauth-desk", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        match cli.command {
            Commands::Serve(args) => assert_eq!(args.bind.as_deref(), Some("0.0.0.0:8080")),
            other => panic!("expected Serve, got {other:?}"),
        }
    }

    #[test]
    fn parse_status_defaults_to_masked() {
        let cli = Cli::try_parse_from(["oauth-desk", "status"]).unwrap();
        match cli.command {
            Commands::Status(args) => assert!(!args.reveal),
            other => panic!("expected Status, got {other:?}"),
        }
        assert!(!cli.verbose);
        assert!(cli.session.is_none());
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "oauth-desk",
            "inspect",
            "--session",
            "work",
            "-v",
            "--config",
            "/tmp/desk.toml",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Inspect));
        assert_eq!(cli.session.as_deref(), Some("work"));
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/desk.toml")));
    }

    #[test]
    fn parse_status_reveal() {
        let cli = Cli::try_parse_from(["oauth-desk", "status", "--reveal"]).unwrap();
        assert!(matches!(cli.command, Commands::Status(StatusArgs { reveal: true })));
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["oauth-desk"]).is_err());
    }

    #[test]
    fn parse_unknown_subcommand_is_error() {
        assert!(Cli::try_parse_from(["oauth-desk", "logout"]).is_err());
    }
}
