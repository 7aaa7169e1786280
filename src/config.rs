use crate::{
    flow::SweepOptions,
    staralign::{AccessToken, Page, UserId},
};
use clap::Parser;
use snafu::{OptionExt, Snafu};
use std::env;

const ACCESS_TOKEN_VAR: &str = "ACCESS_TOKEN";

/// Remove pending friend-request notifications from the backend.
#[derive(Debug, Parser)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("VERGEN_GIT_SHA"), ")"))]
pub struct Args {
    /// Access token to use (or set ACCESS_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Optional user id to include in the fetch
    #[arg(long, value_name = "ID")]
    pub user_id: Option<String>,

    /// Show raw HTTP responses for debugging
    #[arg(long)]
    pub verbose: bool,

    /// List candidate notifications without deleting them
    #[arg(long)]
    pub dry: bool,

    /// How many notifications to fetch
    #[arg(long, default_value_t = Page::default().limit)]
    pub limit: u32,

    /// Offset of the first notification to fetch
    #[arg(long, default_value_t = Page::default().offset)]
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub access_token: AccessToken,
    pub sweep: SweepOptions,
}

impl Config {
    pub fn from_environment(args: Args) -> Result<Self> {
        Self::new(args, env::var(ACCESS_TOKEN_VAR).ok())
    }

    fn new(args: Args, env_token: Option<String>) -> Result<Self> {
        let Args {
            token,
            user_id,
            dry,
            limit,
            offset,
            ..
        } = args;

        let token = token
            .filter(|t| !t.is_empty())
            .or_else(|| env_token.filter(|t| !t.is_empty()))
            .context(MissingAccessTokenSnafu)?;

        let sweep = SweepOptions {
            page: Page { limit, offset },
            user_id: user_id.filter(|u| !u.is_empty()).map(UserId),
            dry_run: dry,
        };

        Ok(Self {
            access_token: AccessToken(token),
            sweep,
        })
    }
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "access token required. Provide --token or set {} environment variable.",
        ACCESS_TOKEN_VAR
    ))]
    MissingAccessToken,
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("friend-request-sweeper").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn flag_token_wins_over_environment() {
        let config = Config::new(args(&["--token", "from-flag"]), Some("from-env".into())).unwrap();
        assert_eq!(config.access_token, AccessToken("from-flag".into()));
    }

    #[test]
    fn falls_back_to_environment_token() {
        let config = Config::new(args(&[]), Some("from-env".into())).unwrap();
        assert_eq!(config.access_token, AccessToken("from-env".into()));

        let config = Config::new(args(&["--token", ""]), Some("from-env".into())).unwrap();
        assert_eq!(config.access_token, AccessToken("from-env".into()));
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(matches!(
            Config::new(args(&[]), None),
            Err(Error::MissingAccessToken)
        ));
        assert!(matches!(
            Config::new(args(&[]), Some(String::new())),
            Err(Error::MissingAccessToken)
        ));
    }

    #[test]
    fn carries_sweep_options() {
        let config = Config::new(
            args(&["--user-id", "42", "--dry", "--limit", "50", "--offset", "100"]),
            Some("t".into()),
        )
        .unwrap();

        assert!(config.sweep.dry_run);
        assert_eq!(config.sweep.user_id, Some(UserId("42".into())));
        assert_eq!(
            config.sweep.page,
            Page {
                limit: 50,
                offset: 100
            }
        );
    }

    #[test]
    fn defaults_match_a_full_first_page() {
        let args = args(&["--verbose"]);
        assert!(args.verbose);
        assert!(!args.dry);

        let config = Config::new(args, Some("t".into())).unwrap();
        assert_eq!(config.sweep.page, Page::default());
        assert_eq!(config.sweep.user_id, None);
    }
}
