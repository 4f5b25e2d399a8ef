// Command-line surface and the immutable run configuration.
//
// Every flag has an equally named environment variable; `.env` is loaded
// by `main` before parsing so it feeds the same lookup. The parsed `Cli` is
// turned into a `Config` once and passed by reference from then on.

use crate::job::TimestampPolicy;
use clap::builder::NonEmptyStringValueParser;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://infinitome.cn.xijiabrainmap.com";

/// Which API flavour the server speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, ValueEnum)]
pub enum ApiVariant {
    /// Facility-scoped session listing; login returns a facility id and needs a PIN
    #[default]
    Sessions,
    /// Flat job listing with patient ids provided by the server
    Jobs,
}

impl ApiVariant {
    /// Archive naming used when `--file-timestamp` is not given.
    pub fn default_timestamp(self) -> TimestampPolicy {
        match self {
            ApiVariant::Sessions => TimestampPolicy::None,
            ApiVariant::Jobs => TimestampPolicy::Download,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "infinitome-dl")]
#[command(about = "Download the result archive of every job available to a facility")]
#[command(version)]
pub struct Cli {
    /// Facility the account belongs to
    #[arg(short, long, env = "FACILITY", value_parser = NonEmptyStringValueParser::new())]
    pub facility: String,

    /// Login user name
    #[arg(short, long, env = "USERNAME", value_parser = NonEmptyStringValueParser::new())]
    pub username: String,

    /// Login password
    #[arg(
        short,
        long,
        env = "PASSWORD",
        hide_env_values = true,
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub password: String,

    /// Login PIN (required by the sessions API)
    #[arg(short = 'n', long, env = "PIN", hide_env_values = true)]
    pub pin: Option<String>,

    /// Directory the archives are written to
    #[arg(
        short,
        long = "out-dir",
        visible_alias = "outDir",
        env = "OUTDIR",
        default_value = "./"
    )]
    pub out_dir: PathBuf,

    /// Append log output to this file instead of the console
    #[arg(short, long, env = "LOGFILE")]
    pub logfile: Option<String>,

    /// API base URL
    #[arg(long, env = "BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// API flavour spoken by the server
    #[arg(long, env = "API_VARIANT", value_enum, default_value_t = ApiVariant::Sessions)]
    pub api: ApiVariant,

    /// Archive naming; defaults to `none` for the sessions API and `download` for the jobs API
    #[arg(long, env = "FILE_TIMESTAMP", value_enum)]
    pub file_timestamp: Option<TimestampPolicy>,

    /// Seconds to wait for a connection to be established
    #[arg(long, env = "CONNECT_TIMEOUT", default_value_t = 30)]
    pub connect_timeout: u64,

    /// Total seconds allowed per request, including the archive body (no limit when unset)
    #[arg(long, env = "TIMEOUT")]
    pub timeout: Option<u64>,

    /// Do not draw download progress bars
    #[arg(long)]
    pub no_progress: bool,
}

/// Login credentials. Held in memory for the lifetime of the process only.
#[derive(Clone)]
pub struct Credentials {
    pub facility: String,
    pub username: String,
    pub password: String,
    pub pin: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("facility", &self.facility)
            .field("username", &self.username)
            .field("password", &"***")
            .field("pin", &self.pin.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub base_url: String,
    pub variant: ApiVariant,
    pub out_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub timestamp: TimestampPolicy,
    pub connect_timeout: Duration,
    pub timeout: Option<Duration>,
    pub progress: bool,
}

impl Config {
    /// Validate the parsed flags and freeze them into a `Config`.
    ///
    /// A missing PIN for the sessions API is reported as a clap usage error
    /// so it exits the same way as any other missing argument.
    pub fn from_cli(cli: Cli) -> Result<Config, clap::Error> {
        let pin = non_empty(cli.pin);
        if cli.api == ApiVariant::Sessions && pin.is_none() {
            return Err(Cli::command().error(
                ErrorKind::MissingRequiredArgument,
                "the sessions API requires a PIN: pass --pin <PIN> or set PIN",
            ));
        }

        Ok(Config {
            credentials: Credentials {
                facility: cli.facility,
                username: cli.username,
                password: cli.password,
                pin,
            },
            base_url: cli.base_url.trim_end_matches('/').to_string(),
            variant: cli.api,
            out_dir: cli.out_dir,
            log_file: non_empty(cli.logfile).map(PathBuf::from),
            timestamp: cli
                .file_timestamp
                .unwrap_or_else(|| cli.api.default_timestamp()),
            connect_timeout: Duration::from_secs(cli.connect_timeout),
            timeout: cli.timeout.map(Duration::from_secs),
            progress: !cli.no_progress,
        })
    }
}

/// Treat an empty string the same as an absent value.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, clap::Error> {
        let mut argv = vec!["infinitome-dl"];
        argv.extend_from_slice(args);
        Config::from_cli(Cli::try_parse_from(argv)?)
    }

    #[test]
    fn non_empty_filters_blank_values() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some("x".into())), Some("x".into()));
    }

    #[test]
    fn sessions_api_with_short_flags() {
        let cfg = parse(&[
            "-f", "FAC", "-u", "alice", "-p", "pw", "-n", "1234", "-o", "out",
            "--base-url", "http://localhost:9000/",
        ])
        .unwrap();
        assert_eq!(cfg.variant, ApiVariant::Sessions);
        assert_eq!(cfg.timestamp, TimestampPolicy::None);
        assert_eq!(cfg.credentials.pin.as_deref(), Some("1234"));
        assert_eq!(cfg.out_dir, PathBuf::from("out"));
        assert_eq!(cfg.base_url, "http://localhost:9000");
        assert_eq!(cfg.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn sessions_api_rejects_missing_pin() {
        let err = parse(&["-f", "FAC", "-u", "alice", "-p", "pw", "-n", ""]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn jobs_api_defaults_to_download_stamp() {
        let cfg = parse(&[
            "-f", "FAC", "-u", "alice", "-p", "pw", "--api", "jobs", "-n", "",
        ])
        .unwrap();
        assert_eq!(cfg.credentials.pin, None);
        assert_eq!(cfg.timestamp, TimestampPolicy::Download);
    }

    #[test]
    fn timestamp_policy_can_be_overridden() {
        let cfg = parse(&[
            "-f", "FAC", "-u", "alice", "-p", "pw", "--api", "jobs", "-n", "",
            "--file-timestamp", "none", "--timeout", "600", "--no-progress",
        ])
        .unwrap();
        assert_eq!(cfg.timestamp, TimestampPolicy::None);
        assert_eq!(cfg.timeout, Some(Duration::from_secs(600)));
        assert!(!cfg.progress);
    }

    #[test]
    fn empty_password_flag_is_rejected() {
        let err = parse(&["-f", "FAC", "-u", "alice", "-p", "", "-n", "1"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let cfg = parse(&["-f", "FAC", "-u", "alice", "-p", "hunter2", "-n", "9876"]).unwrap();
        let out = format!("{:?}", cfg);
        assert!(out.contains("alice"));
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("9876"));
    }
}
