//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Verificador: pixel-exact visual regression checks against stored fixtures
#[derive(Parser, Debug)]
#[command(name = "verificador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, value_enum, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare a local capture against its fixture
    Diff(DiffArgs),

    /// Show the effective configuration as YAML
    Config(ConfigArgs),

    /// Verify every configured series on a live page (requires the `browser` feature)
    Check(CheckArgs),
}

/// Arguments for the diff command
#[derive(Parser, Debug)]
pub struct DiffArgs {
    /// Rendered image to verify
    pub rendered: PathBuf,

    /// Directory holding the fixtures
    #[arg(long)]
    pub fixture_dir: PathBuf,

    /// Series prefix of the fixture (e.g. series_1)
    #[arg(long)]
    pub prefix: String,

    /// 1-based image index within the series
    #[arg(long)]
    pub index: u32,

    /// Mismatched pixels tolerated before failing
    #[arg(long)]
    pub tolerance: Option<u64>,

    /// Per-channel difference treated as equal
    #[arg(long)]
    pub threshold: Option<u8>,

    /// Directory for rendered and diff artifacts
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Configuration file supplying defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Print built-in defaults, ignoring any file
    #[arg(long, conflicts_with = "file")]
    pub default: bool,

    /// Configuration file to load
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Page showing the viewer (overrides `base_url` from the config)
    #[arg(long)]
    pub url: Option<String>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verify every image instead of stopping at the first failure
    #[arg(long)]
    pub collect_all: bool,

    /// Write the JSON run report here
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Launch chromium without its sandbox (containers, CI)
    #[arg(long)]
    pub no_sandbox: bool,
}

/// Color output argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::ColorChoice;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_verify_cli() {
            use clap::CommandFactory;
            Cli::command().debug_assert();
        }

        #[test]
        fn test_global_flags_after_subcommand() {
            let cli = Cli::try_parse_from(["verificador", "config", "--default", "-vv", "--json"])
                .unwrap();
            assert_eq!(cli.verbose, 2);
            assert!(cli.json);
            assert!(!cli.quiet);
        }

        #[test]
        fn test_missing_subcommand_fails() {
            assert!(Cli::try_parse_from(["verificador"]).is_err());
        }
    }

    mod diff_tests {
        use super::*;

        #[test]
        fn test_parse_diff() {
            let cli = Cli::try_parse_from([
                "verificador",
                "diff",
                "capture.jpg",
                "--fixture-dir",
                "fixture/series1",
                "--prefix",
                "series_1",
                "--index",
                "3",
                "--tolerance",
                "5",
            ])
            .unwrap();
            let Commands::Diff(args) = cli.command else {
                panic!("expected diff command");
            };
            assert_eq!(args.rendered, PathBuf::from("capture.jpg"));
            assert_eq!(args.prefix, "series_1");
            assert_eq!(args.index, 3);
            assert_eq!(args.tolerance, Some(5));
            assert_eq!(args.threshold, None);
            assert!(args.output_dir.is_none());
        }

        #[test]
        fn test_diff_requires_prefix() {
            let result = Cli::try_parse_from([
                "verificador",
                "diff",
                "capture.jpg",
                "--fixture-dir",
                "f",
                "--index",
                "1",
            ]);
            assert!(result.is_err());
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_default_conflicts_with_file() {
            let result =
                Cli::try_parse_from(["verificador", "config", "--default", "--file", "a.yaml"]);
            assert!(result.is_err());
        }
    }

    mod check_tests {
        use super::*;

        #[test]
        fn test_parse_check() {
            let cli = Cli::try_parse_from([
                "verificador",
                "check",
                "--url",
                "http://localhost:3000",
                "--collect-all",
                "--no-sandbox",
            ])
            .unwrap();
            let Commands::Check(args) = cli.command else {
                panic!("expected check command");
            };
            assert_eq!(args.url.as_deref(), Some("http://localhost:3000"));
            assert!(args.collect_all);
            assert!(args.no_sandbox);
            assert!(!args.headed);
        }
    }

    mod color_tests {
        use super::*;

        #[test]
        fn test_color_arg_conversion() {
            assert_eq!(ColorChoice::from(ColorArg::Auto), ColorChoice::Auto);
            assert_eq!(ColorChoice::from(ColorArg::Always), ColorChoice::Always);
            assert_eq!(ColorChoice::from(ColorArg::Never), ColorChoice::Never);
        }
    }
}
