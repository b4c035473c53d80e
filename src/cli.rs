//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::DisplayConfig;
use crate::error::Result;
use crate::models::{normalize_geo, EndpointKind, RequestDescriptor, SearchProperty, Timeframe};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// trendscope - search interest from the terminal
///
/// Query search-interest timelines, regional breakdowns, related queries
/// and trending stories from a trends provider. Markdown/JSON output.
///
/// Examples:
///   trendscope interest "rust" --timeframe "today 3-m"
///   trendscope compare rust go zig --geo US
///   trendscope regions rust --limit 10
///   trendscope realtime --watch
///   trendscope trending --geo japan --watch
///   trendscope --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .trendscope.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (no progress output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT", global = true)]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// Trends provider base URL
    #[arg(long, value_name = "URL", env = "TRENDSCOPE_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Seconds between refreshes in watch mode
    #[arg(long, value_name = "SECS", global = true)]
    pub refresh_interval: Option<u64>,

    /// Generate a default .trendscope.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Available queries.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Interest over time for one or more keywords
    Interest(InterestQuery),

    /// Compare interest over time and regional interest of 2+ keywords
    Compare(InterestQuery),

    /// Interest by region for one or more keywords
    Regions {
        /// Keywords to look up
        #[arg(required = true, value_name = "KEYWORD")]
        keywords: Vec<String>,

        /// Country code to break down (e.g. US), worldwide when omitted
        #[arg(long, value_name = "GEO")]
        geo: Option<String>,

        /// Maximum regions per keyword (default: from config)
        #[arg(long, value_name = "COUNT")]
        limit: Option<usize>,
    },

    /// Rising and top related queries
    Related {
        /// Keywords to look up
        #[arg(required = true, value_name = "KEYWORD")]
        keywords: Vec<String>,
    },

    /// Daily trending searches of a region
    Trending {
        /// Provider region name (e.g. united_states, default: from config)
        #[arg(long, value_name = "REGION")]
        geo: Option<String>,

        /// Keep refreshing until interrupted
        #[arg(long)]
        watch: bool,
    },

    /// Realtime trending stories
    Realtime {
        /// Keep refreshing until interrupted
        #[arg(long)]
        watch: bool,

        /// Maximum stories to show
        #[arg(long, value_name = "COUNT")]
        limit: Option<usize>,
    },

    /// Keyword suggestions
    Suggest {
        /// Partial keyword
        keyword: String,
    },

    /// Category taxonomy
    Categories {
        /// Only show categories whose name or id contains this text
        #[arg(long, value_name = "TEXT")]
        filter: Option<String>,
    },
}

/// Parameters shared by `interest` and `compare`.
#[derive(clap::Args, Debug, Clone)]
pub struct InterestQuery {
    /// Keywords to look up
    #[arg(required = true, value_name = "KEYWORD")]
    pub keywords: Vec<String>,

    /// Time window: "now N-H", "now N-d", "today N-m", "today N-y" or "all"
    #[arg(short, long, value_name = "TIMEFRAME")]
    pub timeframe: Option<Timeframe>,

    /// Country code (e.g. US or US-CA), worldwide when omitted
    #[arg(long, value_name = "GEO")]
    pub geo: Option<String>,

    /// Search property
    #[arg(long, value_name = "PROPERTY")]
    pub gprop: Option<SearchProperty>,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Attach an ISO-style `geo` parameter in its canonical upper-case form.
fn with_geo(descriptor: RequestDescriptor, geo: Option<&String>) -> Result<RequestDescriptor> {
    match geo {
        Some(geo) => Ok(descriptor.with_param("geo", normalize_geo(geo)?)),
        None => Ok(descriptor),
    }
}

impl InterestQuery {
    fn timeline(&self, display: &DisplayConfig) -> Result<RequestDescriptor> {
        let timeframe = match self.timeframe {
            Some(timeframe) => timeframe.to_string(),
            None => display.timeframe.clone(),
        };
        let mut descriptor = RequestDescriptor::new(EndpointKind::InterestOverTime)
            .with_keywords(&self.keywords)
            .with_param("timeframe", timeframe);
        if let Some(gprop) = self.gprop {
            descriptor = descriptor.with_param("gprop", gprop.as_param());
        }
        with_geo(descriptor, self.geo.as_ref())
    }

    fn regions(&self) -> Result<RequestDescriptor> {
        let descriptor =
            RequestDescriptor::new(EndpointKind::InterestByRegion).with_keywords(&self.keywords);
        with_geo(descriptor, self.geo.as_ref())
    }
}

impl Command {
    /// Provider requests needed to answer this command, in report order.
    ///
    /// Fails with a user input error when an ISO-style `geo` is malformed.
    pub fn descriptors(&self, display: &DisplayConfig) -> Result<Vec<RequestDescriptor>> {
        let descriptors = match self {
            Command::Interest(query) => vec![query.timeline(display)?],
            Command::Compare(query) => vec![query.timeline(display)?, query.regions()?],
            Command::Regions { keywords, geo, .. } => {
                let descriptor =
                    RequestDescriptor::new(EndpointKind::InterestByRegion).with_keywords(keywords);
                vec![with_geo(descriptor, geo.as_ref())?]
            }
            Command::Related { keywords } => {
                vec![RequestDescriptor::new(EndpointKind::RelatedQueries).with_keywords(keywords)]
            }
            Command::Trending { geo, .. } => {
                let geo = geo.clone().unwrap_or_else(|| display.trending_geo.clone());
                vec![RequestDescriptor::new(EndpointKind::TrendingSearches).with_param("geo", geo)]
            }
            Command::Realtime { .. } => {
                vec![RequestDescriptor::new(EndpointKind::RealtimeTrendingSearches)]
            }
            Command::Suggest { keyword } => {
                vec![RequestDescriptor::new(EndpointKind::Suggestions)
                    .with_param("keyword", keyword.trim())]
            }
            Command::Categories { .. } => vec![RequestDescriptor::new(EndpointKind::Categories)],
        };
        Ok(descriptors)
    }

    /// Whether the command keeps refreshing until interrupted.
    pub fn watches(&self) -> bool {
        matches!(
            self,
            Command::Trending { watch: true, .. } | Command::Realtime { watch: true, .. }
        )
    }

    /// Report title.
    pub fn title(&self) -> &'static str {
        match self {
            Command::Interest(_) => "Interest Report",
            Command::Compare(_) => "Keyword Comparison",
            Command::Regions { .. } => "Regional Interest Report",
            Command::Related { .. } => "Related Queries Report",
            Command::Trending { .. } => "Trending Searches",
            Command::Realtime { .. } => "Realtime Trends",
            Command::Suggest { .. } => "Keyword Suggestions",
            Command::Categories { .. } => "Categories",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    ///
    /// Provider-level parameter rules (keyword count, timeframe, geo) are
    /// checked when a request is issued.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let Some(ref command) = self.command else {
            return Err("No command given (try --help)".to_string());
        };

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref base_url) = self.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.refresh_interval == Some(0) {
            return Err("Refresh interval must be at least 1 second".to_string());
        }

        match command {
            Command::Compare(query) => {
                let non_blank = query.keywords.iter().filter(|k| !k.trim().is_empty()).count();
                if non_blank < 2 {
                    return Err("Compare needs at least 2 keywords".to_string());
                }
            }
            Command::Regions { limit: Some(0), .. } | Command::Realtime { limit: Some(0), .. } => {
                return Err("Limit must be at least 1".to_string());
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the config file's `general.verbose`; `--quiet`
    /// overrides it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn make_args(command: Command) -> Args {
        Args {
            command: Some(command),
            config: None,
            verbose: false,
            quiet: false,
            format: OutputFormat::Markdown,
            output: None,
            base_url: None,
            timeout: None,
            refresh_interval: None,
            init_config: false,
        }
    }

    fn query(keywords: &[&str]) -> InterestQuery {
        InterestQuery {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            timeframe: None,
            geo: None,
            gprop: None,
        }
    }

    #[test]
    fn test_parse_compare() {
        let args = Args::try_parse_from([
            "trendscope",
            "compare",
            "rust",
            "go",
            "--timeframe",
            "now 7-d",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(args.format, OutputFormat::Json);
        let Some(Command::Compare(query)) = args.command else {
            panic!("expected compare");
        };
        assert_eq!(query.keywords, vec!["rust", "go"]);
        assert_eq!(query.timeframe, Some(Timeframe::past_days(7)));
    }

    #[test]
    fn test_parse_trending_watch() {
        let args =
            Args::try_parse_from(["trendscope", "trending", "--geo", "japan", "--watch"]).unwrap();
        let command = args.command.unwrap();
        assert!(command.watches());
        let Command::Trending { geo, .. } = command else {
            panic!("expected trending");
        };
        assert_eq!(geo.as_deref(), Some("japan"));

        let args = Args::try_parse_from(["trendscope", "trending"]).unwrap();
        assert!(!args.command.unwrap().watches());
    }

    #[test]
    fn test_parse_rejects_bad_timeframe() {
        let result = Args::try_parse_from(["trendscope", "interest", "rust", "-t", "yesterday"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_requires_command() {
        let mut args = make_args(Command::Realtime {
            watch: false,
            limit: None,
        });
        args.command = None;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_compare_needs_two_keywords() {
        let args = make_args(Command::Compare(query(&["rust", " "])));
        assert!(args.validate().is_err());

        let args = make_args(Command::Compare(query(&["rust", "go"])));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args(Command::Categories { filter: None });
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_values() {
        let mut args = make_args(Command::Categories { filter: None });
        args.base_url = Some("localhost:5000".to_string());
        assert!(args.validate().is_err());

        let mut args = make_args(Command::Categories { filter: None });
        args.refresh_interval = Some(0);
        assert!(args.validate().is_err());

        let args = make_args(Command::Regions {
            keywords: vec!["rust".to_string()],
            geo: None,
            limit: Some(0),
        });
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_descriptors() {
        let display = DisplayConfig::default();

        let mut compare = query(&["rust", "go"]);
        compare.geo = Some("US".to_string());
        compare.gprop = Some(SearchProperty::News);
        let descriptors = Command::Compare(compare).descriptors(&display).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(
            descriptors[0].to_string(),
            "interest_over_time?geo=US&gprop=news&keywords=rust&keywords=go&timeframe=today 12-m"
        );
        assert_eq!(
            descriptors[1].to_string(),
            "interest_by_region?geo=US&keywords=rust&keywords=go"
        );
        assert!(descriptors.iter().all(|d| d.validate().is_ok()));

        let trending = Command::Trending {
            geo: None,
            watch: false,
        }
        .descriptors(&display)
        .unwrap();
        assert_eq!(trending[0].to_string(), "trending_searches?geo=united_states");

        let suggest = Command::Suggest {
            keyword: " rus ".to_string(),
        }
        .descriptors(&display)
        .unwrap();
        assert_eq!(suggest[0].keywords(), vec!["rus"]);
    }

    #[test]
    fn test_descriptors_canonicalize_geo() {
        let display = DisplayConfig::default();
        let geo = ("geo".to_string(), "US".to_string());

        let mut interest = query(&["rust"]);
        interest.geo = Some("us".to_string());
        let descriptors = Command::Compare(interest.clone()).descriptors(&display).unwrap();
        assert!(descriptors.iter().all(|d| d.query_pairs().contains(&geo)));

        let regions = Command::Regions {
            keywords: vec!["rust".to_string()],
            geo: Some(" us ".to_string()),
            limit: None,
        }
        .descriptors(&display)
        .unwrap();
        assert!(regions[0].query_pairs().contains(&geo));

        let sub = Command::Interest(InterestQuery {
            geo: Some("us-ca".to_string()),
            ..interest.clone()
        })
        .descriptors(&display)
        .unwrap();
        assert!(sub[0]
            .query_pairs()
            .contains(&("geo".to_string(), "US-CA".to_string())));

        interest.geo = Some("usa".to_string());
        let err = Command::Interest(interest).descriptors(&display).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UserInput);
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(Command::Categories { filter: None });
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
