use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use gleaner_common::LogFormat;
use gleaner_common::observability::{LogConfig, init_logging};
use gleaner_config::GleanerConfigLoader;
use std::path::PathBuf;
mod session;

#[derive(Debug, Parser)]
#[command(name = "gleaner", version, about = "Scrape a web page and extract data from it with a local model")]
struct Cli {
    /// Configuration file (defaults: ./gleaner.yaml, then the user config dir)
    #[arg(long, global = true, env = "GLEANER_CONFIG")]
    config: Option<PathBuf>,

    /// Override extraction.max_segment_length
    #[arg(long, global = true)]
    max_segment_length: Option<usize>,

    /// Override logging.format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,

    /// Mirror logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Send progress notices to the log instead of stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the cleaned text of a page
    Scrape { url: String },
    /// Scrape a page once, then extract each description from it
    Parse {
        url: String,
        /// What to extract; repeatable. Read from stdin when omitted.
        #[arg(short = 'd', long = "describe")]
        descriptions: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Files first, env wins over both
    let loader = match &cli.config {
        Some(path) => GleanerConfigLoader::new().with_file(path),
        None => GleanerConfigLoader::new().with_default_locations(),
    };
    let mut cfg = loader.load()?;

    if let Some(n) = cli.max_segment_length {
        cfg.extraction.max_segment_length = n;
    }
    if let Some(format) = cli.log_format {
        cfg.logging.format = format.into();
    }
    if cli.verbose {
        cfg.logging.emit_stderr = true;
    }

    let log_path = init_logging(LogConfig::from_settings("gleaner", &cfg.logging))?;
    tracing::debug!(log = %log_path.display(), "logging initialised");

    match cli.command {
        Command::Scrape { url } => session::scrape(&cfg, &url, cli.quiet).await,
        Command::Parse { url, descriptions } => {
            session::parse(&cfg, &url, descriptions, cli.quiet).await
        }
    }
}
