use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use xmltv_split::{parse_channel_list, Config, Pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "xmltv-split",
    version,
    author,
    about = "Filter XMLTV EPG file for selected channels",
    long_about = "Filter an XMLTV EPG file down to a set of channels.\n\n\
    Channels are matched by their first display name. Programmes of the \
    matched channels are kept, their text is repaired when it was decoded \
    with the wrong encoding, and placeholder stop times are removed.\n\n\
    USAGE EXAMPLES:\n  \
      # Filter a local file\n  \
      xmltv-split --input guide.xml --output filtered.xml --channels \"RTL,ProSieben\"\n\n  \
      # Download the guide first\n  \
      xmltv-split --url-extern https://example.com/epg.xml.gz --output filtered.xml --channels RTL"
)]
struct Cli {
    /// Path to input XMLTV file
    #[arg(long, value_name = "PATH", required_unless_present = "url_extern")]
    input: Option<PathBuf>,

    /// Path to output filtered XMLTV file
    #[arg(long, value_name = "PATH")]
    output: PathBuf,

    /// Comma-separated list of channel names (e.g., RTL,ProSieben)
    #[arg(long, value_name = "LIST")]
    channels: String,

    /// External URL to fetch the XMLTV file from (overrides --input)
    #[arg(long, value_name = "URL")]
    url_extern: Option<String>,

    /// Download attempts before giving up
    #[arg(long, default_value_t = 3, value_name = "N")]
    retries: u32,

    /// Time limit per download attempt in seconds
    #[arg(long, default_value_t = 600, value_name = "SECS")]
    timeout: u64,

    /// Print run statistics as JSON to stdout
    #[arg(long)]
    summary: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    let mut builder = Config::builder()
        .output(cli.output)
        .channels(parse_channel_list(&cli.channels))
        .max_retries(cli.retries)
        .timeout_secs(cli.timeout);

    if let Some(input) = cli.input {
        builder = builder.input_path(input);
    }

    if let Some(url) = cli.url_extern {
        builder = builder.input_url(url);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let stats = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .run()
        .context("Filtering failed")?;

    if cli.summary {
        println!("{}", stats.to_json().context("Failed to serialize summary")?);
    } else if cli.verbose > 0 {
        stats.print_summary();
    }

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("xmltv_split=info"),
        1 => EnvFilter::new("xmltv_split=debug"),
        _ => EnvFilter::new("xmltv_split=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .init();

    Ok(())
}
