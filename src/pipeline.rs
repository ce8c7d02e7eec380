use crate::{
    config::Config,
    document::Document,
    epg::{ChannelFilter, FilterReport},
    error::Result,
    writer::OutputWriter,
};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Statistics collected during a filter run.
#[derive(Debug, Clone, Serialize)]
pub struct FilterStats {
    /// Source description (path or URL)
    pub input: String,

    /// Output file path
    pub output: String,

    /// Number of requested channel names
    pub requested_channels: usize,

    /// What the filter kept and changed
    #[serde(flatten)]
    pub report: FilterReport,

    /// Size of the written document in bytes
    pub output_bytes: usize,

    /// Time spent acquiring the input
    pub acquire_duration: Duration,

    /// Time spent parsing
    pub parse_duration: Duration,

    /// Time spent filtering and serializing
    pub filter_duration: Duration,

    /// Total execution time
    pub duration: Duration,

    /// Completion timestamp
    pub generated_at: String,
}

impl FilterStats {
    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              XMLTV Filter Summary                     ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!(
            "║ Requested channels:   {:>8}                        ║",
            self.requested_channels
        );
        println!(
            "║ Channels kept:        {:>8} / {:<8}             ║",
            self.report.channels_kept, self.report.channels_total
        );
        println!(
            "║ Programmes kept:      {:>8} / {:<8}             ║",
            self.report.programmes_kept, self.report.programmes_total
        );
        println!(
            "║ Stop placeholders:    {:>8}                        ║",
            self.report.placeholder_stops_removed
        );
        println!(
            "║ Texts repaired:       {:>8}                        ║",
            self.report.texts_repaired
        );
        println!("║                                                       ║");
        println!("║ Output:                                               ║");
        println!("║   {}", self.output);
        println!(
            "║ Total time:           {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }

    /// Serializes the statistics as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs acquire, parse, filter, serialize and write for one guide.
pub struct Pipeline {
    config: Config,
    filter: ChannelFilter,
    writer: OutputWriter,
}

impl Pipeline {
    /// Creates a new pipeline with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let filter = ChannelFilter::new(config.channels.iter().cloned());
        let writer = OutputWriter::new(&config.output);

        Ok(Self {
            config,
            filter,
            writer,
        })
    }

    /// Executes the run and returns statistics.
    ///
    /// The output file is only written once the whole document has been
    /// parsed, filtered and serialized. A downloaded input is removed
    /// afterwards, also on failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be acquired or parsed, or if
    /// the output cannot be written.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use xmltv_split::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .input_url("https://example.com/epg.xml.gz")
    ///     .output("filtered.xml")
    ///     .channels(["Das Erste", "ZDF"])
    ///     .build()?;
    ///
    /// let stats = Pipeline::new(config)?.run()?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(input = %self.config.input))]
    pub fn run(self) -> Result<FilterStats> {
        let start_time = Instant::now();

        info!("Stage 1/3: Acquiring input...");
        let input = self.config.input.acquire(&self.config.download)?;
        let acquire_duration = start_time.elapsed();

        info!("Stage 2/3: Parsing {}...", input.path().display());
        let parse_start = Instant::now();
        let document = Document::parse(input.reader()?)?;
        let parse_duration = parse_start.elapsed();
        input.cleanup()?;

        info!("Stage 3/3: Filtering {} channel name(s)...", self.filter.names().len());
        let filter_start = Instant::now();
        let outcome = self.filter.apply(&document);
        drop(document);

        if outcome.allowed_ids.is_empty() {
            warn!("No channel matched the requested names; output will be empty");
        }

        let bytes = outcome.document.to_bytes()?;
        self.writer.write(&bytes)?;
        let filter_duration = filter_start.elapsed();

        let report = outcome.report;
        info!(
            "✓ Kept {}/{} channels and {}/{} programmes",
            report.channels_kept,
            report.channels_total,
            report.programmes_kept,
            report.programmes_total
        );
        info!("✓ Filtered XMLTV saved to: {}", self.config.output.display());

        Ok(FilterStats {
            input: self.config.input.to_string(),
            output: self.config.output.display().to_string(),
            requested_channels: self.filter.names().len(),
            report,
            output_bytes: bytes.len(),
            acquire_duration,
            parse_duration,
            filter_duration,
            duration: start_time.elapsed(),
            generated_at: chrono::Local::now()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        })
    }
}
