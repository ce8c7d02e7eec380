//! # xmltv-split
//!
//! Filters XMLTV electronic program guides down to a chosen set of channels.
//!
//! ## Features
//!
//! - Exact channel selection by display name
//! - Repair of UTF-8 text that was mis-decoded as Latin-1
//! - Removal of the `19700101000000 +0000` placeholder stop time
//! - Local files or remote URLs, plain or gzip-compressed
//! - Atomic output writes
//!
//! ## Quick Start
//!
//! ```no_run
//! use xmltv_split::{Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .input_path("guide.xml")
//!     .output("filtered.xml")
//!     .channels(["RTL", "ProSieben"])
//!     .build()?;
//!
//! Pipeline::new(config)?.run()?;
//! # Ok(())
//! # }
//! ```
//!
//! The filter itself works on in-memory documents:
//!
//! ```
//! use xmltv_split::{ChannelFilter, Document};
//!
//! # fn main() -> xmltv_split::Result<()> {
//! let guide = Document::parse_str(
//!     r#"<tv><channel id="a"><display-name>RTL</display-name></channel></tv>"#,
//! )?;
//! let outcome = ChannelFilter::new(["RTL"]).apply(&guide);
//! assert_eq!(outcome.report.channels_kept, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! A run is a single pass:
//! 1. **Source**: Makes the guide readable, downloading it if needed
//! 2. **Document**: Parses the XML into a tree
//! 3. **Filter**: Builds a new tree with matching channels and programmes
//! 4. **Writer**: Serializes and atomically persists the result

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod document;
mod epg;
mod error;
mod pipeline;
mod source;
mod text;
mod writer;

pub use config::{parse_channel_list, Config, ConfigBuilder, DownloadConfig};
pub use document::{Document, Element, Node};
pub use epg::{AllowedIds, ChannelFilter, FilterOutcome, FilterReport, PLACEHOLDER_STOP};
pub use error::{Error, Result};
pub use pipeline::{FilterStats, Pipeline};
pub use source::{AcquiredInput, InputSource};
pub use text::{normalize_text, repair_text};

/// Runs a complete filter pass with the given configuration.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - The input cannot be read or downloaded
/// - The input is not well-formed XML
/// - The output cannot be written
pub fn run(config: Config) -> Result<FilterStats> {
    Pipeline::new(config)?.run()
}
