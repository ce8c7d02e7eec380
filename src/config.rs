use crate::error::{Error, Result};
use crate::source::InputSource;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TIMEOUT_SECS: u64 = 600;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
const DEFAULT_USER_AGENT: &str = concat!("xmltv-split/", env!("CARGO_PKG_VERSION"));

/// Splits a comma-separated channel list into a set of trimmed names.
///
/// Duplicates collapse. An empty list yields the single empty name.
///
/// # Examples
///
/// ```
/// use xmltv_split::parse_channel_list;
///
/// let names = parse_channel_list("RTL, ProSieben ,RTL");
/// assert_eq!(names.len(), 2);
/// assert!(names.contains("ProSieben"));
/// ```
#[must_use]
pub fn parse_channel_list(list: &str) -> BTreeSet<String> {
    list.split(',').map(|name| name.trim().to_string()).collect()
}

/// Settings for fetching a remote guide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Time limit for one download attempt, body included, in seconds
    pub timeout_secs: u64,
    /// Number of attempts before giving up
    pub max_retries: u32,
    /// Pause between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// User-Agent header sent with the request
    pub user_agent: String,
    /// Directory for downloaded files; the system temp dir when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            temp_dir: None,
        }
    }
}

/// Configuration for a filter run.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Where the source guide comes from
    pub input: InputSource,

    /// Destination of the filtered guide
    pub output: PathBuf,

    /// Channel display names to keep
    pub channels: BTreeSet<String>,

    /// Remote fetch settings
    pub download: DownloadConfig,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use xmltv_split::Config;
    ///
    /// let config = Config::builder()
    ///     .input_path("guide.xml")
    ///     .output("filtered.xml")
    ///     .channels(["RTL", "ProSieben"])
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The local input file doesn't exist
    /// - The input URL is not http(s)
    /// - The output path is empty or an existing directory
    /// - `max_retries` is zero
    /// - The temp directory is set but missing
    pub fn validate(&self) -> Result<()> {
        match &self.input {
            InputSource::File(path) => {
                if !path.is_file() {
                    return Err(Error::config(format!(
                        "Input file does not exist: {}",
                        path.display()
                    )));
                }
            }
            InputSource::Url(url) => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(Error::config(format!(
                        "Input URL must use http or https: {url}"
                    )));
                }
            }
        }

        if self.output.as_os_str().is_empty() {
            return Err(Error::config("Output path must not be empty"));
        }

        if self.output.is_dir() {
            return Err(Error::config(format!(
                "Output path is a directory: {}",
                self.output.display()
            )));
        }

        if self.download.max_retries == 0 {
            return Err(Error::config("max_retries must be greater than 0"));
        }

        if let Some(dir) = &self.download.temp_dir {
            if !dir.is_dir() {
                return Err(Error::config(format!(
                    "Temp directory does not exist: {}",
                    dir.display()
                )));
            }
        }

        Ok(())
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    input_path: Option<PathBuf>,
    input_url: Option<String>,
    output: Option<PathBuf>,
    channels: BTreeSet<String>,
    download: DownloadConfig,
}

impl ConfigBuilder {
    /// Reads the guide from a local file.
    #[must_use]
    pub fn input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = Some(path.into());
        self
    }

    /// Fetches the guide from a URL. Takes precedence over [`Self::input_path`].
    #[must_use]
    pub fn input_url(mut self, url: impl Into<String>) -> Self {
        self.input_url = Some(url.into());
        self
    }

    /// Sets the output file path.
    #[must_use]
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Adds channel names to keep. Names are used exactly as given.
    #[must_use]
    pub fn channels<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels.extend(names.into_iter().map(Into::into));
        self
    }

    /// Replaces the download settings.
    #[must_use]
    pub fn download(mut self, download: DownloadConfig) -> Self {
        self.download = download;
        self
    }

    /// Sets the number of download attempts.
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.download.max_retries = retries;
        self
    }

    /// Sets the time limit for one download attempt in seconds.
    #[must_use]
    pub const fn timeout_secs(mut self, secs: u64) -> Self {
        self.download.timeout_secs = secs;
        self
    }

    /// Stores downloads in `dir` instead of the system temp directory.
    #[must_use]
    pub fn temp_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.download.temp_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no input or output was given, or if validation
    /// fails.
    pub fn build(self) -> Result<Config> {
        let input = match (self.input_url, self.input_path) {
            (Some(url), _) => InputSource::Url(url),
            (None, Some(path)) => InputSource::File(path),
            (None, None) => {
                return Err(Error::config(
                    "An input is required: set an input path or an input URL",
                ));
            }
        };

        let output = self
            .output
            .ok_or_else(|| Error::config("An output path is required"))?;

        let config = Config {
            input,
            output,
            channels: self.channels,
            download: self.download,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_parse_channel_list_trims_and_dedups() {
        let names = parse_channel_list(" RTL ,ProSieben,RTL,  Das Erste");
        let names: Vec<_> = names.into_iter().collect();
        assert_eq!(names, vec!["Das Erste", "ProSieben", "RTL"]);
    }

    #[test]
    fn test_parse_channel_list_empty() {
        let names = parse_channel_list("");
        assert_eq!(names.len(), 1);
        assert!(names.contains(""));
    }

    #[test]
    fn test_build_with_local_input() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("guide.xml");
        input.write_str("<tv/>").unwrap();

        let config = Config::builder()
            .input_path(input.path())
            .output(temp.path().join("out.xml"))
            .channels(["RTL"])
            .build()
            .unwrap();

        assert_eq!(config.input, InputSource::File(input.path().to_path_buf()));
        assert_eq!(config.download, DownloadConfig::default());
        assert!(config.channels.contains("RTL"));
    }

    #[test]
    fn test_url_takes_precedence_over_path() {
        let temp = assert_fs::TempDir::new().unwrap();

        let config = Config::builder()
            .input_path(temp.path().join("missing.xml"))
            .input_url("https://example.com/epg.xml")
            .output(temp.path().join("out.xml"))
            .build()
            .unwrap();

        assert_eq!(
            config.input,
            InputSource::Url("https://example.com/epg.xml".to_string())
        );
    }

    #[test]
    fn test_missing_input_is_rejected() {
        let err = Config::builder().output("out.xml").build().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_missing_output_is_rejected() {
        let err = Config::builder()
            .input_url("http://example.com/epg.xml")
            .build()
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_nonexistent_input_file_is_rejected() {
        let result = Config::builder()
            .input_path("/nonexistent/path/that/should/not/exist.xml")
            .output("out.xml")
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_non_http_url_is_rejected() {
        let err = Config::builder()
            .input_url("ftp://example.com/epg.xml")
            .output("out.xml")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn test_output_directory_is_rejected() {
        let temp = assert_fs::TempDir::new().unwrap();

        let result = Config::builder()
            .input_url("http://example.com/epg.xml")
            .output(temp.path())
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_download_settings() {
        let temp = assert_fs::TempDir::new().unwrap();

        let config = Config::builder()
            .input_url("http://example.com/epg.xml")
            .output(temp.path().join("out.xml"))
            .timeout_secs(5)
            .temp_dir(temp.path())
            .build()
            .unwrap();

        assert_eq!(config.download.timeout_secs, 5);
        assert_eq!(config.download.temp_dir.as_deref(), Some(temp.path()));
    }

    #[test]
    fn test_missing_temp_dir_is_rejected() {
        let err = Config::builder()
            .input_url("http://example.com/epg.xml")
            .output("out.xml")
            .temp_dir("/nonexistent/tmp/dir")
            .build()
            .unwrap_err();

        assert!(err.is_config());
    }

    #[test]
    fn test_zero_retries_is_rejected() {
        let result = Config::builder()
            .input_url("http://example.com/epg.xml")
            .output("out.xml")
            .max_retries(0)
            .build();

        assert!(result.is_err());
    }
}
