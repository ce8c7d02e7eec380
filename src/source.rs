use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempPath;
use tracing::{debug, info, warn};

const READ_BUFFER_SIZE: usize = 64 * 1024;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Location of the source guide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Local XMLTV file
    File(PathBuf),
    /// Remote XMLTV document fetched over HTTP(S)
    Url(String),
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

impl InputSource {
    /// Makes the guide available as a local file.
    ///
    /// Local files are used in place. URLs are downloaded into a temporary
    /// file that is removed when the returned value is dropped or cleaned up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a local file is missing, or
    /// [`Error::Download`] if the remote fetch fails on every attempt.
    pub fn acquire(&self, config: &DownloadConfig) -> Result<AcquiredInput> {
        match self {
            Self::File(path) => {
                if !path.is_file() {
                    return Err(Error::io(
                        path,
                        io::Error::new(io::ErrorKind::NotFound, "input file not found"),
                    ));
                }
                Ok(AcquiredInput {
                    path: path.clone(),
                    temp: None,
                })
            }
            Self::Url(url) => {
                let temp = Downloader::new(config).download(url)?;
                info!("Downloaded: {} → {}", url, temp.display());
                Ok(AcquiredInput {
                    path: temp.to_path_buf(),
                    temp: Some(temp),
                })
            }
        }
    }
}

/// A guide that is readable from the local filesystem.
#[derive(Debug)]
pub struct AcquiredInput {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl AcquiredInput {
    /// Path of the readable file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the file is a temporary download.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }

    /// Opens a buffered reader, decompressing gzip input transparently.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn reader(&self) -> Result<Box<dyn BufRead>> {
        let file = File::open(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let is_gzip = reader
            .fill_buf()
            .map_err(|e| Error::io(&self.path, e))?
            .starts_with(&GZIP_MAGIC);

        if is_gzip {
            debug!("Input {} is gzip-compressed", self.path.display());
            Ok(Box::new(BufReader::with_capacity(
                READ_BUFFER_SIZE,
                GzDecoder::new(reader),
            )))
        } else {
            Ok(Box::new(reader))
        }
    }

    /// Removes a downloaded temporary file. Local inputs are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be deleted.
    pub fn cleanup(self) -> Result<()> {
        if let Some(temp) = self.temp {
            temp.close().map_err(|e| Error::io(&self.path, e))?;
            info!("Removed temporary file: {}", self.path.display());
        }
        Ok(())
    }
}

/// Streams a remote guide into a temporary file.
struct Downloader<'a> {
    config: &'a DownloadConfig,
    agent: ureq::Agent,
}

impl<'a> Downloader<'a> {
    fn new(config: &'a DownloadConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .timeout_connect(Some(Duration::from_secs(config.connect_timeout_secs)))
            .build()
            .new_agent();

        Self { config, agent }
    }

    /// Downloads `url`, retrying up to `max_retries` attempts.
    fn download(&self, url: &str) -> Result<TempPath> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.try_download(url) {
                Ok(temp) => return Ok(temp),
                Err(message) => {
                    if attempts >= self.config.max_retries {
                        return Err(Error::download(
                            url,
                            format!("failed after {attempts} attempt(s): {message}"),
                        ));
                    }

                    warn!(
                        "Download attempt {}/{} failed: {}",
                        attempts, self.config.max_retries, message
                    );
                    std::thread::sleep(Duration::from_millis(self.config.retry_delay_ms));
                }
            }
        }
    }

    fn try_download(&self, url: &str) -> std::result::Result<TempPath, String> {
        let response = self
            .agent
            .get(url)
            .header("User-Agent", &self.config.user_agent)
            .call()
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if status != 200 {
            return Err(format!("HTTP error: {status}"));
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("xmltv-").suffix(".xml");
        let file = match &self.config.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        let mut file = file.map_err(|e| format!("create temporary file failed: {e}"))?;

        let mut body = response.into_body().into_reader();
        let bytes = io::copy(&mut body, &mut file).map_err(|e| format!("read failed: {e}"))?;
        debug!("Received {} bytes from {}", bytes, url);

        Ok(file.into_temp_path())
    }
}
