use thiserror::Error;

/// Errors raised by an individual feed client.
///
/// A `None` result from `list_versions` is not an error — it means "this
/// protocol is not served here". These variants are for the cases that
/// are genuinely exceptional.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("network error contacting {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("feed at {url} returned a payload that could not be parsed: {reason}")]
    Protocol { url: String, reason: String },
    #[error("{name} {version} was not found on {url}")]
    NotFound {
        url: String,
        name: String,
        version: String,
    },
    #[error("local feed directory does not exist: {0}")]
    MissingDirectory(std::path::PathBuf),
    #[error("io error reading local feed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the disk cache layer. These are, by design, never fatal on
/// their own — callers swallow them and fall through to a refetch.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to read cache file {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write cache file {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache file {path} contains invalid JSON: {source}")]
    Deserialize {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("a previous attempt for this package is marked as failed (sticky error)")]
    Sticky(std::path::PathBuf),
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("download of {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server at {url} responded with {status}")]
    BadStatus { url: String, status: u16 },
    #[error("io error writing archive to {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("refusing to download: metadata has no remote download location")]
    NoRemoteLocation,
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("io error extracting archive: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive is corrupt or not a valid zip file: {0}")]
    BadArchive(#[from] zip::result::ZipError),
    #[error("archive content looks invalid (first bytes: {snippet:?})")]
    Invalid { snippet: String },
    #[error("refusing to extract entry {0:?}: escapes target directory")]
    UnsafePath(String),
}

/// The top-level error type surfaced across the crate boundary. Facade
/// functions return `color_eyre::Result<T>` built on this via `?`, so
/// internal layers still match on precise variants while external callers
/// get a single rich diagnostic type.
#[derive(Error, Debug)]
pub enum NuGetError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("{package} {version} could not be found on any of {attempted} configured source(s)")]
    NotFoundAnywhere {
        package: String,
        version: String,
        attempted: usize,
    },
    #[error("no versions of {package} were found across {attempted} configured source(s)")]
    NoVersions { package: String, attempted: usize },
}
