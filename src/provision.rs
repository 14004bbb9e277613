use crate::config::{DOWNLOAD_CHUNK_SIZE, DOWNLOAD_TIMEOUT};
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadFailed {
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<io::Error> for DownloadFailed {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::TimedOut {
            return DownloadFailed::Timeout;
        }
        // ureq's body reader hands its own errors back wrapped in io::Error.
        match e.get_ref().and_then(|inner| inner.downcast_ref::<ureq::Error>()) {
            Some(ureq::Error::Timeout(_)) => DownloadFailed::Timeout,
            Some(ureq::Error::Io(io)) if io.kind() == io::ErrorKind::TimedOut => {
                DownloadFailed::Timeout
            }
            _ => DownloadFailed::Transport(e.to_string()),
        }
    }
}

/// A remote file that must exist locally before the game can start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub label: String,
    pub url: String,
    pub path: PathBuf,
}

impl Asset {
    pub fn new(label: &str, url: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.to_string(),
            url: url.to_string(),
            path: path.into(),
        }
    }

    pub fn is_present(&self) -> bool {
        self.path.exists()
    }

    /// Where the body is staged until it is complete.
    pub fn partial_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".part");
        self.path.with_file_name(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub label: String,
    pub percent: u8,
}

impl Progress {
    pub fn new(label: &str, percent: u8) -> Self {
        Self {
            label: label.to_string(),
            percent,
        }
    }
}

pub struct Response {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read>,
}

/// One outbound GET. Implementations follow redirects and hand back
/// non-success statuses as responses rather than errors.
pub trait Transport {
    fn get(&self, url: &str) -> Result<Response, DownloadFailed>;
}

pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_timeout(DOWNLOAD_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Response, DownloadFailed> {
        let resp = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Timeout(_) => DownloadFailed::Timeout,
            ureq::Error::Io(io) => DownloadFailed::from(io),
            other => DownloadFailed::Transport(other.to_string()),
        })?;
        let status = resp.status().as_u16();
        let content_length = resp.body().content_length();
        Ok(Response {
            status,
            content_length,
            body: Box::new(resp.into_body().into_reader()),
        })
    }
}

pub fn percent_of(received: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (received.saturating_mul(100) / total).min(100) as u8
}

enum State {
    Pending,
    Streaming {
        body: Box<dyn Read>,
        file: File,
        received: u64,
        total: Option<u64>,
    },
    Finished,
}

/// Lazily fetches one asset, yielding a progress item per received chunk.
///
/// Nothing happens until the first `next()`. When the destination already
/// exists the iterator is empty and no request is made. The body is written
/// to [`Asset::partial_path`] and only renamed into place once complete, so
/// the destination never holds a truncated file. Failing, or dropping the
/// iterator mid-stream, removes the staged file.
pub struct Download<'a, T: Transport + ?Sized> {
    transport: &'a T,
    asset: &'a Asset,
    partial: PathBuf,
    state: State,
    buf: Vec<u8>,
}

impl<'a, T: Transport + ?Sized> Download<'a, T> {
    pub fn new(transport: &'a T, asset: &'a Asset) -> Self {
        Self {
            transport,
            asset,
            partial: asset.partial_path(),
            state: State::Pending,
            buf: Vec::new(),
        }
    }

    fn start(&mut self) -> Result<bool, DownloadFailed> {
        if self.asset.is_present() {
            debug!("'{}' already present, skipping download.", self.asset.label);
            return Ok(false);
        }
        info!("Downloading {} from {}", self.asset.label, self.asset.url);

        let resp = self.transport.get(&self.asset.url)?;
        if !(200..300).contains(&resp.status) {
            return Err(DownloadFailed::Status(resp.status));
        }
        let file = File::create(&self.partial).map_err(|source| DownloadFailed::Write {
            path: self.partial.clone(),
            source,
        })?;

        self.buf = vec![0; DOWNLOAD_CHUNK_SIZE];
        self.state = State::Streaming {
            body: resp.body,
            file,
            received: 0,
            total: resp.content_length,
        };
        Ok(true)
    }

    // Ok(None) once the body is exhausted.
    fn pump(&mut self) -> Result<Option<Progress>, DownloadFailed> {
        let State::Streaming {
            body,
            file,
            received,
            total,
        } = &mut self.state
        else {
            return Ok(None);
        };

        loop {
            let n = match body.read(&mut self.buf) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                file.flush().map_err(|source| DownloadFailed::Write {
                    path: self.partial.clone(),
                    source,
                })?;
                if let Some(total) = *total {
                    if *received < total {
                        return Err(DownloadFailed::Transport(format!(
                            "body ended after {} of {} bytes",
                            received, total
                        )));
                    }
                }
                debug!("Received {} bytes of {}.", received, self.asset.label);
                return Ok(None);
            }

            file.write_all(&self.buf[..n])
                .map_err(|source| DownloadFailed::Write {
                    path: self.partial.clone(),
                    source,
                })?;
            *received += n as u64;

            // Unknown length: keep streaming without reporting.
            if let Some(total) = *total {
                return Ok(Some(Progress::new(
                    &self.asset.label,
                    percent_of(*received, total),
                )));
            }
        }
    }

    // Closes the staged file and moves it into place.
    fn finish(&mut self) -> Result<(), DownloadFailed> {
        self.state = State::Finished;
        fs::rename(&self.partial, &self.asset.path).map_err(|source| DownloadFailed::Write {
            path: self.asset.path.clone(),
            source,
        })?;
        info!("Downloaded {} to '{}'.", self.asset.label, self.asset.path.display());
        Ok(())
    }

    fn fail(&mut self, e: DownloadFailed) -> DownloadFailed {
        // Drop the handle before removing the file.
        self.state = State::Finished;
        remove_partial(&self.partial);
        warn!("Download of {} failed: {}", self.asset.label, e);
        e
    }
}

impl<'a, T: Transport + ?Sized> Drop for Download<'a, T> {
    fn drop(&mut self) {
        if let State::Streaming { .. } = self.state {
            self.state = State::Finished;
            debug!("Download of {} abandoned.", self.asset.label);
            remove_partial(&self.partial);
        }
    }
}

impl<'a, T: Transport + ?Sized> Iterator for Download<'a, T> {
    type Item = Result<Progress, DownloadFailed>;

    fn next(&mut self) -> Option<Self::Item> {
        if let State::Pending = self.state {
            match self.start() {
                Ok(true) => {}
                Ok(false) => {
                    self.state = State::Finished;
                    return None;
                }
                Err(e) => return Some(Err(self.fail(e))),
            }
        }

        match self.pump() {
            Ok(Some(progress)) => Some(Ok(progress)),
            Ok(None) => match self.state {
                State::Streaming { .. } => match self.finish() {
                    Ok(()) => None,
                    Err(e) => Some(Err(self.fail(e))),
                },
                _ => None,
            },
            Err(e) => Some(Err(self.fail(e))),
        }
    }
}

impl<'a, T: Transport + ?Sized> std::iter::FusedIterator for Download<'a, T> {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    AlreadyPresent,
    Downloaded,
}

/// Makes sure `asset` exists locally, forwarding each progress item.
pub fn ensure_asset<T, F>(transport: &T, asset: &Asset, mut on_progress: F) -> Result<Fetched, DownloadFailed>
where
    T: Transport + ?Sized,
    F: FnMut(Progress),
{
    if asset.is_present() {
        return Ok(Fetched::AlreadyPresent);
    }
    for item in Download::new(transport, asset) {
        on_progress(item?);
    }
    Ok(Fetched::Downloaded)
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed partial file '{}'.", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial file '{}': {}", path.display(), e),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;

    /// Serves canned bodies in fixed-size reads.
    pub struct ChunkedBody {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
        fail_after: Option<usize>,
    }

    impl Read for ChunkedBody {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if let Some(limit) = self.fail_after {
                if self.pos >= limit {
                    return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"));
                }
            }
            let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[derive(Clone)]
    pub enum Reply {
        Body {
            status: u16,
            data: Vec<u8>,
            chunk: usize,
            declare_length: bool,
            fail_after: Option<usize>,
        },
        Refused,
    }

    impl Reply {
        pub fn ok(data: Vec<u8>, chunk: usize) -> Self {
            Reply::Body {
                status: 200,
                data,
                chunk,
                declare_length: true,
                fail_after: None,
            }
        }

        pub fn status(status: u16) -> Self {
            Reply::Body {
                status,
                data: b"error page".to_vec(),
                chunk: 64,
                declare_length: true,
                fail_after: None,
            }
        }
    }

    /// In-memory transport that counts requests.
    #[derive(Default)]
    pub struct FakeTransport {
        replies: HashMap<String, Reply>,
        pub calls: Cell<usize>,
    }

    impl FakeTransport {
        pub fn with(mut self, url: &str, reply: Reply) -> Self {
            self.replies.insert(url.to_string(), reply);
            self
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str) -> Result<Response, DownloadFailed> {
            self.calls.set(self.calls.get() + 1);
            match self.replies.get(url).cloned() {
                Some(Reply::Body {
                    status,
                    data,
                    chunk,
                    declare_length,
                    fail_after,
                }) => Ok(Response {
                    status,
                    content_length: declare_length.then_some(data.len() as u64),
                    body: Box::new(ChunkedBody {
                        data,
                        pos: 0,
                        chunk,
                        fail_after,
                    }),
                }),
                Some(Reply::Refused) | None => {
                    Err(DownloadFailed::Transport("connection refused".into()))
                }
            }
        }
    }
}
