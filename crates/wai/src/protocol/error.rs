use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Any error of this crate, for hosts that funnel everything through one `?`.
#[derive(Debug, Error)]
pub enum WaiError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: RequestError,
    },

    #[error("stream error: {source}")]
    StreamError {
        #[from]
        source: StreamError,
    },

    #[error("config error: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },
}

/// Failures observed while streaming a response body.
///
/// Every variant is scoped to the single response being streamed. Consumer-driven early
/// stop is not represented here, it ends a stream with
/// [`StreamEnd::Stopped`](crate::protocol::stream::StreamEnd::Stopped).
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("can't open file {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("read body error: {source}")]
    Read {
        #[from]
        source: io::Error,
    },

    #[error("body sink error: {reason}")]
    Sink { reason: String },

    #[error("body producer error: {reason}")]
    Producer { reason: String },

    #[error("stream producer finished without sending the response head")]
    MissingHead,
}

impl StreamError {
    pub fn open<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Self::Open { path: path.into(), source }
    }

    pub fn read<E: Into<io::Error>>(e: E) -> Self {
        Self::Read { source: e.into() }
    }

    pub fn sink<S: ToString>(str: S) -> Self {
        Self::Sink { reason: str.to_string() }
    }

    pub fn producer<S: ToString>(str: S) -> Self {
        Self::Producer { reason: str.to_string() }
    }

    /// Returns true if the failure happened before any byte of the body was produced.
    #[inline]
    pub fn is_open_error(&self) -> bool {
        matches!(self, StreamError::Open { .. })
    }
}

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("invalid request uri: {reason}")]
    InvalidUri { reason: String },
}

impl RequestError {
    pub fn invalid_uri<S: ToString>(str: S) -> Self {
        Self::InvalidUri { reason: str.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("block size must be greater than zero, current: {block_size}")]
    InvalidBlockSize { block_size: usize },
}

impl ConfigError {
    pub fn invalid_block_size(block_size: usize) -> Self {
        Self::InvalidBlockSize { block_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use crate::protocol::Request;

    fn build(uri: &str, block_size: usize) -> Result<(Request, StreamConfig), WaiError> {
        let request = Request::builder().uri(uri).build()?;
        let config = StreamConfig::builder().block_size(block_size).build()?;
        Ok((request, config))
    }

    #[test]
    fn errors_convert_into_wai_error() {
        assert!(build("/", 1024).is_ok());
        assert!(matches!(build("/a b", 1024), Err(WaiError::RequestError { .. })));
        assert!(matches!(build("/", 0), Err(WaiError::ConfigError { .. })));

        let error = WaiError::from(StreamError::MissingHead);
        assert!(error.to_string().starts_with("stream error:"));
    }
}
