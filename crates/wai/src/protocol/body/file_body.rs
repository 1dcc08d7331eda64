//! File content as a chunked body.
//!
//! [`FileBody`] owns the file handle for its whole life. The handle is released as soon
//! as the body can't produce anything more:
//!
//! - the requested byte count is exhausted
//! - a read returns zero bytes (end of file reached early)
//! - a read fails, before the error is reported
//! - the body is dropped, which is how a consumer stops early
//!
//! Reads are bounded by the configured block size, so peak memory per response is one
//! block and every block is a natural backpressure point: nothing is read before the
//! consumer polls for the next chunk.

use std::cmp;
use std::io::SeekFrom;
use std::path::Path;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tokio_util::io::poll_read_buf;
use tracing::{debug, trace};

use crate::config::StreamConfig;
use crate::protocol::{FilePart, StreamError};

/// Reads a file, or a window of it, as a sequence of chunks of at most `block_size` bytes.
#[derive(Debug)]
pub struct FileBody<R = File> {
    reader: Option<R>,
    /// bytes we may still read
    remaining: u64,
    /// bytes we expect to read, if the source length is known
    expected: Option<u64>,
    block_size: usize,
    buf: BytesMut,
}

impl FileBody<File> {
    /// Opens `path` read-only, positioned at the start of `part` if one is given.
    ///
    /// Open failure is reported as [`StreamError::Open`] and nothing is produced. An offset
    /// past the end of the file is not an error, the body is simply empty.
    pub async fn open<P: AsRef<Path>>(path: P, part: Option<FilePart>, config: &StreamConfig) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let mut file = File::open(path).await.map_err(|e| StreamError::open(path, e))?;

        let file_len = match file.metadata().await {
            Ok(metadata) if metadata.is_file() => Some(metadata.len()),
            // pipes, devices and procfs entries report a length that says nothing about their content
            Ok(_) => None,
            Err(e) => {
                debug!(path = %path.display(), cause = %e, "can't read file metadata, body size unknown");
                None
            }
        };

        let (offset, limit) = match part {
            Some(FilePart { offset, count }) => (offset, count),
            None => (0, u64::MAX),
        };

        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await.map_err(StreamError::read)?;
        }

        let expected = file_len.map(|len| cmp::min(len.saturating_sub(offset), limit));
        debug!(path = %path.display(), offset, expected = ?expected, "open file body");

        let mut body = Self::from_reader(file, Some(limit), config);
        body.expected = expected;
        Ok(body)
    }
}

impl<R> FileBody<R>
where
    R: AsyncRead + Unpin,
{
    /// Streams from any reader, reading at most `limit` bytes when a limit is given.
    pub fn from_reader(reader: R, limit: Option<u64>, config: &StreamConfig) -> Self {
        let block_size = config.block_size();
        Self {
            reader: Some(reader),
            remaining: limit.unwrap_or(u64::MAX),
            expected: None,
            block_size,
            buf: BytesMut::with_capacity(block_size),
        }
    }

    /// Returns true once the underlying handle has been released.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            trace!("file body closed");
        }
    }
}

impl<R> Body for FileBody<R>
where
    R: AsyncRead + Unpin,
{
    type Data = Bytes;
    type Error = StreamError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        let Some(reader) = this.reader.as_mut() else {
            return Poll::Ready(None);
        };

        if this.remaining == 0 {
            this.close();
            return Poll::Ready(None);
        }

        let block = cmp::min(this.block_size as u64, this.remaining);
        this.buf.reserve(block as usize);

        let mut limited = reader.take(block);
        match ready!(poll_read_buf(Pin::new(&mut limited), cx, &mut this.buf)) {
            Ok(0) => {
                this.close();
                Poll::Ready(None)
            }
            Ok(n) => {
                let n = n as u64;
                this.remaining -= n;
                this.expected = this.expected.map(|expected| expected.saturating_sub(n));
                Poll::Ready(Some(Ok(Frame::data(this.buf.split().freeze()))))
            }
            Err(e) => {
                this.close();
                Poll::Ready(Some(Err(StreamError::read(e))))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.reader.is_none() || self.remaining == 0 || self.expected == Some(0)
    }

    fn size_hint(&self) -> SizeHint {
        if self.reader.is_none() {
            return SizeHint::with_exact(0);
        }

        match self.expected {
            Some(expected) => SizeHint::with_exact(expected),
            None => {
                let mut size_hint = SizeHint::new();
                if self.remaining != u64::MAX {
                    size_hint.set_upper(self.remaining);
                }
                size_hint
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::io::{self, Cursor, Write};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::NamedTempFile;
    use tokio::io::ReadBuf;

    fn fixture(len: usize) -> (NamedTempFile, Vec<u8>) {
        let content: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&content).unwrap();
        file.flush().unwrap();
        (file, content)
    }

    fn config(block_size: usize) -> StreamConfig {
        StreamConfig::builder().block_size(block_size).build().unwrap()
    }

    async fn chunks<B: Body<Data = Bytes> + Unpin>(mut body: B) -> Vec<Bytes>
    where
        B::Error: std::fmt::Debug,
    {
        let mut chunks = Vec::new();
        while let Some(frame) = body.frame().await {
            chunks.push(frame.unwrap().into_data().unwrap());
        }
        chunks
    }

    /// A reader that records how often it was polled and when it was dropped.
    struct TrackedReader {
        inner: Cursor<Vec<u8>>,
        reads: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
        fail_at: Option<usize>,
    }

    impl TrackedReader {
        fn new(content: Vec<u8>) -> (Self, Arc<AtomicUsize>, Arc<AtomicBool>) {
            let reads = Arc::new(AtomicUsize::new(0));
            let closed = Arc::new(AtomicBool::new(false));
            let reader = Self { inner: Cursor::new(content), reads: reads.clone(), closed: closed.clone(), fail_at: None };
            (reader, reads, closed)
        }
    }

    impl AsyncRead for TrackedReader {
        fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            let read = self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(read) {
                return Poll::Ready(Err(io::Error::other("disk on fire")));
            }
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl Drop for TrackedReader {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn whole_file_for_any_block_size() {
        let (file, content) = fixture(3000);

        for block_size in [1, 7, 4096, 65_536] {
            let body = FileBody::open(file.path(), None, &config(block_size)).await.unwrap();
            assert_eq!(body.size_hint().exact(), Some(3000));

            let chunks = chunks(body).await;
            assert!(chunks.iter().all(|chunk| chunk.len() <= block_size));
            assert_eq!(chunks.concat(), content);
        }
    }

    #[tokio::test]
    async fn range_is_exact() {
        let (file, content) = fixture(1000);

        let body = FileBody::open(file.path(), Some(FilePart::new(100, 50)), &config(16)).await.unwrap();
        assert_eq!(body.size_hint().exact(), Some(50));

        let chunks = chunks(body).await;
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.concat(), &content[100..150]);
    }

    #[tokio::test]
    async fn offset_past_end_is_empty() {
        let (file, _content) = fixture(100);

        let body = FileBody::open(file.path(), Some(FilePart::new(100, 10)), &StreamConfig::default()).await.unwrap();
        assert_eq!(body.size_hint().exact(), Some(0));
        assert!(chunks(body).await.is_empty());

        let body = FileBody::open(file.path(), Some(FilePart::new(5000, 10)), &StreamConfig::default()).await.unwrap();
        assert!(chunks(body).await.is_empty());
    }

    #[tokio::test]
    async fn count_past_end_stops_at_eof() {
        let (file, content) = fixture(100);

        let body = FileBody::open(file.path(), Some(FilePart::new(90, 50)), &StreamConfig::default()).await.unwrap();
        assert_eq!(body.size_hint().exact(), Some(10));
        assert_eq!(chunks(body).await.concat(), &content[90..]);
    }

    #[tokio::test]
    async fn zero_count_reads_nothing() {
        let (reader, reads, closed) = TrackedReader::new(vec![1, 2, 3]);
        let mut body = FileBody::from_reader(reader, Some(0), &StreamConfig::default());

        assert!(body.is_end_stream());
        assert!(body.frame().await.is_none());
        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn missing_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.txt");

        let result = FileBody::open(&path, None, &StreamConfig::default()).await;
        match result {
            Err(StreamError::Open { path: failed, source }) => {
                assert_eq!(failed, path);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn handle_released_at_exhaustion() {
        let (reader, _reads, closed) = TrackedReader::new(vec![7; 10]);
        let mut body = FileBody::from_reader(reader, None, &config(4));

        assert_eq!(body.frame().await.unwrap().unwrap().into_data().unwrap().len(), 4);
        assert_eq!(body.frame().await.unwrap().unwrap().into_data().unwrap().len(), 4);
        assert_eq!(body.frame().await.unwrap().unwrap().into_data().unwrap().len(), 2);
        assert!(!closed.load(Ordering::SeqCst));

        assert!(body.frame().await.is_none());
        assert!(closed.load(Ordering::SeqCst));
        assert!(body.is_closed());
    }

    #[tokio::test]
    async fn handle_released_on_drop() {
        let (reader, reads, closed) = TrackedReader::new(vec![7; 100]);
        let mut body = FileBody::from_reader(reader, None, &config(10));

        body.frame().await.unwrap().unwrap();
        drop(body);

        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handle_released_before_read_error_surfaces() {
        let (mut reader, _reads, closed) = TrackedReader::new(vec![7; 100]);
        reader.fail_at = Some(1);
        let mut body = FileBody::from_reader(reader, None, &config(10));

        assert!(body.frame().await.unwrap().is_ok());
        assert!(matches!(body.frame().await, Some(Err(StreamError::Read { .. }))));
        assert!(closed.load(Ordering::SeqCst));
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn unknown_length_reports_upper_bound() {
        let (reader, _reads, _closed) = TrackedReader::new(vec![7; 100]);
        let body = FileBody::from_reader(reader, Some(30), &StreamConfig::default());

        let size_hint = body.size_hint();
        assert_eq!(size_hint.exact(), None);
        assert_eq!(size_hint.upper(), Some(30));
        assert_eq!(chunks(body).await.concat().len(), 30);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn non_regular_file_has_no_exact_size() {
        let body = FileBody::open("/proc/self/status", None, &StreamConfig::default()).await.unwrap();

        assert_eq!(body.size_hint().exact(), None);
        assert!(!body.is_end_stream());
        assert!(!chunks(body).await.concat().is_empty());
    }
}
