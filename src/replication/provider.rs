//! Mutation payloads.
//!
//! A payload may still be streaming in from the client when a write is
//! dispatched. Wrapping it in a [`BorrowedProvider`] lets the master path and
//! the local apply path share it: whichever reads first drains the source,
//! and both get the same `Bytes`.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DataProviderError {
    #[error("payload source was already consumed")]
    AlreadyConsumed,
    #[error("payload source failed: {0}")]
    Source(String),
    #[error("payload source produced {actual} bytes, announced {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// A one-shot payload source, e.g. the remainder of a client socket read.
pub trait DataSource: Send {
    fn size(&self) -> usize;
    fn read(self: Box<Self>) -> Result<Bytes, DataProviderError>;
}

#[derive(Clone)]
pub struct StreamedProvider {
    size: usize,
    source: Arc<Mutex<Option<Box<dyn DataSource>>>>,
}

impl StreamedProvider {
    pub fn new(source: Box<dyn DataSource>) -> Self {
        Self {
            size: source.size(),
            source: Arc::new(Mutex::new(Some(source))),
        }
    }

    fn read(&self) -> Result<Bytes, DataProviderError> {
        let source = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(DataProviderError::AlreadyConsumed)?;
        let bytes = source.read()?;
        if bytes.len() != self.size {
            return Err(DataProviderError::SizeMismatch {
                expected: self.size,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }
}

struct BorrowState {
    size: usize,
    source: Mutex<Option<DataProvider>>,
    buffer: OnceLock<Result<Bytes, DataProviderError>>,
}

/// Shared, read-once view of another provider.
#[derive(Clone)]
pub struct BorrowedProvider {
    state: Arc<BorrowState>,
}

impl BorrowedProvider {
    pub fn new(inner: DataProvider) -> Self {
        Self {
            state: Arc::new(BorrowState {
                size: inner.size(),
                source: Mutex::new(Some(inner)),
                buffer: OnceLock::new(),
            }),
        }
    }

    /// Another handle onto the same buffer.
    pub fn side_provider(&self) -> DataProvider {
        DataProvider::Borrowed(self.clone())
    }

    fn read(&self) -> Result<Bytes, DataProviderError> {
        self.state
            .buffer
            .get_or_init(|| {
                let source = self
                    .state
                    .source
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                match source {
                    Some(provider) => provider.read(),
                    None => Err(DataProviderError::AlreadyConsumed),
                }
            })
            .clone()
    }
}

#[derive(Clone)]
pub enum DataProvider {
    Buffered(Bytes),
    Streamed(StreamedProvider),
    Borrowed(BorrowedProvider),
}

impl DataProvider {
    pub fn buffered(bytes: impl Into<Bytes>) -> Self {
        DataProvider::Buffered(bytes.into())
    }

    pub fn streamed(source: Box<dyn DataSource>) -> Self {
        DataProvider::Streamed(StreamedProvider::new(source))
    }

    pub fn size(&self) -> usize {
        match self {
            DataProvider::Buffered(bytes) => bytes.len(),
            DataProvider::Streamed(streamed) => streamed.size,
            DataProvider::Borrowed(borrowed) => borrowed.state.size,
        }
    }

    pub fn read(&self) -> Result<Bytes, DataProviderError> {
        match self {
            DataProvider::Buffered(bytes) => Ok(bytes.clone()),
            DataProvider::Streamed(streamed) => streamed.read(),
            DataProvider::Borrowed(borrowed) => borrowed.read(),
        }
    }

    /// Wrap for sharing. Already-borrowed providers are returned as is.
    pub fn into_borrowed(self) -> BorrowedProvider {
        match self {
            DataProvider::Borrowed(borrowed) => borrowed,
            other => BorrowedProvider::new(other),
        }
    }
}

/// Buffered payloads compare by content, shared ones by identity.
impl PartialEq for DataProvider {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DataProvider::Buffered(a), DataProvider::Buffered(b)) => a == b,
            (DataProvider::Streamed(a), DataProvider::Streamed(b)) => {
                Arc::ptr_eq(&a.source, &b.source)
            }
            (DataProvider::Borrowed(a), DataProvider::Borrowed(b)) => {
                Arc::ptr_eq(&a.state, &b.state)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for DataProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataProvider::Buffered(bytes) => write!(f, "Buffered({} bytes)", bytes.len()),
            DataProvider::Streamed(s) => write!(f, "Streamed({} bytes)", s.size),
            DataProvider::Borrowed(b) => write!(f, "Borrowed({} bytes)", b.state.size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        payload: &'static [u8],
        reads: Arc<AtomicUsize>,
    }

    impl DataSource for Counting {
        fn size(&self) -> usize {
            self.payload.len()
        }

        fn read(self: Box<Self>) -> Result<Bytes, DataProviderError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from_static(self.payload))
        }
    }

    #[test]
    fn streamed_reads_once() {
        let reads = Arc::new(AtomicUsize::new(0));
        let provider = DataProvider::streamed(Box::new(Counting {
            payload: b"abc",
            reads: reads.clone(),
        }));
        assert_eq!(provider.size(), 3);
        assert_eq!(provider.read().unwrap(), "abc");
        assert_eq!(provider.read(), Err(DataProviderError::AlreadyConsumed));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn borrowed_shares_one_read() {
        let reads = Arc::new(AtomicUsize::new(0));
        let borrowed = DataProvider::streamed(Box::new(Counting {
            payload: b"hello",
            reads: reads.clone(),
        }))
        .into_borrowed();
        let side = borrowed.side_provider();
        let local = DataProvider::Borrowed(borrowed);

        assert_eq!(side, local);
        assert_eq!(side.read().unwrap(), "hello");
        assert_eq!(local.read().unwrap(), "hello");
        assert_eq!(local.read().unwrap(), "hello");
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn size_mismatch_is_reported() {
        struct Liar;
        impl DataSource for Liar {
            fn size(&self) -> usize {
                10
            }
            fn read(self: Box<Self>) -> Result<Bytes, DataProviderError> {
                Ok(Bytes::from_static(b"short"))
            }
        }
        let err = DataProvider::streamed(Box::new(Liar)).read().unwrap_err();
        assert_eq!(
            err,
            DataProviderError::SizeMismatch {
                expected: 10,
                actual: 5
            }
        );
    }
}
