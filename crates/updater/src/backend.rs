//! Object-store abstraction the publisher and client talk to.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::io;
use std::path::PathBuf;
use tokio_util::io::ReaderStream;

use crate::error::{Result, UpdaterError};

/// Streaming body of a repository object.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Factory producing a fresh request body for every upload attempt.
///
/// Retried PUTs must resend the body from the start, so callers hand the
/// backend a reopenable source instead of a one-shot stream.
pub struct OpenBody {
    open: Box<dyn Fn() -> io::Result<ByteStream> + Send + Sync>,
}

impl OpenBody {
    /// Build a body factory from an arbitrary open function.
    pub fn new(open: impl Fn() -> io::Result<ByteStream> + Send + Sync + 'static) -> Self {
        Self { open: Box::new(open) }
    }

    /// Body that replays an in-memory byte buffer.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self::new(move || {
            let data = data.clone();
            Ok(stream::once(async move { Ok(data) }).boxed())
        })
    }

    /// Body that reopens and streams a file on every attempt.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(move || {
            let file = std::fs::File::open(&path)?;
            let stream = ReaderStream::new(tokio::fs::File::from_std(file))
                .map(|chunk| chunk.map_err(UpdaterError::from));
            Ok(stream.boxed())
        })
    }

    /// Open a fresh body stream. Called once per upload attempt.
    pub fn open(&self) -> io::Result<ByteStream> {
        (self.open)()
    }
}

/// Minimal contract every repository backend implements.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stream the object at `path`. Missing or erroring objects surface as
    /// [`UpdaterError::BackendStatus`].
    async fn get(&self, path: &str) -> Result<ByteStream>;

    /// Upload an object, reopening `body` for every attempt.
    async fn put(&self, path: &str, body: &OpenBody, content_type: &str) -> Result<()>;

    /// Whether the object at `path` exists.
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Read a full object into memory, for small well-known objects such as
/// public keys and manifests.
pub async fn read_all(mut body: ByteStream) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    while let Some(chunk) = body.next().await {
        out.extend_from_slice(&chunk?);
    }
    Ok(out)
}

/// In-memory [`Backend`] used as the test double for the HTTP one.
#[derive(Default)]
pub struct MemoryBackend {
    objects: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite an object directly.
    pub fn insert(&self, path: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(path.to_string(), data);
    }

    /// Snapshot of an object's bytes, if present.
    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<ByteStream> {
        let data = self
            .objects
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| UpdaterError::BackendStatus { status: 404, url: path.to_string() })?;
        Ok(stream::once(async move { Ok(Bytes::from(data)) }).boxed())
    }

    async fn put(&self, path: &str, body: &OpenBody, _content_type: &str) -> Result<()> {
        let data = read_all(body.open()?).await?;
        self.insert(path, data);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(path))
    }
}
