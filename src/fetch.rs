//! Taxonomy document sources.
//!
//! A source answers "give me this document" with the bytes or a definite
//! `None`; it never returns an error. Network failures, timeouts, HTTP
//! error statuses and missing files are all logged and reported as absent.

use crate::config::TaxonomyConfig;
use crate::Result;
use ahash::AHashMap;
#[cfg(feature = "mmap")]
use memmap2::Mmap;
use std::fs::File;
use std::io::ErrorKind;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Raw document content.
pub enum DocumentBytes {
    Owned(Vec<u8>),
    #[cfg(feature = "mmap")]
    Mapped(Mmap),
}

impl Deref for DocumentBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            DocumentBytes::Owned(bytes) => bytes.as_slice(),
            #[cfg(feature = "mmap")]
            DocumentBytes::Mapped(map) => &map[..],
        }
    }
}

impl From<Vec<u8>> for DocumentBytes {
    fn from(bytes: Vec<u8>) -> Self {
        DocumentBytes::Owned(bytes)
    }
}

impl std::fmt::Debug for DocumentBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBytes").field("len", &self.len()).finish()
    }
}

pub trait DocumentSource: Send + Sync {
    /// Fetch a document by its path relative to the taxonomy root.
    fn fetch(&self, path: &str) -> Option<DocumentBytes>;

    /// Human-readable location of `path`, for logs.
    fn locate(&self, path: &str) -> String;
}

/// A document together with the candidate path that produced it.
#[derive(Debug)]
pub struct FetchedDocument {
    pub path: String,
    pub location: String,
    pub bytes: DocumentBytes,
}

/// Try each candidate in order and return the first one found.
pub fn fetch_first<S>(source: &S, candidates: &[String]) -> Option<FetchedDocument>
where
    S: DocumentSource + ?Sized,
{
    let found = candidates.iter().find_map(|path| fetch_one(source, path));
    if found.is_none() {
        warn!(candidates = ?candidates, "no candidate document could be fetched");
    }
    found
}

fn fetch_one<S>(source: &S, path: &str) -> Option<FetchedDocument>
where
    S: DocumentSource + ?Sized,
{
    let location = source.locate(path);
    match source.fetch(path) {
        Some(bytes) => {
            debug!(%location, bytes = bytes.len(), "fetched document");
            Some(FetchedDocument {
                path: path.to_string(),
                location,
                bytes,
            })
        }
        None => {
            debug!(%location, "document not available");
            None
        }
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Fetches documents below a base URL with a bounded per-request timeout.
#[derive(Debug)]
pub struct HttpSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(config: &TaxonomyConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.resolved_base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl DocumentSource for HttpSource {
    fn fetch(&self, path: &str) -> Option<DocumentBytes> {
        let url = self.locate(path);
        let response = match self.client.get(&url).send() {
            Ok(response) => response,
            Err(e) => {
                warn!(%url, error = %e, "request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(%url, %status, "document not served");
            return None;
        }

        match response.bytes() {
            Ok(body) => Some(DocumentBytes::Owned(body.to_vec())),
            Err(e) => {
                warn!(%url, error = %e, "failed to read response body");
                None
            }
        }
    }

    fn locate(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}

// ============================================================================
// Local mirror
// ============================================================================

/// Reads documents from a local copy of the taxonomy tree.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    #[cfg(feature = "mmap")]
    fn read(file: File) -> std::io::Result<DocumentBytes> {
        // Safety: taxonomy mirrors are read-only inputs for the run
        let map = unsafe { Mmap::map(&file)? };
        Ok(DocumentBytes::Mapped(map))
    }

    #[cfg(not(feature = "mmap"))]
    fn read(mut file: File) -> std::io::Result<DocumentBytes> {
        use std::io::Read;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(DocumentBytes::Owned(bytes))
    }
}

impl DocumentSource for DirectorySource {
    fn fetch(&self, path: &str) -> Option<DocumentBytes> {
        let full = self.path_of(path);
        let result = File::open(&full).and_then(Self::read);
        match result {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %full.display(), error = %e, "failed to read document");
                None
            }
        }
    }

    fn locate(&self, path: &str) -> String {
        self.path_of(path).display().to_string()
    }
}

// ============================================================================
// In memory
// ============================================================================

/// Documents held in memory, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: AHashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.documents.insert(path.into(), content.into());
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentSource for MemorySource {
    fn fetch(&self, path: &str) -> Option<DocumentBytes> {
        self.documents
            .get(path)
            .map(|bytes| DocumentBytes::Owned(bytes.clone()))
    }

    fn locate(&self, path: &str) -> String {
        format!("memory:{}", path)
    }
}
