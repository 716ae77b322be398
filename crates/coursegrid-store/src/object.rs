//! Filesystem object store
//!
//! Objects live under a root directory; remote paths are `/`-separated and
//! relative to it. Retrieval URLs carry an expiry timestamp and an
//! HMAC-SHA256 tag over `(path, expiry)` keyed by a shared secret, verifiable
//! with [`LocalObjectStore::verify`].
//!
//! Without a secret the tag only detects accidental edits: anyone can mint a
//! valid URL. An unsigned store is for local use only.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use coursegrid_core::{ObjectStore, SignedUrl, StoreError};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Object store backed by a local directory
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
    base_url: String,
    secret: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: "http://localhost:8080/objects".into(),
            secret: String::new(),
        }
    }

    /// Public URL prefix for signed links
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Signing secret
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    /// Whether URLs are keyed by a non-empty secret
    pub fn is_keyed(&self) -> bool {
        !self.secret.is_empty()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path for a remote path; rejects absolute paths and `..`
    pub fn resolve(&self, remote_path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(remote_path);
        let clean = !remote_path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StoreError::InvalidPath(remote_path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// URL for `remote_path` expiring at `expires_at`
    pub fn sign(&self, remote_path: &str, expires_at: DateTime<Utc>) -> Result<SignedUrl, StoreError> {
        let expires = expires_at.timestamp();
        let signature = URL_SAFE_NO_PAD.encode(self.mac(remote_path, expires)?.finalize().into_bytes());
        Ok(SignedUrl {
            url: format!(
                "{}/{}?expires={}&signature={}",
                self.base_url,
                encode_path(remote_path),
                expires,
                signature
            ),
            expires_at,
        })
    }

    /// Check a signature produced by [`sign`](Self::sign) at time `now`
    ///
    /// The tag comparison runs in constant time.
    pub fn verify(&self, remote_path: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> bool {
        if now.timestamp() > expires {
            return false;
        }
        let Ok(tag) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        self.mac(remote_path, expires)
            .map(|mac| mac.verify_slice(&tag).is_ok())
            .unwrap_or(false)
    }

    fn mac(&self, remote_path: &str, expires: i64) -> Result<HmacSha256, StoreError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| StoreError::Signing(e.to_string()))?;
        mac.update(remote_path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    fn collect(&self, dir: &Path, out: &mut Vec<String>) -> Result<(), StoreError> {
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.collect(&path, out)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let key: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(key.join("/"));
            }
        }
        Ok(())
    }
}

impl ObjectStore for LocalObjectStore {
    fn upload(&self, local_path: &Path, remote_path: &str, content_type: &str) -> Result<(), StoreError> {
        let target = self.resolve(remote_path)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = std::fs::copy(local_path, &target)?;
        debug!(remote_path, content_type, bytes, "uploaded object");
        Ok(())
    }

    fn signed_url(&self, remote_path: &str, ttl: std::time::Duration) -> Result<SignedUrl, StoreError> {
        let target = self.resolve(remote_path)?;
        if !target.is_file() {
            return Err(StoreError::NotFound(remote_path.to_string()));
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|_| StoreError::InvalidPath(format!("ttl out of range for {remote_path}")))?;
        self.sign(remote_path, Utc::now() + ttl)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut all = Vec::new();
        self.collect(&self.root, &mut all)?;
        let mut matching: Vec<String> = all.into_iter().filter(|p| p.starts_with(prefix)).collect();
        matching.sort();
        Ok(matching)
    }

    fn open(&self, remote_path: &str) -> Result<Box<dyn Read + Send>, StoreError> {
        let path = self.resolve(remote_path)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(remote_path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Percent-encode a path, keeping `/` and RFC 3986 unreserved bytes
fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
