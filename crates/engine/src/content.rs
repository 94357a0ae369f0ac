//! Lazy file contents with memoized SHA-256, and the encryption seam.
//!
//! Contents flow through a read → decrypt → template pipeline; each stage is
//! run at most once and the result is cached, so every consumer of an entry
//! sees identical bytes without re-running side effects.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::cell::OnceCell;
use subtle::ConstantTimeEq;
use tansu_core::AbsPath;

/// Memoized contents of a single entry.
///
/// Either constructed already resolved, or pending and resolved at most once
/// through [`LazyContents::get_or_try_init`].
#[derive(Debug, Default)]
pub struct LazyContents {
    contents: OnceCell<Vec<u8>>,
    sha256: OnceCell<[u8; 32]>,
}

impl LazyContents {
    /// Creates already-resolved contents.
    pub fn new(contents: Vec<u8>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(contents);
        LazyContents {
            contents: cell,
            sha256: OnceCell::new(),
        }
    }

    /// Creates pending contents, to be resolved on first access.
    pub fn pending() -> Self {
        Self::default()
    }

    /// Resolves the contents with `read` if they are still pending.
    pub fn get_or_try_init<F>(&self, read: F) -> Result<&[u8]>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        if self.contents.get().is_none() {
            let contents = read()?;
            let _ = self.contents.set(contents);
        }
        self.bytes()
    }

    /// The resolved contents.
    pub fn bytes(&self) -> Result<&[u8]> {
        self.contents
            .get()
            .map(Vec::as_slice)
            .ok_or_else(|| Error::State {
                message: "contents accessed before resolution".to_owned(),
            })
    }

    /// The SHA-256 of the resolved contents, computed once.
    pub fn sha256(&self) -> Result<&[u8; 32]> {
        let contents = self.bytes()?;
        Ok(self.sha256.get_or_init(|| sha256_digest(contents)))
    }

    pub fn is_resolved(&self) -> bool {
        self.contents.get().is_some()
    }
}

/// Computes the SHA-256 digest of `data`.
pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compares two digests in constant time.
pub fn digests_equal(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.as_slice().ct_eq(b.as_slice()).into()
}

/// The injected encryption tool.
///
/// The engine only ever decrypts; encryption support is optional and used by
/// the add path when a caller asks for an encrypted source entry.
pub trait EncryptionTool {
    fn decrypt(&self, path: &AbsPath, ciphertext: &[u8]) -> Result<Vec<u8>>;

    fn encrypt(&self, path: &AbsPath, _plaintext: &[u8]) -> Result<Vec<u8>> {
        Err(Error::Unsupported {
            message: format!("{path}: encryption tool does not support encryption"),
        })
    }
}

/// Encryption tool that passes contents through unchanged.
pub struct NullEncryptionTool;

impl EncryptionTool for NullEncryptionTool {
    fn decrypt(&self, _path: &AbsPath, ciphertext: &[u8]) -> Result<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }

    fn encrypt(&self, _path: &AbsPath, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(plaintext.to_vec())
    }
}
