//! Storage and File System Abstractions
//!
//! Provides the platform-agnostic file system trait used for credential
//! persistence and for writing the local mirror.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::Result;

/// File system access trait
///
/// Directory creation must be idempotent and safe under concurrent callers;
/// writes to distinct paths are independent of each other.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn mirror(fs: &dyn FileSystemAccess, data: &[u8]) -> Result<()> {
///     let path = Path::new("/tmp/mirror/contentlibrary/a.htm");
///     fs.create_dir_all(path.parent().unwrap()).await?;
///     fs.write_file(path, data.to_vec().into()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating or truncating it
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;
}
