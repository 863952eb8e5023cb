//! Read-only, sandboxed access to a root directory and its subdirectories
//!
//! Every path is resolved (symlinks followed) and checked against the root
//! before any I/O. Checks run in a fixed order: containment, existence and
//! type, size, then content. A path that fails an earlier check is never
//! opened.
//!
//! The path checks and the open are separate syscalls, so a concurrent
//! writer could swap a symlink in between. [`SandboxedStore::read_text`]
//! narrows that gap by re-validating the opened handle (regular file, size,
//! and on Unix the same device and inode) and by reading through the handle
//! with a hard byte cap.

use crate::{DocsweepError, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// How undecodable bytes are handled when reading text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Substitute U+FFFD for malformed sequences
    #[default]
    Lossy,
    /// Fail with [`DocsweepError::InvalidUtf8`]
    Strict,
}

/// Read-only file accessor confined to one root directory
#[derive(Debug)]
pub struct SandboxedStore {
    root: PathBuf,
    extension: String,
    exclude_dirs: Vec<String>,
    reads: AtomicUsize,
}

impl SandboxedStore {
    /// Resolve `root` once. Fails with `RootNotFound` unless it is an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let given = root.as_ref();
        let root = given
            .canonicalize()
            .map_err(|_| DocsweepError::RootNotFound {
                path: given.to_path_buf(),
            })?;
        if !root.is_dir() {
            return Err(DocsweepError::RootNotFound {
                path: given.to_path_buf(),
            });
        }

        Ok(Self {
            root,
            extension: "py".to_string(),
            exclude_dirs: Vec::new(),
            reads: AtomicUsize::new(0),
        })
    }

    /// Set the tracked extension (without the leading dot)
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Skip directories with any of these names during discovery
    pub fn with_exclude_dirs(mut self, dirs: Vec<String>) -> Self {
        self.exclude_dirs = dirs;
        self
    }

    /// The canonical root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of times file content was opened for reading
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Recursively list files with the tracked extension, as `/`-separated
    /// relative paths in lexical order.
    ///
    /// An error enumerating the root itself is fatal; unreadable
    /// subdirectories are logged and skipped.
    pub fn list_source_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_excluded_dir(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(DocsweepError::Discovery(e.to_string()));
                }
                Err(e) => {
                    warn!("Skipping unreadable entry during discovery: {}", e);
                    continue;
                }
            };

            // Symlinks are not followed; a linked file is not listed.
            if !entry.file_type().is_file() {
                continue;
            }
            let matches_ext = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == self.extension);
            if !matches_ext {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| DocsweepError::Discovery(e.to_string()))?;
            files.push(to_slash(rel));
        }

        files.sort();
        debug!("Discovered {} .{} files", files.len(), self.extension);
        Ok(files)
    }

    /// Read a file as UTF-8 text, replacing malformed sequences.
    ///
    /// `path` is relative to the root, or absolute (still required to lie
    /// under the root).
    pub fn read_text(&self, path: impl AsRef<Path>, max_bytes: u64) -> Result<String> {
        self.read_text_with(path, max_bytes, DecodeMode::Lossy)
    }

    /// Read a file as text using the given decode mode
    pub fn read_text_with(
        &self,
        path: impl AsRef<Path>,
        max_bytes: u64,
        mode: DecodeMode,
    ) -> Result<String> {
        let resolved = self.resolve_under_root(path.as_ref())?;

        let meta = std::fs::metadata(&resolved).map_err(|_| DocsweepError::NotFound {
            path: resolved.clone(),
        })?;
        if !meta.is_file() {
            return Err(DocsweepError::NotFound { path: resolved });
        }
        if meta.len() > max_bytes {
            return Err(DocsweepError::TooLarge {
                path: resolved,
                size: meta.len(),
                max: max_bytes,
            });
        }

        let file = File::open(&resolved).map_err(|_| DocsweepError::NotFound {
            path: resolved.clone(),
        })?;
        self.reads.fetch_add(1, Ordering::SeqCst);

        let handle_meta = file.metadata()?;
        if !handle_meta.is_file() || !same_file(&meta, &handle_meta) {
            warn!("File changed between check and open: {}", resolved.display());
            return Err(DocsweepError::ContainmentViolation { path: resolved });
        }
        if handle_meta.len() > max_bytes {
            return Err(DocsweepError::TooLarge {
                path: resolved,
                size: handle_meta.len(),
                max: max_bytes,
            });
        }

        let mut data = Vec::with_capacity(handle_meta.len() as usize);
        file.take(max_bytes.saturating_add(1))
            .read_to_end(&mut data)?;
        if data.len() as u64 > max_bytes {
            return Err(DocsweepError::TooLarge {
                path: resolved,
                size: data.len() as u64,
                max: max_bytes,
            });
        }

        match mode {
            DecodeMode::Lossy => Ok(String::from_utf8_lossy(&data).into_owned()),
            DecodeMode::Strict => {
                String::from_utf8(data).map_err(|_| DocsweepError::InvalidUtf8 { path: resolved })
            }
        }
    }

    /// Convert an absolute path under the root to a `/`-separated relative path
    pub fn relative_path(&self, abs_path: impl AsRef<Path>) -> Result<String> {
        let resolved = self.resolve_under_root(abs_path.as_ref())?;
        let rel = resolved
            .strip_prefix(&self.root)
            .map_err(|_| DocsweepError::ContainmentViolation {
                path: resolved.clone(),
            })?;
        Ok(to_slash(rel))
    }

    /// Join relative paths to the root, resolve, and verify containment.
    fn resolve_under_root(&self, path: &Path) -> Result<PathBuf> {
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let resolved = resolve_lenient(&candidate);

        if !resolved.starts_with(&self.root) {
            warn!("Sandbox violation: {}", resolved.display());
            return Err(DocsweepError::ContainmentViolation { path: resolved });
        }
        Ok(resolved)
    }

    fn is_excluded_dir(&self, entry: &walkdir::DirEntry) -> bool {
        entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.exclude_dirs.iter().any(|d| d == name))
    }
}

/// Resolve a path the way `realpath` would, without requiring it to exist.
///
/// Existing paths are canonicalized directly. Otherwise `..` and `.` are
/// folded lexically, the deepest existing ancestor is canonicalized, and the
/// remaining components are appended.
fn resolve_lenient(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }

    let mut existing = normalized.as_path();
    let mut tail = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut out = canonical;
            for part in tail.iter().rev() {
                out.push(part);
            }
            return out;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

fn to_slash(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn same_file(a: &std::fs::Metadata, b: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(a: &std::fs::Metadata, b: &std::fs::Metadata) -> bool {
    a.len() == b.len() && a.modified().ok() == b.modified().ok()
}
