use super::{TierStore, ensure_appendable, newest_first};
use crate::error::MemoryError;
use crate::memory::types::{Scope, Tier};
use async_trait::async_trait;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// File-backed tier store. Plain files are the source of truth.
///
/// Layout:
///   memories/<scope>/raw/YYYY-MM-DD.jsonl   (one JSON `RawEntry` per line)
///   memories/<scope>/daily/YYYY-MM-DD.md
///   memories/<scope>/weekly/YYYY-Www.md
///   memories/<scope>/monthly/YYYY-MM.md
pub struct FileTierStore {
    root: PathBuf,
}

impl FileTierStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tier_dir(&self, tier: Tier, scope: &Scope) -> Result<PathBuf, MemoryError> {
        // Re-validate: `Scope::Channel` can be built directly.
        let scope = Scope::parse(scope.as_str())?;
        Ok(self.root.join(scope.as_str()).join(tier.as_str()))
    }

    fn artifact_path(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
    ) -> Result<PathBuf, MemoryError> {
        tier.validate_identifier(identifier)?;
        Ok(self
            .tier_dir(tier, scope)?
            .join(format!("{identifier}.{}", tier.extension())))
    }

    async fn ensure_parent(path: &Path) -> Result<(), MemoryError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MemoryError::io(parent, e))?;
        }
        Ok(())
    }

    /// True when the file is non-empty and its last byte is not a newline.
    async fn ends_mid_line(file: &mut fs::File) -> std::io::Result<bool> {
        if file.metadata().await?.len() == 0 {
            return Ok(false);
        }
        file.seek(SeekFrom::End(-1)).await?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).await?;
        Ok(last[0] != b'\n')
    }
}

#[async_trait]
impl TierStore for FileTierStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn put(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
        content: &str,
    ) -> Result<(), MemoryError> {
        let path = self.artifact_path(tier, scope, identifier)?;
        Self::ensure_parent(&path).await?;

        // Write a sibling then rename, so a reader never sees half a file.
        let temp_path = path.with_extension(format!("{}.tmp", tier.extension()));
        fs::write(&temp_path, content)
            .await
            .map_err(|e| MemoryError::io(&temp_path, e))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| MemoryError::io(&path, e))?;
        Ok(())
    }

    async fn append(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
        content: &str,
    ) -> Result<(), MemoryError> {
        ensure_appendable(tier)?;
        let path = self.artifact_path(tier, scope, identifier)?;
        Self::ensure_parent(&path).await?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| MemoryError::io(&path, e))?;

        let mut payload = String::with_capacity(content.len() + 1);
        if Self::ends_mid_line(&mut file)
            .await
            .map_err(|e| MemoryError::io(&path, e))?
        {
            tracing::warn!(path = %path.display(), "raw memory ends mid-line; starting a new line");
            payload.push('\n');
        }
        payload.push_str(content);
        file.write_all(payload.as_bytes())
            .await
            .map_err(|e| MemoryError::io(&path, e))?;
        file.flush().await.map_err(|e| MemoryError::io(&path, e))?;
        Ok(())
    }

    async fn get(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
    ) -> Result<Option<String>, MemoryError> {
        let path = self.artifact_path(tier, scope, identifier)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MemoryError::io(&path, e)),
        }
    }

    async fn list(&self, tier: Tier, scope: &Scope) -> Result<Vec<String>, MemoryError> {
        let dir = self.tier_dir(tier, scope)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MemoryError::io(&dir, e)),
        };

        let mut identifiers = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MemoryError::io(&dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(tier.extension()) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if tier.validate_identifier(stem).is_ok() {
                identifiers.push(stem.to_string());
            }
        }
        Ok(newest_first(identifiers))
    }

    async fn delete(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
    ) -> Result<bool, MemoryError> {
        let path = self.artifact_path(tier, scope, identifier)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MemoryError::io(&path, e)),
        }
    }

    async fn scopes(&self) -> Result<Vec<Scope>, MemoryError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MemoryError::io(&self.root, e)),
        };

        let mut scopes = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MemoryError::io(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| MemoryError::io(entry.path(), e))?
                .is_dir();
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && let Ok(scope) = Scope::parse(name)
            {
                scopes.push(scope);
            }
        }
        scopes.sort();
        Ok(scopes)
    }
}
