use super::Vault;
use crate::core::error::PluginError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Vault backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Replace the whole content of an existing note.
    pub async fn write(&self, path: &str, content: &str) -> Result<(), PluginError> {
        let full = self.resolve(path)?;
        if !fs::try_exists(&full).await.unwrap_or(false) {
            return Err(PluginError::FileNotFound(path.to_string()));
        }
        fs::write(&full, content).await?;
        Ok(())
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, PluginError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(PluginError::FileRead {
                path: path.to_string(),
                reason: "path must stay inside the vault".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(&self, path: &str, full: &Path) -> Result<(), PluginError> {
        if let Some(parent) = full.parent() {
            if !fs::try_exists(parent).await.unwrap_or(false) {
                let folder = Path::new(path)
                    .parent()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                return Err(PluginError::FolderNotFound(folder));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Vault for FsVault {
    async fn read(&self, path: &str) -> Result<String, PluginError> {
        let full = self.resolve(path)?;
        fs::read_to_string(&full).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => PluginError::FileNotFound(path.to_string()),
            _ => PluginError::FileRead {
                path: path.to_string(),
                reason: e.to_string(),
            },
        })
    }

    async fn create(&self, path: &str, content: &str) -> Result<(), PluginError> {
        let full = self.resolve(path)?;
        self.ensure_parent(path, &full).await?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        tracing::debug!(path, "created note");
        Ok(())
    }

    async fn append(&self, path: &str, text: &str) -> Result<(), PluginError> {
        let full = self.resolve(path)?;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&full)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => PluginError::FileNotFound(path.to_string()),
                _ => PluginError::Io { source: e },
            })?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => fs::try_exists(full).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn list_folders(&self) -> Result<Vec<String>, PluginError> {
        let mut folders = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') || !entry.file_type().await?.is_dir() {
                    continue;
                }
                let path = entry.path();
                if let Ok(relative) = path.strip_prefix(&self.root) {
                    let parts: Vec<String> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    folders.push(parts.join("/"));
                }
                pending.push(path);
            }
        }

        folders.sort();
        Ok(folders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_append_and_read() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = FsVault::new(tmp.path());

        vault.create("note.md", "# Title\n").await.unwrap();
        vault.append("note.md", "body\n").await.unwrap();

        assert_eq!(vault.read("note.md").await.unwrap(), "# Title\nbody\n");
        assert!(vault.exists("note.md").await);
    }

    #[tokio::test]
    async fn missing_files_and_folders_are_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = FsVault::new(tmp.path());

        assert!(matches!(
            vault.read("absent.md").await,
            Err(PluginError::FileNotFound(_))
        ));
        assert!(matches!(
            vault.append("absent.md", "x").await,
            Err(PluginError::FileNotFound(_))
        ));
        assert!(matches!(
            vault.create("Nope/note.md", "x").await,
            Err(PluginError::FolderNotFound(f)) if f == "Nope"
        ));
    }

    #[tokio::test]
    async fn create_refuses_to_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = FsVault::new(tmp.path());
        vault.create("a.md", "one").await.unwrap();

        assert!(vault.create("a.md", "two").await.is_err());
        assert_eq!(vault.read("a.md").await.unwrap(), "one");
    }

    #[tokio::test]
    async fn paths_cannot_escape_the_root() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = FsVault::new(tmp.path());

        assert!(vault.read("../etc/passwd").await.is_err());
        assert!(!vault.exists("/etc/passwd").await);
    }

    #[tokio::test]
    async fn lists_nested_folders_without_hidden_ones() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("Chats/2026")).unwrap();
        std::fs::create_dir_all(tmp.path().join("Templates")).unwrap();
        std::fs::create_dir_all(tmp.path().join(".obsidian/plugins")).unwrap();

        let vault = FsVault::new(tmp.path());
        assert_eq!(
            vault.list_folders().await.unwrap(),
            vec!["Chats", "Chats/2026", "Templates"]
        );
    }
}
