//! # Local document root
//!
//! Generated pages and uploads are written next to each other under one
//! directory served by the web server. Writes go to a temporary file in the
//! target directory first and are renamed into place, so a reader never sees
//! a half-written page.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use domains::{DomainError, Result, SiteFilesystem, SiteSettings};
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct LocalSiteFilesystem {
    root: PathBuf,
    file_mode: u32,
    owner_uid: Option<u32>,
    owner_gid: Option<u32>,
}

impl LocalSiteFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file_mode: 0o644,
            owner_uid: None,
            owner_gid: None,
        }
    }

    pub fn from_settings(settings: &SiteSettings) -> Self {
        Self::new(&settings.document_root)
            .with_mode(settings.file_mode)
            .with_owner(settings.owner_uid, settings.owner_gid)
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    pub fn with_owner(mut self, uid: Option<u32>, gid: Option<u32>) -> Self {
        self.owner_uid = uid;
        self.owner_gid = gid;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins a relative path onto the root, refusing anything that could
    /// escape it.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let rel = Path::new(relative.trim_start_matches('/'));
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(DomainError::Internal(format!(
                "refusing path outside the document root: {relative}"
            )));
        }
        Ok(self.root.join(rel))
    }

    async fn write_atomically(&self, target: &Path, contents: &[u8]) -> io::Result<()> {
        let dir = target
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
        fs::create_dir_all(dir).await?;

        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let temp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

        let written = async {
            fs::write(&temp, contents).await?;
            self.apply_permissions(&temp).await?;
            fs::rename(&temp, target).await
        }
        .await;

        if written.is_err() {
            let _ = fs::remove_file(&temp).await;
        }
        written
    }

    #[cfg(unix)]
    async fn apply_permissions(&self, path: &Path) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(path, std::fs::Permissions::from_mode(self.file_mode)).await?;
        if self.owner_uid.is_some() || self.owner_gid.is_some() {
            let (path, uid, gid) = (path.to_path_buf(), self.owner_uid, self.owner_gid);
            tokio::task::spawn_blocking(move || std::os::unix::fs::chown(path, uid, gid))
                .await
                .map_err(io::Error::other)??;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    async fn apply_permissions(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

fn io_err(path: &str, err: io::Error) -> DomainError {
    DomainError::Internal(format!("{path}: {err}"))
}

#[async_trait]
impl SiteFilesystem for LocalSiteFilesystem {
    async fn write_artifact(&self, path: &str, contents: Bytes) -> Result<()> {
        let target = self.resolve(path)?;
        self.write_atomically(&target, &contents)
            .await
            .map_err(|e| io_err(path, e))?;
        tracing::debug!(path, bytes = contents.len(), "wrote artifact");
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => {
                tracing::debug!(path, "removed file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(path, e)),
        }
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.resolve(path)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(path, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(path, e))? {
            let is_file = entry.file_type().await.map_err(|e| io_err(path, e))?.is_file();
            if let (true, Some(name)) = (is_file, entry.file_name().to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_replace_files_and_create_directories() {
        let root = tempfile::tempdir().unwrap();
        let site = LocalSiteFilesystem::new(root.path());

        site.write_artifact("b/res/1.html", Bytes::from_static(b"first")).await.unwrap();
        site.write_artifact("b/res/1.html", Bytes::from_static(b"second")).await.unwrap();

        let written = std::fs::read_to_string(root.path().join("b/res/1.html")).unwrap();
        assert_eq!(written, "second");
        // no temporary files left behind
        assert_eq!(site.list_dir("b/res").await.unwrap(), vec!["1.html".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn configured_mode_is_applied() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let site = LocalSiteFilesystem::new(root.path()).with_mode(0o600);
        site.write_artifact("index.html", Bytes::from_static(b"hi")).await.unwrap();

        let mode = std::fs::metadata(root.path().join("index.html")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn missing_files_and_directories_are_not_errors() {
        let root = tempfile::tempdir().unwrap();
        let site = LocalSiteFilesystem::new(root.path());
        tokio_test::assert_ok!(site.remove_file("b/3.html").await);
        assert!(site.list_dir("nowhere").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn paths_cannot_escape_the_root() {
        let root = tempfile::tempdir().unwrap();
        let site = LocalSiteFilesystem::new(root.path());
        tokio_test::assert_err!(site.write_artifact("../evil.html", Bytes::new()).await);
        assert_eq!(site.resolve("/b/index.html").unwrap(), root.path().join("b/index.html"));
    }
}
