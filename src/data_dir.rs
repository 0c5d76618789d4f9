use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DATA_DIR_ENV: &str = "RAGDOLL_DATA_DIR";

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve the data directory from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The RAGDOLL_DATA_DIR environment variable
    /// 3. `storage.data_dir` from the config file
    /// 4. The XDG data directory (~/.local/share/ragdoll/)
    pub fn resolve(
        explicit: Option<&Path>,
        configured: Option<&Path>,
    ) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Some(val) = std::env::var_os(DATA_DIR_ENV) {
            PathBuf::from(val)
        } else if let Some(path) = configured {
            path.to_path_buf()
        } else {
            xdg::BaseDirectories::with_prefix("ragdoll")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn documents_db(&self) -> PathBuf {
        self.root.join("documents.redb")
    }

    pub fn tantivy_dir(&self) -> Result<PathBuf> {
        let path = self.root.join("tantivy");
        std::fs::create_dir_all(&path)
            .map_err(|_| Error::DataDir(path.clone()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path()), Some(other.path())).unwrap();

        assert_eq!(dir.root(), tmp.path());
        assert_eq!(dir.documents_db(), tmp.path().join("documents.redb"));
    }

    #[test]
    fn nested_root_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let dir = DataDir::resolve(Some(&nested), None).unwrap();
        assert!(dir.root().is_dir());
    }

    #[test]
    fn tantivy_dir_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path()), None).unwrap();
        let tantivy = dir.tantivy_dir().unwrap();

        assert!(tantivy.exists());
        assert_eq!(tantivy, tmp.path().join("tantivy"));
    }
}
