use std::{
    collections::BTreeSet,
    path::{Component, Path, PathBuf},
};

use globset::{Glob, GlobMatcher};
use serde::Serialize;

use crate::error::{Error, Result};

/// Document formats `add` recognizes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
    Md,
    Html,
}

impl FileType {
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            FileType::Pdf => &["pdf"],
            FileType::Docx => &["docx"],
            FileType::Txt => &["txt"],
            FileType::Md => &["md", "markdown"],
            FileType::Html => &["html", "htm"],
        }
    }

    /// Content type recorded on stored documents.
    pub fn content_type(self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Txt => "text",
            FileType::Md => "markdown",
            FileType::Html => "html",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        [
            FileType::Pdf,
            FileType::Docx,
            FileType::Txt,
            FileType::Md,
            FileType::Html,
        ]
        .into_iter()
        .find(|t| t.extensions().contains(&ext.as_str()))
    }
}

/// A discovered document file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DiscoveredFile {
    /// Fully resolved absolute path.
    pub path: PathBuf,
    pub file_type: FileType,
}

/// Options controlling discovery.
#[derive(Debug, Clone, Copy)]
pub struct DiscoverOptions {
    /// Descend into subdirectories of directory arguments.
    pub recursive: bool,
    /// Keep only files of this type.
    pub only: Option<FileType>,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            only: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Discovery {
    /// Matching files, sorted and deduplicated.
    pub files: Vec<DiscoveredFile>,
    /// Arguments that named nothing usable.
    pub unmatched: Vec<String>,
}

/// Expand `add` arguments (files, directories, glob patterns) into document
/// files.
///
/// Hidden files and directories are skipped while walking. A file named
/// explicitly is taken as long as its extension is recognized.
pub fn discover(
    inputs: &[String],
    options: DiscoverOptions,
) -> Result<Discovery> {
    let mut found = BTreeSet::new();
    let mut unmatched = Vec::new();

    for input in inputs {
        let mut matches = BTreeSet::new();
        let path = Path::new(input);

        if path.is_file() {
            if let Some(file) = classify(&path.canonicalize()?, options.only) {
                matches.insert(file);
            }
        } else if path.is_dir() {
            let root = path.canonicalize()?;
            walk_dir(&root, &root, options, None, &mut matches)?;
        } else if is_glob(input) {
            let matcher = Glob::new(input)
                .map_err(|e| {
                    Error::invalid(format!("invalid glob pattern '{input}': {e}"))
                })?
                .compile_matcher();
            let base = glob_base(path);
            if base.is_dir() {
                let walk = DiscoverOptions {
                    recursive: true,
                    ..options
                };
                walk_dir(&base, &base, walk, Some(&matcher), &mut matches)?;
            }
        }

        if matches.is_empty() {
            unmatched.push(input.clone());
        }
        found.append(&mut matches);
    }

    Ok(Discovery {
        files: found.into_iter().collect(),
        unmatched,
    })
}

fn is_glob(input: &str) -> bool {
    input.contains(['*', '?', '[', '{'])
}

/// Longest leading run of path components free of glob syntax.
fn glob_base(pattern: &Path) -> PathBuf {
    let mut base = PathBuf::new();
    for component in pattern.components() {
        if let Component::Normal(part) = component
            && is_glob(&part.to_string_lossy())
        {
            break;
        }
        base.push(component);
    }
    if base.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        base
    }
}

fn walk_dir(
    root: &Path,
    current: &Path,
    options: DiscoverOptions,
    matcher: Option<&GlobMatcher>,
    found: &mut BTreeSet<DiscoveredFile>,
) -> Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let name = entry.file_name();

        if name.to_string_lossy().starts_with('.') {
            continue;
        }

        let entry_path = entry.path();
        let file_type = entry.file_type()?;

        let resolved = if file_type.is_symlink() {
            match entry_path.canonicalize() {
                Ok(p) => p,
                Err(_) => continue, // Broken symlink.
            }
        } else {
            entry_path.clone()
        };

        if resolved.is_dir() {
            // Symlinks back into the tree would loop forever.
            if file_type.is_symlink() && resolved.starts_with(root) {
                continue;
            }
            if options.recursive {
                walk_dir(root, &entry_path, options, matcher, found)?;
            }
        } else if resolved.is_file() {
            let relative = entry_path.strip_prefix(root).unwrap_or(&entry_path);
            if let Some(m) = matcher
                && !m.is_match(&entry_path)
                && !m.is_match(relative)
            {
                continue;
            }
            if let Some(file) = classify(&resolved.canonicalize()?, options.only)
            {
                found.insert(file);
            }
        }
    }

    Ok(())
}

fn classify(path: &Path, only: Option<FileType>) -> Option<DiscoveredFile> {
    let file_type = FileType::from_path(path)?;
    if only.is_some_and(|wanted| wanted != file_type) {
        return None;
    }
    Some(DiscoveredFile {
        path: path.to_path_buf(),
        file_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(discovery: &Discovery) -> Vec<String> {
        discovery
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    fn arg(path: &Path) -> String {
        path.to_string_lossy().to_string()
    }

    #[test]
    fn file_types_from_extension() {
        assert_eq!(FileType::from_path(Path::new("a.MD")), Some(FileType::Md));
        assert_eq!(
            FileType::from_path(Path::new("a.markdown")),
            Some(FileType::Md)
        );
        assert_eq!(
            FileType::from_path(Path::new("a.htm")),
            Some(FileType::Html)
        );
        assert_eq!(FileType::from_path(Path::new("a.png")), None);
        assert_eq!(FileType::from_path(Path::new("README")), None);
    }

    #[test]
    fn directory_is_walked_recursively() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(tmp.path().join("top.md"), "top").unwrap();
        std::fs::write(sub.join("deep.txt"), "deep").unwrap();
        std::fs::write(tmp.path().join("image.png"), "binary").unwrap();

        let found =
            discover(&[arg(tmp.path())], DiscoverOptions::default()).unwrap();
        assert_eq!(names(&found), vec!["deep.txt", "top.md"]);
        assert!(found.unmatched.is_empty());
    }

    #[test]
    fn no_recursive_stays_at_top_level() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(tmp.path().join("top.md"), "top").unwrap();
        std::fs::write(sub.join("deep.md"), "deep").unwrap();

        let options = DiscoverOptions {
            recursive: false,
            only: None,
        };
        let found = discover(&[arg(tmp.path())], options).unwrap();
        assert_eq!(names(&found), vec!["top.md"]);
    }

    #[test]
    fn skips_hidden_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let hidden = tmp.path().join(".git");
        std::fs::create_dir(&hidden).unwrap();
        std::fs::write(hidden.join("config.md"), "x").unwrap();
        std::fs::write(tmp.path().join(".secret.md"), "x").unwrap();
        std::fs::write(tmp.path().join("visible.md"), "x").unwrap();

        let found =
            discover(&[arg(tmp.path())], DiscoverOptions::default()).unwrap();
        assert_eq!(names(&found), vec!["visible.md"]);
    }

    #[test]
    fn type_filter() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.md"), "a").unwrap();
        std::fs::write(tmp.path().join("b.txt"), "b").unwrap();

        let options = DiscoverOptions {
            recursive: true,
            only: Some(FileType::Txt),
        };
        let found = discover(&[arg(tmp.path())], options).unwrap();
        assert_eq!(names(&found), vec!["b.txt"]);
    }

    #[test]
    fn glob_patterns_expand() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("notes");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("one.md"), "1").unwrap();
        std::fs::write(sub.join("two.txt"), "2").unwrap();

        let pattern = format!("{}/**/*.md", tmp.path().display());
        let found = discover(&[pattern], DiscoverOptions::default()).unwrap();
        assert_eq!(names(&found), vec!["one.md"]);
    }

    #[test]
    fn duplicates_and_missing_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.md");
        std::fs::write(&file, "a").unwrap();
        let missing = tmp.path().join("nope.md");

        let found = discover(
            &[arg(&file), arg(tmp.path()), arg(&missing)],
            DiscoverOptions::default(),
        )
        .unwrap();
        assert_eq!(found.files.len(), 1);
        assert_eq!(found.unmatched, vec![arg(&missing)]);
    }

    #[test]
    fn glob_base_stops_at_wildcards() {
        assert_eq!(glob_base(Path::new("docs/*/x.md")), PathBuf::from("docs"));
        assert_eq!(glob_base(Path::new("*.md")), PathBuf::from("."));
    }
}
