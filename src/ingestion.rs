use std::path::{Path, PathBuf};

use kdam::{BarExt, tqdm};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    backend::{AddOutcome, DocumentStore},
    error::{Error, Result},
    walker::{DiscoveredFile, FileType},
};

/// Extract a title from file content.
///
/// Looks for the first markdown heading (line starting with `# `).
/// Falls back to the filename without extension.
pub fn extract_title(content: &str, file_path: &Path) -> String {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("# "))
        .map(str::trim)
        .find(|heading| !heading.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("untitled")
                .to_string()
        })
}

/// Read a file's text content according to its type.
pub fn read_content(file: &DiscoveredFile) -> Result<String> {
    match file.file_type {
        FileType::Txt | FileType::Md => Ok(std::fs::read_to_string(&file.path)?),
        FileType::Html => {
            Ok(strip_html(&std::fs::read_to_string(&file.path)?))
        }
        FileType::Pdf | FileType::Docx => Err(Error::invalid(format!(
            "text extraction from {} files is not supported",
            file.file_type.content_type()
        ))),
    }
}

/// Drop markup, `<script>` and `<style>` bodies, collapsing the remaining
/// text onto single-spaced lines.
fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            rest = "";
            break;
        };
        let tag = after[..close].trim().to_ascii_lowercase();
        rest = &after[close + 1..];

        for raw in ["script", "style"] {
            if tag == raw || tag.starts_with(&format!("{raw} ")) {
                let end = format!("</{raw}");
                let lower = rest.to_ascii_lowercase();
                rest = match lower.find(&end) {
                    Some(i) => &rest[i..],
                    None => "",
                };
            }
        }
        text.push(' ');
    }
    text.push_str(rest);

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A file that could not be added.
#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of adding a batch of files.
#[derive(Debug, Default, Serialize)]
pub struct IngestSummary {
    pub added: Vec<AddOutcome>,
    pub failed: Vec<FailedFile>,
}

impl IngestSummary {
    pub fn replaced_count(&self) -> usize {
        self.added.iter().filter(|o| o.replaced).count()
    }
}

/// Add a batch of discovered files to the store.
///
/// Files are read in parallel, then stored one at a time. A file that fails
/// to read or store is recorded in the summary and the batch carries on.
pub fn ingest_files(
    store: &dyn DocumentStore,
    files: &[DiscoveredFile],
    show_progress: bool,
) -> IngestSummary {
    let loaded: Vec<(&DiscoveredFile, Result<String>)> = files
        .par_iter()
        .map(|file| (file, read_content(file)))
        .collect();

    let mut summary = IngestSummary::default();
    let mut pb = tqdm!(
        total = loaded.len(),
        desc = "Adding",
        unit = " files",
        disable = !show_progress
    );

    for (file, content) in loaded {
        let stored = content
            .and_then(|content| store.add_document(&file.path, &content));
        match stored {
            Ok(outcome) => {
                debug!(id = %outcome.document_id, path = %file.path.display(), "added");
                summary.added.push(outcome);
            }
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "failed to add file");
                summary.failed.push(FailedFile {
                    path: file.path.clone(),
                    reason: e.to_string(),
                });
            }
        }
        let _ = pb.update(1);
    }

    if show_progress {
        let _ = pb.refresh();
        eprintln!();
    }

    summary
}
