use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/* ---------- discovery ---------- */

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Page,
    Component,
    Custom(String),
}

impl Category {
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "page" => Category::Page,
            "component" => Category::Component,
            other => Category::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Page => f.write_str("page"),
            Category::Component => f.write_str("component"),
            Category::Custom(tag) => f.write_str(tag),
        }
    }
}

/// A discovered source file. Never mutated after discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectFile {
    path: PathBuf,
    relative: PathBuf,
    category: Category,
}

impl ProjectFile {
    pub fn new(path: PathBuf, relative: PathBuf, category: Category) -> Self {
        Self {
            path,
            relative,
            category,
        }
    }

    /// Absolute path on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to the project root.
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    pub fn category(&self) -> &Category {
        &self.category
    }
}

/* ---------- reading ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    Ok,
    NotFound,
    Empty,
    ReadError,
}

#[derive(Debug, Clone)]
pub struct SourceContent {
    pub file: ProjectFile,
    /// Raw file text; the error message when `status` is `ReadError`.
    pub text: String,
    pub status: ReadStatus,
}

/* ---------- generation ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Ok,
    Failed,
    Empty,
}

#[derive(Debug, Clone)]
pub struct GeneratedTest {
    pub file: ProjectFile,
    /// Test code, or a diagnostic when `status` is `Failed`.
    pub text: String,
    pub status: GenerationStatus,
}

impl GeneratedTest {
    pub fn ok(file: ProjectFile, text: String) -> Self {
        Self {
            file,
            text,
            status: GenerationStatus::Ok,
        }
    }

    pub fn failed(file: ProjectFile, diagnostic: impl Into<String>) -> Self {
        Self {
            file,
            text: diagnostic.into(),
            status: GenerationStatus::Failed,
        }
    }

    pub fn empty(file: ProjectFile) -> Self {
        Self {
            file,
            text: String::new(),
            status: GenerationStatus::Empty,
        }
    }
}

/* ---------- writing ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    Written,
    SkippedEmpty,
    IoError,
}

#[derive(Debug, Clone)]
pub struct WriteResult {
    pub target: PathBuf,
    pub bytes: usize,
    pub status: WriteStatus,
    pub message: Option<String>,
}

/* ---------- run aggregation ---------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "stage", rename_all = "snake_case")]
pub enum TerminalStatus {
    Written,
    ReadFailed(ReadStatus),
    GenerationFailed(GenerationStatus),
    WriteFailed(WriteStatus),
    /// Excluded by the category filter.
    Skipped,
    /// Never launched because the run was cancelled.
    Cancelled,
}

impl TerminalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TerminalStatus::Written => "written",
            TerminalStatus::ReadFailed(ReadStatus::NotFound) => "not_found",
            TerminalStatus::ReadFailed(ReadStatus::Empty) => "empty_source",
            TerminalStatus::ReadFailed(_) => "read_error",
            TerminalStatus::GenerationFailed(GenerationStatus::Empty) => "empty_generation",
            TerminalStatus::GenerationFailed(_) => "generation_failed",
            TerminalStatus::WriteFailed(_) => "write_error",
            TerminalStatus::Skipped => "skipped",
            TerminalStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub file: ProjectFile,
    pub status: TerminalStatus,
    pub message: Option<String>,
    pub target: Option<PathBuf>,
}

impl FileOutcome {
    pub fn written(file: ProjectFile, target: PathBuf) -> Self {
        Self {
            file,
            status: TerminalStatus::Written,
            message: None,
            target: Some(target),
        }
    }

    pub fn failed(file: ProjectFile, status: TerminalStatus, message: impl Into<String>) -> Self {
        Self {
            file,
            status,
            message: Some(message.into()),
            target: None,
        }
    }

    pub fn skipped(file: ProjectFile, reason: impl Into<String>) -> Self {
        Self::failed(file, TerminalStatus::Skipped, reason)
    }

    pub fn cancelled(file: ProjectFile) -> Self {
        Self::failed(file, TerminalStatus::Cancelled, "run cancelled before launch")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub total: usize,
    pub written: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
}

/// One invocation of the pipeline. Read-only once finished.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    run_id: Uuid,
    project_root: PathBuf,
    entries: Vec<FileOutcome>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn begin(project_root: PathBuf) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            project_root,
            entries: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn record(&mut self, outcome: FileOutcome) {
        debug_assert!(self.finished_at.is_none(), "run already finished");
        self.entries.push(outcome);
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Per-file outcomes in discovery order.
    pub fn entries(&self) -> &[FileOutcome] {
        &self.entries
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn counts(&self) -> RunCounts {
        let mut counts = RunCounts {
            total: self.entries.len(),
            ..RunCounts::default()
        };

        for entry in &self.entries {
            match entry.status {
                TerminalStatus::Written => counts.written += 1,
                TerminalStatus::Skipped => counts.skipped += 1,
                TerminalStatus::Cancelled => counts.cancelled += 1,
                _ => counts.failed += 1,
            }
        }

        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> ProjectFile {
        ProjectFile::new(
            PathBuf::from("/p").join(name),
            PathBuf::from(name),
            Category::Component,
        )
    }

    #[test]
    fn category_parse_is_case_insensitive_and_keeps_custom_tags() {
        assert_eq!(Category::parse("Page"), Category::Page);
        assert_eq!(Category::parse(" component "), Category::Component);
        assert_eq!(Category::parse("layout"), Category::Custom("layout".into()));
        assert_eq!(Category::Custom("layout".into()).to_string(), "layout");
    }

    #[test]
    fn counts_split_terminal_statuses() {
        let mut run = PipelineRun::begin(PathBuf::from("/p"));
        run.record(FileOutcome::written(file("a.tsx"), PathBuf::from("/p/__tests__/a.tsx.test.js")));
        run.record(FileOutcome::failed(
            file("b.tsx"),
            TerminalStatus::GenerationFailed(GenerationStatus::Failed),
            "timeout",
        ));
        run.record(FileOutcome::skipped(file("c.tsx"), "category filtered"));
        run.record(FileOutcome::cancelled(file("d.tsx")));
        let run = run.finish();

        let counts = run.counts();
        assert_eq!(counts.total, 4);
        assert_eq!(counts.written, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.cancelled, 1);
        assert!(run.finished_at().is_some());
    }

    #[test]
    fn terminal_status_serializes_with_stage() {
        let v = serde_json::to_value(TerminalStatus::ReadFailed(ReadStatus::Empty)).unwrap();
        assert_eq!(v["status"], "read_failed");
        assert_eq!(v["stage"], "empty");
    }
}
