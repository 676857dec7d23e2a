use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::state::{PipelineRun, ProjectFile, TerminalStatus};

/// Human-readable per-file breakdown followed by totals.
pub fn render_summary(run: &PipelineRun) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "run {} ({})", run.run_id(), run.project_root().display());

    for entry in run.entries() {
        let detail = match (&entry.status, &entry.target, &entry.message) {
            (TerminalStatus::Written, Some(target), _) => display_under(target, run.project_root()),
            (_, _, Some(message)) => one_line(message),
            _ => String::new(),
        };

        let _ = writeln!(
            out,
            "  {:<18} {:<10} {}  {}",
            entry.status.label(),
            entry.file.category().to_string(),
            entry.file.relative().display(),
            detail
        );
    }

    let c = run.counts();
    let elapsed = run
        .finished_at()
        .map(|end| (end - run.started_at()).num_milliseconds())
        .unwrap_or(0);

    let _ = writeln!(
        out,
        "{} files: {} written, {} failed, {} skipped, {} cancelled in {} ms",
        c.total, c.written, c.failed, c.skipped, c.cancelled, elapsed
    );

    out
}

/// Dry-run listing: category, source and target for each discovered file.
pub fn render_plan(root: &Path, plan: &[(ProjectFile, PathBuf)]) -> String {
    let mut out = String::new();
    for (file, target) in plan {
        let _ = writeln!(
            out,
            "  {:<10} {}  ->  {}",
            file.category().to_string(),
            file.relative().display(),
            display_under(target, root)
        );
    }
    let _ = writeln!(out, "{} files would be processed", plan.len());
    out
}

pub fn write_json(run: &PipelineRun, path: &Path) -> io::Result<()> {
    let text = serde_json::to_string_pretty(run)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, text)
}

fn display_under(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn one_line(s: &str) -> String {
    let line = s.lines().next().unwrap_or("");
    if line.chars().count() > 160 {
        let mut x: String = line.chars().take(160).collect();
        x.push_str("...");
        x
    } else {
        line.to_string()
    }
}
