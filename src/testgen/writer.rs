// src/testgen/writer.rs

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::InvocationError;
use crate::state::{GeneratedTest, GenerationStatus, ProjectFile, WriteResult, WriteStatus};

/// How the test suffix is combined with the source file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuffixMode {
    /// `b.tsx` -> `b.tsx.test.js`
    Append,
    /// `b.tsx` -> `b.test.js`
    Replace,
}

impl FromStr for SuffixMode {
    type Err = InvocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(SuffixMode::Append),
            "replace" => Ok(SuffixMode::Replace),
            other => Err(InvocationError::UnknownSuffixMode(other.to_string())),
        }
    }
}

/// Where generated tests land relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorLayout {
    pub mirror_dir_name: String,
    pub suffix: String,
    pub mode: SuffixMode,
}

impl Default for MirrorLayout {
    fn default() -> Self {
        Self {
            mirror_dir_name: "__tests__".into(),
            suffix: ".test.js".into(),
            mode: SuffixMode::Append,
        }
    }
}

impl MirrorLayout {
    /// `project_root / mirror_dir_name / <relative> + suffix`
    pub fn target_for(&self, project_root: &Path, relative: &Path) -> PathBuf {
        let mirrored = project_root.join(&self.mirror_dir_name).join(relative);

        match self.mode {
            SuffixMode::Append => {
                let mut name: OsString = mirrored.into_os_string();
                name.push(&self.suffix);
                PathBuf::from(name)
            }
            SuffixMode::Replace => {
                let stem = mirrored.with_extension("");
                let mut name: OsString = stem.into_os_string();
                name.push(&self.suffix);
                PathBuf::from(name)
            }
        }
    }
}

pub trait TestCodeWriter: Send + Sync {
    fn write(
        &self,
        original: &ProjectFile,
        generated: &GeneratedTest,
        project_root: &Path,
        layout: &MirrorLayout,
    ) -> WriteResult;
}

/// Writes through a sibling temp file and renames it into place, so a
/// half-written test is never observable at the target path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsTestWriter;

impl TestCodeWriter for FsTestWriter {
    fn write(
        &self,
        original: &ProjectFile,
        generated: &GeneratedTest,
        project_root: &Path,
        layout: &MirrorLayout,
    ) -> WriteResult {
        let target = layout.target_for(project_root, original.relative());

        if generated.status != GenerationStatus::Ok {
            return WriteResult {
                target,
                bytes: 0,
                status: WriteStatus::SkippedEmpty,
                message: None,
            };
        }

        match write_atomic(&target, generated.text.as_bytes()) {
            Ok(()) => {
                debug!(target = %target.display(), bytes = generated.text.len(), "test written");
                WriteResult {
                    target,
                    bytes: generated.text.len(),
                    status: WriteStatus::Written,
                    message: None,
                }
            }
            Err(e) => WriteResult {
                target,
                bytes: 0,
                status: WriteStatus::IoError,
                message: Some(e.to_string()),
            },
        }
    }
}

fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no parent"))?;
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    let perms = target_permissions(target, tmp.as_file())?;
    tmp.as_file().set_permissions(perms)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Keep an existing test's mode on overwrite; new tests get a plain 0644
/// instead of the temp file's owner-only mode.
fn target_permissions(target: &Path, tmp: &fs::File) -> io::Result<fs::Permissions> {
    match fs::metadata(target) {
        Ok(meta) => Ok(meta.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fresh_permissions(tmp),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn fresh_permissions(_tmp: &fs::File) -> io::Result<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn fresh_permissions(tmp: &fs::File) -> io::Result<fs::Permissions> {
    Ok(tmp.metadata()?.permissions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Category;

    fn original(root: &Path, rel: &str) -> ProjectFile {
        ProjectFile::new(root.join(rel), PathBuf::from(rel), Category::Component)
    }

    #[test]
    fn append_keeps_full_name() {
        let layout = MirrorLayout::default();
        assert_eq!(
            layout.target_for(Path::new("/R"), Path::new("a/b.tsx")),
            PathBuf::from("/R/__tests__/a/b.tsx.test.js")
        );
    }

    #[test]
    fn replace_swaps_extension() {
        let layout = MirrorLayout {
            suffix: ".test.tsx".into(),
            mode: SuffixMode::Replace,
            ..MirrorLayout::default()
        };
        assert_eq!(
            layout.target_for(Path::new("/R"), Path::new("a/b.tsx")),
            PathBuf::from("/R/__tests__/a/b.test.tsx")
        );
    }

    #[test]
    fn suffix_mode_parse() {
        assert_eq!("Append".parse::<SuffixMode>().unwrap(), SuffixMode::Append);
        assert_eq!("replace".parse::<SuffixMode>().unwrap(), SuffixMode::Replace);
        assert!(matches!(
            "prepend".parse::<SuffixMode>(),
            Err(InvocationError::UnknownSuffixMode(m)) if m == "prepend"
        ));
    }

    #[test]
    fn creates_directories_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = original(dir.path(), "a/b.tsx");
        let gen = GeneratedTest::ok(file.clone(), "test('b', () => {});\n".into());
        let layout = MirrorLayout::default();

        let first = FsTestWriter.write(&file, &gen, dir.path(), &layout);
        let bytes_first = fs::read(&first.target).unwrap();
        let second = FsTestWriter.write(&file, &gen, dir.path(), &layout);
        let bytes_second = fs::read(&second.target).unwrap();

        assert_eq!(first.status, WriteStatus::Written);
        assert_eq!(first.target, dir.path().join("__tests__/a/b.tsx.test.js"));
        assert_eq!(first.bytes, gen.text.len());
        assert_eq!(bytes_first, bytes_second);

        // no temp files left next to the target
        let siblings = fs::read_dir(first.target.parent().unwrap()).unwrap().count();
        assert_eq!(siblings, 1);
    }

    #[cfg(unix)]
    #[test]
    fn new_tests_are_world_readable_and_reruns_keep_the_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let layout = MirrorLayout::default();
        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;

        let fresh = original(dir.path(), "a.tsx");
        let gen = GeneratedTest::ok(fresh.clone(), "x\n".into());
        let res = FsTestWriter.write(&fresh, &gen, dir.path(), &layout);
        assert_eq!(mode(&res.target), 0o644);

        let kept = original(dir.path(), "b.tsx");
        let target = layout.target_for(dir.path(), kept.relative());
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "old\n").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o664)).unwrap();

        let gen = GeneratedTest::ok(kept.clone(), "new\n".into());
        let res = FsTestWriter.write(&kept, &gen, dir.path(), &layout);
        assert_eq!(res.status, WriteStatus::Written);
        assert_eq!(mode(&target), 0o664);
        assert_eq!(fs::read_to_string(&target).unwrap(), "new\n");
    }

    #[test]
    fn non_ok_generation_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = original(dir.path(), "c.tsx");
        let gen = GeneratedTest::failed(file.clone(), "boom");

        let res = FsTestWriter.write(&file, &gen, dir.path(), &MirrorLayout::default());
        assert_eq!(res.status, WriteStatus::SkippedEmpty);
        assert!(!dir.path().join("__tests__").exists());
    }

    #[test]
    fn unwritable_target_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file where the mirror directory should be
        fs::write(dir.path().join("__tests__"), "").unwrap();
        let file = original(dir.path(), "d.tsx");
        let gen = GeneratedTest::ok(file.clone(), "x\n".into());

        let res = FsTestWriter.write(&file, &gen, dir.path(), &MirrorLayout::default());
        assert_eq!(res.status, WriteStatus::IoError);
        assert!(res.message.is_some());
    }
}
