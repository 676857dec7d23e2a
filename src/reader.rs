use std::fs;
use std::io;

use tracing::debug;

use crate::state::{ProjectFile, ReadStatus, SourceContent};

/// Loads the text of a discovered file. Every failure is encoded in the
/// returned status.
pub trait ContentReader: Send + Sync {
    fn read(&self, file: &ProjectFile) -> SourceContent;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsReader;

impl ContentReader for FsReader {
    fn read(&self, file: &ProjectFile) -> SourceContent {
        let (text, status) = match fs::read_to_string(file.path()) {
            Ok(text) if text.trim().is_empty() => (String::new(), ReadStatus::Empty),
            Ok(text) => (text, ReadStatus::Ok),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (String::new(), ReadStatus::NotFound),
            Err(e) => (describe(&e), ReadStatus::ReadError),
        };

        debug!(
            file = %file.relative().display(),
            ?status,
            len = text.len(),
            "read source"
        );

        SourceContent {
            file: file.clone(),
            text,
            status,
        }
    }
}

fn describe(e: &io::Error) -> String {
    match e.kind() {
        io::ErrorKind::InvalidData => format!("file is not valid UTF-8: {e}"),
        io::ErrorKind::PermissionDenied => format!("permission denied: {e}"),
        _ => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Category;
    use std::path::{Path, PathBuf};

    fn project_file(root: &Path, rel: &str) -> ProjectFile {
        ProjectFile::new(root.join(rel), PathBuf::from(rel), Category::Component)
    }

    #[test]
    fn reads_text_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.tsx"), "export default 1;\n").unwrap();

        let content = FsReader.read(&project_file(dir.path(), "a.tsx"));
        assert_eq!(content.status, ReadStatus::Ok);
        assert_eq!(content.text, "export default 1;\n");
    }

    #[test]
    fn zero_length_and_whitespace_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("zero.tsx"), "").unwrap();
        fs::write(dir.path().join("blank.tsx"), " \n\t\n").unwrap();

        assert_eq!(FsReader.read(&project_file(dir.path(), "zero.tsx")).status, ReadStatus::Empty);
        assert_eq!(FsReader.read(&project_file(dir.path(), "blank.tsx")).status, ReadStatus::Empty);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let content = FsReader.read(&project_file(dir.path(), "gone.tsx"));
        assert_eq!(content.status, ReadStatus::NotFound);
        assert!(content.text.is_empty());
    }

    #[test]
    fn invalid_utf8_is_read_error_with_message() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bin.tsx"), [0xff, 0xfe, 0x00, 0x41]).unwrap();

        let content = FsReader.read(&project_file(dir.path(), "bin.tsx"));
        assert_eq!(content.status, ReadStatus::ReadError);
        assert!(content.text.contains("UTF-8"));
    }
}
