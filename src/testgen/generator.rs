//! generator.rs
//!
//! Turns readable source into test code. The LLM-backed generator is a thin
//! adapter over a [`TextBackend`]; the skeleton generator works offline.

use std::path::{Component, Path};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::llm::prompt::build_prompt;
use crate::llm::TextBackend;
use crate::state::{GeneratedTest, ReadStatus, SourceContent};
use crate::testgen::extract::extract_test_code;

pub trait TestCodeGenerator: Send + Sync {
    /// `content.status` must be `Ok`. Never panics or returns `Err`: failures
    /// are reported through the returned status.
    fn generate(&self, content: &SourceContent) -> GeneratedTest;
}

#[derive(Debug, Clone)]
pub struct GenerationContext {
    /// Target test framework, e.g. `jest`.
    pub framework: String,
    /// Extra rules appended to the system prompt.
    pub instructions: Vec<String>,
}

impl Default for GenerationContext {
    fn default() -> Self {
        Self {
            framework: "jest".into(),
            instructions: Vec::new(),
        }
    }
}

/// Retries are opt-in; the default makes exactly one attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            backoff: Duration::from_millis(350),
        }
    }
}

/* ============================================================
   LLM-backed
   ============================================================ */

pub struct LlmTestGenerator {
    backend: Box<dyn TextBackend>,
    ctx: GenerationContext,
    retry: RetryPolicy,
}

impl LlmTestGenerator {
    pub fn new(backend: Box<dyn TextBackend>, ctx: GenerationContext) -> Self {
        Self {
            backend,
            ctx,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl TestCodeGenerator for LlmTestGenerator {
    fn generate(&self, content: &SourceContent) -> GeneratedTest {
        let file = content.file.clone();

        if content.status != ReadStatus::Ok {
            return GeneratedTest::failed(
                file,
                format!("generation requested for unreadable source ({:?})", content.status),
            );
        }

        let prompt = build_prompt(content, &self.ctx);
        let attempts = self.retry.retries + 1;
        let mut last_err = String::new();

        for attempt in 1..=attempts {
            match self.backend.complete(&prompt) {
                Ok(raw) => {
                    let code = extract_test_code(&raw);
                    debug!(
                        file = %file.relative().display(),
                        attempt,
                        len = code.len(),
                        "generation returned"
                    );
                    return if code.is_empty() {
                        GeneratedTest::empty(file)
                    } else {
                        GeneratedTest::ok(file, code)
                    };
                }
                Err(e) => {
                    warn!(file = %file.relative().display(), attempt, error = %e, "generation failed");
                    last_err = e;
                    if attempt < attempts {
                        thread::sleep(self.retry.backoff * attempt);
                    }
                }
            }
        }

        GeneratedTest::failed(file, last_err)
    }
}

/* ============================================================
   Offline skeleton
   ============================================================ */

/// Emits a Jest skeleton with `it.todo` placeholders. Never calls out.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkeletonGenerator;

impl TestCodeGenerator for SkeletonGenerator {
    fn generate(&self, content: &SourceContent) -> GeneratedTest {
        let file = content.file.clone();

        if content.status != ReadStatus::Ok {
            return GeneratedTest::failed(
                file,
                format!("generation requested for unreadable source ({:?})", content.status),
            );
        }

        let rel = file.relative();
        let subject = rel
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
            .to_string();

        let code = format!(
            "import Subject from '{import}';\n\
             \n\
             describe('{subject}', () => {{\n\
             \x20 it('is defined', () => {{\n\
             \x20   expect(Subject).toBeDefined();\n\
             \x20 }});\n\
             \n\
             \x20 it.todo('renders the success path');\n\
             \x20 it.todo('handles the failure path');\n\
             }});\n",
            import = import_path(rel),
        );

        GeneratedTest::ok(file, code)
    }
}

/// Import specifier from `<mirror>/<rel dir>/` back to the source module,
/// without its extension.
fn import_path(rel: &Path) -> String {
    let depth = rel
        .parent()
        .map(|p| p.components().filter(|c| matches!(c, Component::Normal(_))).count())
        .unwrap_or(0);

    let mut out = "../".repeat(depth + 1);
    let module = rel.with_extension("");
    out.push_str(&module.to_string_lossy().replace('\\', "/"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::prompt::LlmPrompt;
    use crate::state::{Category, GenerationStatus, ProjectFile};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<Vec<Result<String, String>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<String, String>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: AtomicU32::new(0),
            }
        }
    }

    impl TextBackend for std::sync::Arc<Scripted> {
        fn complete(&self, _prompt: &LlmPrompt) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err("no scripted reply".into()))
        }
    }

    fn content(status: ReadStatus) -> SourceContent {
        SourceContent {
            file: ProjectFile::new(
                PathBuf::from("/app/components/ui/Btn.tsx"),
                PathBuf::from("components/ui/Btn.tsx"),
                Category::Component,
            ),
            text: "export const Btn = () => <button/>;".into(),
            status,
        }
    }

    fn generator(replies: Vec<Result<String, String>>, retries: u32) -> (LlmTestGenerator, std::sync::Arc<Scripted>) {
        let backend = std::sync::Arc::new(Scripted::new(replies));
        let gen = LlmTestGenerator::new(Box::new(backend.clone()), GenerationContext::default())
            .with_retry(RetryPolicy {
                retries,
                backoff: Duration::from_millis(1),
            });
        (gen, backend)
    }

    #[test]
    fn ok_reply_is_unfenced() {
        let (gen, _) = generator(vec![Ok("```js\ntest('x', () => {});\n```".into())], 0);
        let out = gen.generate(&content(ReadStatus::Ok));
        assert_eq!(out.status, GenerationStatus::Ok);
        assert_eq!(out.text, "test('x', () => {});\n");
    }

    #[test]
    fn blank_reply_is_empty() {
        let (gen, _) = generator(vec![Ok("   \n".into())], 0);
        assert_eq!(gen.generate(&content(ReadStatus::Ok)).status, GenerationStatus::Empty);
    }

    #[test]
    fn backend_error_is_failed_with_diagnostic() {
        let (gen, backend) = generator(vec![Err("LLM error 500".into())], 0);
        let out = gen.generate(&content(ReadStatus::Ok));
        assert_eq!(out.status, GenerationStatus::Failed);
        assert_eq!(out.text, "LLM error 500");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retries_only_when_configured() {
        let (gen, backend) = generator(vec![Err("flaky".into()), Ok("it('ok')".into())], 2);
        let out = gen.generate(&content(ReadStatus::Ok));
        assert_eq!(out.status, GenerationStatus::Ok);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unreadable_content_never_reaches_backend() {
        let (gen, backend) = generator(vec![Ok("x".into())], 0);
        let out = gen.generate(&content(ReadStatus::Empty));
        assert_eq!(out.status, GenerationStatus::Failed);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn skeleton_imports_source_relative_to_mirror() {
        let out = SkeletonGenerator.generate(&content(ReadStatus::Ok));
        assert_eq!(out.status, GenerationStatus::Ok);
        assert!(out.text.contains("import Subject from '../../../components/ui/Btn';"));
        assert!(out.text.contains("describe('Btn'"));
    }
}
