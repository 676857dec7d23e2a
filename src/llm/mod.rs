pub mod client;
pub mod prompt;

use prompt::LlmPrompt;

/// External text-generation capability.
///
/// Implementations may block; the caller bounds them with its own timeout.
pub trait TextBackend: Send + Sync {
    fn complete(&self, prompt: &LlmPrompt) -> Result<String, String>;
}
