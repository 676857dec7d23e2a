use std::path::Path;

use crate::state::SourceContent;
use crate::testgen::generator::GenerationContext;

#[derive(Debug, Clone)]
pub struct LlmPrompt {
    pub system: String,
    pub user: String,
}

pub fn build_prompt(content: &SourceContent, ctx: &GenerationContext) -> LlmPrompt {
    LlmPrompt {
        system: system_prompt(ctx),
        user: user_prompt(content, ctx),
    }
}

/* ============================================================
   System prompt (stable per run)
   ============================================================ */

fn system_prompt(ctx: &GenerationContext) -> String {
    let mut out = format!(
        "You are an expert JavaScript/TypeScript engineer writing {fw} tests.\n\
         \n\
         Rules:\n\
         - Cover both success and failure paths where they exist\n\
         - Use meaningful test names\n\
         - Mock network, router and data-fetching dependencies\n\
         - Tests must be deterministic\n\
         - Only output the test file source, no prose\n",
        fw = ctx.framework
    );

    for line in &ctx.instructions {
        out.push_str("- ");
        out.push_str(line.trim());
        out.push('\n');
    }

    out.trim_end().to_string()
}

/* ============================================================
   User prompt (one per file)
   ============================================================ */

fn user_prompt(content: &SourceContent, ctx: &GenerationContext) -> String {
    let file = &content.file;
    let lang = fence_language(file.relative());

    let mut out = String::new();

    out.push_str("CONTEXT\n");
    out.push_str(&format!("File: {}\n", file.relative().display()));
    out.push_str(&format!("Kind: {}\n", file.category()));
    out.push_str(&format!("Test Framework: {}\n\n", ctx.framework));

    out.push_str("SOURCE\n");
    out.push_str(&format!("```{lang}\n"));
    out.push_str(content.text.trim_end());
    out.push_str("\n```\n\n");

    out.push_str(&format!(
        "Write a complete {} test file for the code above. \
         Import the module under test relative to the test file location.\n",
        ctx.framework
    ));

    out
}

fn fence_language(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("tsx") => "tsx",
        Some("ts") => "ts",
        Some("jsx") => "jsx",
        Some("js") | Some("mjs") | Some("cjs") => "js",
        Some("py") => "python",
        Some("rs") => "rust",
        _ => "",
    }
}
