// src/config.rs
//
// Defaults <- TOML file <- CLI flags, validated into typed options before
// any file is touched.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::discovery::DEFAULT_PAGE_MARKER;
use crate::error::InvocationError;
use crate::llm::client::{Provider, ProviderConfig};
use crate::state::Category;
use crate::testgen::generator::{GenerationContext, RetryPolicy};
use crate::testgen::registry::GeneratorSettings;
use crate::testgen::writer::{MirrorLayout, SuffixMode};

/* ---------- raw (file) layer ---------- */

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    pub pipeline: RawPipeline,
    pub generator: RawGenerator,
    pub llm: RawLlm,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawPipeline {
    pub extension: String,
    pub mirror_dir: String,
    pub suffix: String,
    pub suffix_mode: String,
    pub exclude: Vec<String>,
    pub concurrency: usize,
    pub categories: Option<Vec<String>>,
    pub page_marker: String,
    pub timeout_secs: Option<u64>,
}

impl Default for RawPipeline {
    fn default() -> Self {
        Self {
            extension: ".tsx".into(),
            mirror_dir: "__tests__".into(),
            suffix: ".test.js".into(),
            suffix_mode: "append".into(),
            exclude: vec!["node_modules".into()],
            concurrency: 1,
            categories: None,
            page_marker: DEFAULT_PAGE_MARKER.into(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawGenerator {
    pub kind: String,
    pub framework: String,
    pub instructions: Vec<String>,
    pub retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for RawGenerator {
    fn default() -> Self {
        Self {
            kind: "llm".into(),
            framework: "jest".into(),
            instructions: Vec::new(),
            retries: 0,
            retry_backoff_ms: 350,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawLlm {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            api_key: None,
            base_url: None,
            timeout_secs: 60,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("testmirror");
    dir.push("config.toml");
    dir
}

impl RawConfig {
    /// Load `explicit` (must exist) or the default location (may be absent).
    pub fn load(explicit: Option<&Path>) -> Result<Self, InvocationError> {
        let (path, required) = match explicit {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path(), false),
        };

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) if !required => return Ok(Self::default()),
            Err(e) => {
                return Err(InvocationError::Config {
                    path,
                    message: e.to_string(),
                })
            }
        };

        Self::parse(&raw).map_err(|message| InvocationError::Config { path, message })
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| e.to_string())
    }
}

/* ---------- validated layer ---------- */

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub extension_filter: String,
    pub layout: MirrorLayout,
    pub excluded_dirs: BTreeSet<String>,
    pub concurrency: usize,
    pub category_filter: Option<BTreeSet<Category>>,
    pub page_marker: String,
    pub run_timeout: Option<Duration>,
}

impl PipelineOptions {
    pub fn from_raw(raw: &RawPipeline) -> Result<Self, InvocationError> {
        if raw.extension.trim().is_empty() {
            return Err(InvocationError::EmptyExtension);
        }
        if raw.suffix.trim().is_empty() {
            return Err(InvocationError::EmptySuffix);
        }
        if raw.concurrency == 0 {
            return Err(InvocationError::InvalidConcurrency);
        }
        validate_mirror_dir(&raw.mirror_dir)?;

        let mode: SuffixMode = raw.suffix_mode.parse()?;

        let mut excluded_dirs: BTreeSet<String> = raw
            .exclude
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        // never rediscover our own output
        excluded_dirs.insert(raw.mirror_dir.clone());

        let category_filter = raw
            .categories
            .as_ref()
            .map(|tags| tags.iter().map(|t| Category::parse(t)).collect());

        Ok(Self {
            extension_filter: raw.extension.clone(),
            layout: MirrorLayout {
                mirror_dir_name: raw.mirror_dir.clone(),
                suffix: raw.suffix.clone(),
                mode,
            },
            excluded_dirs,
            concurrency: raw.concurrency,
            category_filter,
            page_marker: raw.page_marker.clone(),
            run_timeout: raw.timeout_secs.map(Duration::from_secs),
        })
    }
}

fn validate_mirror_dir(name: &str) -> Result<(), InvocationError> {
    let mut comps = Path::new(name).components();
    match (comps.next(), comps.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(InvocationError::InvalidMirrorDir(name.to_string())),
    }
}

/// Generator kind plus the settings its factory consumes.
pub fn generator_settings(
    generator: &RawGenerator,
    llm: &RawLlm,
) -> Result<(String, GeneratorSettings), InvocationError> {
    let provider = Provider::parse(&llm.provider)?;

    let api_key = llm
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| key_from_env(provider))
        .unwrap_or_default();

    let settings = GeneratorSettings {
        context: GenerationContext {
            framework: generator.framework.clone(),
            instructions: generator.instructions.clone(),
        },
        retry: RetryPolicy {
            retries: generator.retries,
            backoff: Duration::from_millis(generator.retry_backoff_ms),
        },
        provider: ProviderConfig {
            provider,
            model: llm.model.clone(),
            api_key,
            base_url: llm.base_url.clone(),
            timeout: Duration::from_secs(llm.timeout_secs.max(1)),
        },
    };

    Ok((generator.kind.clone(), settings))
}

fn key_from_env(provider: Provider) -> Option<String> {
    let var = match provider {
        Provider::OpenAI => "OPENAI_API_KEY",
        Provider::Anthropic => "ANTHROPIC_API_KEY",
        Provider::Ollama => return None,
    };
    env::var(var).ok().filter(|k| !k.trim().is_empty())
}
