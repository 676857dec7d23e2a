// src/llm/client.rs

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::InvocationError;
use crate::llm::prompt::LlmPrompt;
use crate::llm::TextBackend;

const PROMPT_ABI_VERSION: &str = "v1-mirror-testgen";
const ANTHROPIC_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone)]
pub struct LlmRunResult {
    pub text: String,
    pub prompt_hash: String,
    pub cached_tokens: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
    Ollama,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self, InvocationError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "anthropic" => Ok(Provider::Anthropic),
            "ollama" => Ok(Provider::Ollama),
            other => Err(InvocationError::UnknownProvider(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Ollama => "ollama",
        }
    }

    fn needs_key(self) -> bool {
        !matches!(self, Provider::Ollama)
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

/// Blocking HTTP client for the supported completion APIs.
pub struct LlmClient {
    cfg: ProviderConfig,
    http: reqwest::blocking::Client,
}

impl LlmClient {
    pub fn new(cfg: ProviderConfig) -> Result<Self, InvocationError> {
        if cfg.provider.needs_key() && cfg.api_key.trim().is_empty() {
            return Err(InvocationError::MissingApiKey(cfg.provider.name().into()));
        }

        let http = reqwest::blocking::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| InvocationError::HttpClient(e.to_string()))?;

        Ok(Self { cfg, http })
    }

    /// Execute one completion request.
    pub fn run(&self, prompt: &LlmPrompt) -> Result<LlmRunResult, String> {
        let prompt_hash = hash_prompt(prompt);
        let (url, headers, body) = build_request(&self.cfg, prompt, &prompt_hash);

        debug!(
            provider = self.cfg.provider.name(),
            model = %self.cfg.model,
            prompt_hash = %&prompt_hash[..12],
            "llm request"
        );

        let mut req = self.http.post(url).json(&body);
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let resp = req.send().map_err(|e| {
            if e.is_timeout() {
                format!("LLM request timed out after {:?}", self.cfg.timeout)
            } else {
                e.to_string()
            }
        })?;
        let status = resp.status();
        let json: Value = resp.json().map_err(|e| e.to_string())?;

        if !status.is_success() {
            return Err(format!("LLM error {}: {}", status, json));
        }

        let cached_tokens = cached_tokens(&json);
        let text = extract_text(self.cfg.provider, &json)?;

        Ok(LlmRunResult {
            text,
            prompt_hash,
            cached_tokens,
        })
    }
}

impl TextBackend for LlmClient {
    fn complete(&self, prompt: &LlmPrompt) -> Result<String, String> {
        let result = self.run(prompt)?;
        debug!(
            prompt_hash = %&result.prompt_hash[..12],
            cached_tokens = result.cached_tokens.unwrap_or(0),
            chars = result.text.len(),
            "llm response"
        );
        Ok(result.text)
    }
}

fn hash_prompt(prompt: &LlmPrompt) -> String {
    let mut h = Sha256::new();
    h.update(PROMPT_ABI_VERSION.as_bytes());
    h.update(prompt.system.as_bytes());
    h.update(prompt.user.as_bytes());
    hex::encode(h.finalize())
}

/// Prompt-cache hits as reported by the OpenAI usage block.
fn cached_tokens(v: &Value) -> Option<u64> {
    v.pointer("/usage/prompt_tokens_details/cached_tokens")
        .or_else(|| v.pointer("/usage/input_tokens_details/cached_tokens"))
        .and_then(Value::as_u64)
}

fn build_request(
    cfg: &ProviderConfig,
    prompt: &LlmPrompt,
    prompt_hash: &str,
) -> (String, Vec<(&'static str, String)>, Value) {
    match cfg.provider {
        Provider::OpenAI => {
            let url = cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1/responses".into());

            let body = serde_json::json!({
                "model": cfg.model,
                "instructions": prompt.system,
                "input": prompt.user,
                "prompt_cache_key": prompt_hash,
            });

            (
                url,
                vec![("Authorization", format!("Bearer {}", cfg.api_key))],
                body,
            )
        }

        Provider::Anthropic => {
            let url = cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com/v1/messages".into());

            let body = serde_json::json!({
                "model": cfg.model,
                "max_tokens": ANTHROPIC_MAX_TOKENS,
                "system": prompt.system,
                "messages": [
                    { "role": "user", "content": prompt.user }
                ]
            });

            (
                url,
                vec![
                    ("x-api-key", cfg.api_key.clone()),
                    ("anthropic-version", "2023-06-01".into()),
                ],
                body,
            )
        }

        Provider::Ollama => {
            let url = cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434/api/generate".into());

            let body = serde_json::json!({
                "model": cfg.model,
                "system": prompt.system,
                "prompt": prompt.user,
                "stream": false,
            });

            (url, Vec::new(), body)
        }
    }
}

fn extract_text(provider: Provider, v: &Value) -> Result<String, String> {
    match provider {
        Provider::OpenAI => v
            .get("output")
            .and_then(|o| o.as_array())
            .and_then(|arr| {
                arr.iter().find_map(|item| {
                    item.get("content")?
                        .as_array()?
                        .iter()
                        .find_map(|c| c.get("text")?.as_str())
                })
            })
            .map(str::to_owned)
            .ok_or_else(|| "OpenAI response parse failure".into()),

        Provider::Anthropic => v
            .pointer("/content/0/text")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .ok_or_else(|| "Anthropic response parse failure".into()),

        Provider::Ollama => v
            .get("response")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .ok_or_else(|| "Ollama response parse failure".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg(provider: Provider, key: &str) -> ProviderConfig {
        ProviderConfig {
            provider,
            model: "m".into(),
            api_key: key.into(),
            base_url: None,
            timeout: Duration::from_secs(5),
        }
    }

    fn prompt() -> LlmPrompt {
        LlmPrompt {
            system: "sys".into(),
            user: "usr".into(),
        }
    }

    #[test]
    fn hosted_providers_require_a_key() {
        assert!(matches!(
            LlmClient::new(cfg(Provider::OpenAI, " ")),
            Err(InvocationError::MissingApiKey(p)) if p == "openai"
        ));
        assert!(LlmClient::new(cfg(Provider::Ollama, "")).is_ok());
    }

    #[test]
    fn provider_names_round_trip() {
        for p in [Provider::OpenAI, Provider::Anthropic, Provider::Ollama] {
            assert_eq!(Provider::parse(p.name()).unwrap(), p);
        }
        assert!(Provider::parse("gemini").is_err());
    }

    #[test]
    fn anthropic_request_shape() {
        let (url, headers, body) = build_request(&cfg(Provider::Anthropic, "k"), &prompt(), "h");
        assert_eq!(url, "https://api.anthropic.com/v1/messages");
        assert!(headers.iter().any(|(k, v)| *k == "x-api-key" && v == "k"));
        assert_eq!(body["messages"][0]["content"], "usr");
        assert_eq!(body["system"], "sys");
    }

    #[test]
    fn extracts_text_per_provider() {
        let openai = json!({ "output": [ { "type": "reasoning" }, { "content": [ { "text": "A" } ] } ] });
        let anthropic = json!({ "content": [ { "text": "B" } ] });
        let ollama = json!({ "response": "C" });

        assert_eq!(extract_text(Provider::OpenAI, &openai).unwrap(), "A");
        assert_eq!(extract_text(Provider::Anthropic, &anthropic).unwrap(), "B");
        assert_eq!(extract_text(Provider::Ollama, &ollama).unwrap(), "C");
        assert!(extract_text(Provider::Ollama, &json!({})).is_err());
    }

    #[test]
    fn cached_tokens_from_usage() {
        let chat = json!({ "usage": { "prompt_tokens_details": { "cached_tokens": 128 } } });
        let responses = json!({ "usage": { "input_tokens_details": { "cached_tokens": 64 } } });

        assert_eq!(cached_tokens(&chat), Some(128));
        assert_eq!(cached_tokens(&responses), Some(64));
        assert_eq!(cached_tokens(&json!({ "response": "C" })), None);
    }

    #[test]
    fn prompt_hash_is_stable() {
        assert_eq!(hash_prompt(&prompt()), hash_prompt(&prompt()));
        assert_eq!(hash_prompt(&prompt()).len(), 64);
    }
}
