use anyhow::{anyhow, Context, Result};
use reqwest::{header::HeaderValue, Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::time::sleep;

const MAX_RETRIES: usize = 4;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatProvider {
    OpenAi,
    Local,
}

impl ChatProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatProvider::OpenAi => "openai",
            ChatProvider::Local => "local",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "openai" => Some(ChatProvider::OpenAi),
            "local" => Some(ChatProvider::Local),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub user: String,
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    provider: ChatProvider,
    model: String,
    config: ProviderConfig,
}

#[derive(Clone)]
enum ProviderConfig {
    OpenAi(OpenAiConfig),
    Local,
}

#[derive(Clone)]
struct OpenAiConfig {
    api_key: String,
    base_url: String,
}

impl ChatClient {
    pub fn new(provider: ChatProvider, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        let http = Client::builder()
            .timeout(request_timeout())
            .build()
            .context("failed to build http client")?;
        let config = match provider {
            ChatProvider::OpenAi => ProviderConfig::OpenAi(OpenAiConfig {
                api_key: read_api_key("OPENAI_API_KEY")?,
                base_url: env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            }),
            ChatProvider::Local => ProviderConfig::Local,
        };
        Ok(Self {
            http,
            provider,
            model,
            config,
        })
    }

    /// Offline client that answers deterministically without a network.
    pub fn local() -> Self {
        Self {
            http: Client::new(),
            provider: ChatProvider::Local,
            model: "local".to_string(),
            config: ProviderConfig::Local,
        }
    }

    pub fn provider(&self) -> ChatProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat(&self, req: &ChatRequest) -> Result<ChatReply> {
        match &self.config {
            ProviderConfig::OpenAi(cfg) => self.chat_openai(cfg, req).await,
            ProviderConfig::Local => Ok(chat_local(req)),
        }
    }

    pub fn chat_blocking(&self, req: &ChatRequest) -> Result<ChatReply> {
        if matches!(self.config, ProviderConfig::Local) {
            return Ok(chat_local(req));
        }
        let rt = Runtime::new().context("failed to create tokio runtime")?;
        rt.block_on(self.chat(req))
    }

    async fn chat_openai(&self, cfg: &OpenAiConfig, req: &ChatRequest) -> Result<ChatReply> {
        let url = format!("{}/chat/completions", cfg.base_url.trim_end_matches('/'));
        let mut messages = Vec::new();
        if let Some(system) = &req.system {
            messages.push(json!({"role": "system", "content": system }));
        }
        messages.push(json!({"role": "user", "content": req.user }));
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.2,
        });
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            // Timeouts surface as transport errors here and are retried the
            // same way until the attempt budget runs out.
            let response = match self
                .http
                .post(&url)
                .bearer_auth(&cfg.api_key)
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt > MAX_RETRIES {
                        return Err(err).with_context(|| "openai request failed");
                    }
                    sleep(backoff_delay(attempt, None)).await;
                    continue;
                }
            };
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt > MAX_RETRIES {
                    return Err(anyhow!("openai rate limited after {MAX_RETRIES} retries"));
                }
                let wait = backoff_delay(attempt, response.headers().get("retry-after"));
                sleep(wait).await;
                continue;
            }
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(anyhow!("openai returned error (status {status}): {body}"));
            }
            let parsed: ChatCompletionResponse =
                serde_json::from_str(&body).context("failed to decode openai response")?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or_else(|| anyhow!("missing text in openai response"))?;
            let usage = parsed.usage.unwrap_or_default();
            return Ok(ChatReply {
                content,
                prompt_tokens: usage.prompt_tokens.unwrap_or(0),
                completion_tokens: usage.completion_tokens.unwrap_or(0),
            });
        }
    }
}

fn request_timeout() -> Duration {
    let secs = env::var("LLM_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Duration::from_secs(secs.max(1))
}

fn backoff_delay(attempt: usize, retry_after: Option<&HeaderValue>) -> Duration {
    if let Some(value) = retry_after {
        if let Ok(text) = value.to_str() {
            if let Ok(secs) = text.parse::<u64>() {
                return Duration::from_secs(secs.max(1));
            }
        }
    }
    let capped = attempt.min(6) as u32;
    Duration::from_secs(1u64 << capped)
}

fn read_api_key(var: &str) -> Result<String> {
    let value = env::var(var).map_err(|_| anyhow!(format!("{var} is not set")))?;
    if !value.starts_with("sk-") {
        return Err(anyhow!(format!(
            "{var} must start with 'sk-' (see https://platform.openai.com/)"
        )));
    }
    Ok(value)
}

/// Offline reply synthesis. Recognizes the two prompt families this system
/// sends (curriculum extraction and lesson-plan generation) and produces
/// structurally faithful answers, which is what the integration tests run
/// against.
fn chat_local(req: &ChatRequest) -> ChatReply {
    let content = if req.user.contains("expert curriculum analyzer") {
        local_metadata_reply()
    } else if let Some(days) = parse_requested_days(&req.user) {
        local_plan_reply(&req.user, days)
    } else {
        req.user
            .split_whitespace()
            .take(40)
            .collect::<Vec<_>>()
            .join(" ")
    };
    ChatReply {
        content,
        prompt_tokens: 0,
        completion_tokens: 0,
    }
}

fn local_metadata_reply() -> String {
    json!({
        "title": "Sample Curriculum Unit",
        "duration": "Not specified",
        "learningObjectives": ["Understand the core topic"],
        "keyConcepts": ["Key idea one", "Key idea two"],
        "standards": [{"code": "STD.1", "description": "Sample standard"}],
        "assessments": [{"type": "Quiz", "criteria": "Short answer accuracy"}],
        "materials": [{"externalLinks": [], "description": "Not specified"}],
        "tools": ["Whiteboard"]
    })
    .to_string()
}

fn local_plan_reply(user: &str, days: u32) -> String {
    let topic = extract_between(user, "on the topic '", "'").unwrap_or("the unit");
    let mut out = String::new();
    out.push_str("**1. Purpose**\n- Ground the class in ");
    out.push_str(topic);
    out.push_str(".\n\n**2. Objectives**\n- By the end of this lesson, students will be able to explain the topic.\n\n");
    out.push_str("**3. Planning and Preparation Notes**\n- Materials listed per day.\n\n");
    out.push_str("**4. Prior Knowledge**\n- Reviewed during the opening.\n\n");
    out.push_str("**5. Lesson Flow**\n");
    for day in 1..=days {
        out.push_str(&format!(
            "### Day {day}\n- Introduction: hook activity.\n- Mini-Lesson: core concept.\n- Guided Practice: group work.\n- Independent Practice: individual task.\n- Assessment and Wrap-Up: exit ticket.\n\n"
        ));
    }
    out.push_str("**6. Extension/Enrichment**\n- Optional challenge problems.\n\n");
    out.push_str("**7. Assessment Tools**\n- Formative checks each day.\n");
    out
}

/// Pulls the day count out of a "{days}-day lesson plan" phrase.
fn parse_requested_days(user: &str) -> Option<u32> {
    let marker = user.find("-day lesson plan")?;
    let digits: String = user[..marker]
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

fn extract_between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let rest = &text[from..];
    let to = rest.find(end)?;
    Some(&rest[..to])
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Default, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_extraction_reply_is_valid_json() {
        let client = ChatClient::local();
        let reply = client
            .chat_blocking(&ChatRequest {
                system: None,
                user: "You are an expert curriculum analyzer. Extract detailed information."
                    .to_string(),
            })
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&reply.content).unwrap();
        assert!(value.get("title").is_some());
        assert!(value.get("learningObjectives").is_some());
    }

    #[test]
    fn local_plan_reply_has_one_section_per_day() {
        let client = ChatClient::local();
        let reply = client
            .chat_blocking(&ChatRequest {
                system: None,
                user: "Create a comprehensive, detailed, and practical 3-day lesson plan for a Grade 5 class on the topic 'Fractions' with a focus on the subtopic from the unit.".to_string(),
            })
            .unwrap();
        for day in 1..=3 {
            assert!(reply.content.contains(&format!("### Day {day}")));
        }
        assert!(!reply.content.contains("### Day 4"));
    }

    #[test]
    fn day_count_parsing_handles_multi_digit_values() {
        assert_eq!(parse_requested_days("a 12-day lesson plan"), Some(12));
        assert_eq!(parse_requested_days("no marker here"), None);
    }
}
