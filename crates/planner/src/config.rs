use anyhow::{anyhow, Result};
use std::env;

use lessonforge_llm::ChatProvider;

/// Chunks of context retrieved for plan generation.
pub const PLAN_CONTEXT_TOP_K: usize = 5;

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub provider: ChatProvider,
    pub model: String,
    pub index_db: String,
    pub records_db: String,
}

impl PlannerConfig {
    pub fn from_env() -> Result<Self> {
        let provider_name =
            env::var("LESSONFORGE_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let provider = ChatProvider::from_str(&provider_name)
            .ok_or_else(|| anyhow!(format!("unknown provider {provider_name}")))?;
        let model = env::var("LESSONFORGE_MODEL")
            .unwrap_or_else(|_| default_model(provider).to_string());
        let index_db =
            env::var("LESSONFORGE_INDEX_DB").unwrap_or_else(|_| "index.sqlite".to_string());
        let records_db =
            env::var("LESSONFORGE_RECORDS_DB").unwrap_or_else(|_| "plans.sqlite".to_string());
        Ok(Self {
            provider,
            model,
            index_db,
            records_db,
        })
    }
}

fn default_model(provider: ChatProvider) -> &'static str {
    match provider {
        ChatProvider::OpenAi => "gpt-4o-mini",
        ChatProvider::Local => "local",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_default_model_is_set() {
        assert_eq!(default_model(ChatProvider::OpenAi), "gpt-4o-mini");
    }
}
