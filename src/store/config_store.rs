//! Configuration & Prompt Store (§4.1). Exposes the active `AgentConfig`
//! per environment and the active `Prompt` per `(name, type)`, backed by an
//! in-process map guarded by `tokio::sync::RwLock` so the brief exclusive
//! lock is only held for the duration of a swap (§5).

use crate::domain::{AgentConfig, ConfigPatch, Prompt};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_active_config(&self, environment: &str) -> Result<AgentConfig>;
    async fn update_config(&self, environment: &str, patch: ConfigPatch) -> Result<AgentConfig>;
}

#[async_trait]
pub trait PromptStore: Send + Sync {
    async fn get_active_prompt(&self, name: &str, prompt_type: &str) -> Result<Prompt>;
    async fn create_prompt_version(
        &self,
        name: &str,
        prompt_type: &str,
        content: &str,
        notes: Option<String>,
        activate: bool,
    ) -> Result<Prompt>;
    async fn activate_version(&self, prompt_id: Uuid) -> Result<Prompt>;
    async fn get_prompt(&self, id: Uuid) -> Result<Prompt>;
    async fn history(&self, name: &str) -> Result<Vec<Prompt>>;
    async fn list(&self) -> Result<Vec<Prompt>>;

    /// Load the active prompt and substitute `{var}` placeholders. Never
    /// raises: any failure (not found, store unreachable, missing
    /// variable) returns `fallback` with a `None` version (§4.1).
    async fn format_prompt(
        &self,
        name: &str,
        prompt_type: &str,
        vars: &HashMap<String, String>,
        fallback: &str,
    ) -> (String, Option<u32>) {
        match self.get_active_prompt(name, prompt_type).await {
            Ok(prompt) => match substitute(&prompt.content, vars) {
                Ok(content) => (content, Some(prompt.version)),
                Err(_) => (fallback.to_string(), None),
            },
            Err(_) => (fallback.to_string(), None),
        }
    }
}

/// Fails if the template references a placeholder absent from `vars`
/// (fail-closed template engine, §9).
fn substitute(template: &str, vars: &HashMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = template[i..].find('}') {
                let key = &template[i + 1..i + end];
                let value = vars
                    .get(key)
                    .ok_or_else(|| Error::internal(format!("missing prompt variable: {key}")))?;
                out.push_str(value);
                i += end + 1;
                continue;
            }
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    let _ = &mut chars;
    Ok(out)
}

struct PromptSlot {
    versions: Vec<Prompt>,
}

/// Single in-process implementation of both `ConfigStore` and `PromptStore`
/// (§4.1a). Configs are keyed by `(name, environment)`; prompts by
/// `(name, prompt_type)`, each holding every version so history/rollback
/// reads work without a second table.
pub struct InMemoryConfigStore {
    configs: RwLock<HashMap<(String, String), AgentConfig>>,
    prompts: RwLock<HashMap<(String, String), PromptSlot>>,
    by_id: RwLock<HashMap<Uuid, (String, String)>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        InMemoryConfigStore {
            configs: RwLock::new(HashMap::new()),
            prompts: RwLock::new(HashMap::new()),
            by_id: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_default_config(self, name: &str, environment: &str) -> Self {
        let config = AgentConfig::default_for_environment(name, environment);
        let key = (name.to_string(), environment.to_string());
        self.configs.try_write().expect("uncontended at construction").insert(key, config);
        self
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get_active_config(&self, environment: &str) -> Result<AgentConfig> {
        let configs = self.configs.read().await;
        configs
            .iter()
            .find(|((_, env), cfg)| env == environment && cfg.active)
            .map(|(_, cfg)| cfg.clone())
            .ok_or_else(|| Error::not_found("no active agent config for environment"))
    }

    async fn update_config(&self, environment: &str, patch: ConfigPatch) -> Result<AgentConfig> {
        let mut configs = self.configs.write().await;
        let existing = configs
            .iter()
            .find(|((_, env), cfg)| env == environment && cfg.active)
            .map(|(k, cfg)| (k.clone(), cfg.clone()));

        let (key, current) = match existing {
            Some((key, cfg)) => (key, cfg),
            None => {
                let cfg = AgentConfig::default_for_environment("main", environment);
                ((cfg.name.clone(), environment.to_string()), cfg)
            }
        };

        let next = crate::domain::apply_patch(&current, patch)?;
        configs.insert(key, next.clone());
        Ok(next)
    }
}

#[async_trait]
impl PromptStore for InMemoryConfigStore {
    async fn get_active_prompt(&self, name: &str, prompt_type: &str) -> Result<Prompt> {
        let prompts = self.prompts.read().await;
        let key = (name.to_string(), prompt_type.to_string());
        let slot = prompts.get(&key).ok_or_else(|| Error::not_found("prompt not found"))?;
        slot.versions
            .iter()
            .find(|p| p.active)
            .cloned()
            .ok_or_else(|| Error::not_found("no active prompt version"))
    }

    async fn create_prompt_version(
        &self,
        name: &str,
        prompt_type: &str,
        content: &str,
        notes: Option<String>,
        activate: bool,
    ) -> Result<Prompt> {
        let mut prompts = self.prompts.write().await;
        let key = (name.to_string(), prompt_type.to_string());
        let slot = prompts.entry(key.clone()).or_insert_with(|| PromptSlot { versions: Vec::new() });
        let version = slot.versions.iter().map(|p| p.version).max().unwrap_or(0) + 1;
        let mut prompt = Prompt::new_version(name, prompt_type, version, content, notes, activate);
        if activate {
            for existing in slot.versions.iter_mut() {
                existing.active = false;
            }
        } else {
            prompt.active = false;
        }
        slot.versions.push(prompt.clone());
        self.by_id.write().await.insert(prompt.id, key);
        Ok(prompt)
    }

    async fn activate_version(&self, prompt_id: Uuid) -> Result<Prompt> {
        let key = self
            .by_id
            .read()
            .await
            .get(&prompt_id)
            .cloned()
            .ok_or_else(|| Error::not_found("prompt not found"))?;
        let mut prompts = self.prompts.write().await;
        let slot = prompts.get_mut(&key).ok_or_else(|| Error::not_found("prompt not found"))?;
        let mut activated = None;
        for existing in slot.versions.iter_mut() {
            existing.active = existing.id == prompt_id;
            existing.updated_at = chrono::Utc::now();
            if existing.active {
                activated = Some(existing.clone());
            }
        }
        activated.ok_or_else(|| Error::not_found("prompt version not found"))
    }

    async fn get_prompt(&self, id: Uuid) -> Result<Prompt> {
        let key = self.by_id.read().await.get(&id).cloned().ok_or_else(|| Error::not_found("prompt not found"))?;
        let prompts = self.prompts.read().await;
        let slot = prompts.get(&key).ok_or_else(|| Error::not_found("prompt not found"))?;
        slot.versions.iter().find(|p| p.id == id).cloned().ok_or_else(|| Error::not_found("prompt not found"))
    }

    async fn history(&self, name: &str) -> Result<Vec<Prompt>> {
        let prompts = self.prompts.read().await;
        let mut out: Vec<Prompt> = prompts
            .iter()
            .filter(|((n, _), _)| n == name)
            .flat_map(|(_, slot)| slot.versions.clone())
            .collect();
        out.sort_by_key(|p| p.version);
        Ok(out)
    }

    async fn list(&self) -> Result<Vec<Prompt>> {
        let prompts = self.prompts.read().await;
        Ok(prompts.values().flat_map(|slot| slot.versions.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn activation_is_exclusive_per_name_and_type() {
        let store = InMemoryConfigStore::new();
        let v1 = store.create_prompt_version("main", "system", "hello {name}", None, true).await.unwrap();
        let v2 = store.create_prompt_version("main", "system", "hi {name}", None, false).await.unwrap();
        assert!(v1.active);
        assert!(!v2.active);

        store.activate_version(v2.id).await.unwrap();
        let active = store.get_active_prompt("main", "system").await.unwrap();
        assert_eq!(active.id, v2.id);

        let history = store.history("main").await.unwrap();
        let active_count = history.iter().filter(|p| p.active).count();
        assert_eq!(active_count, 1);
    }

    #[tokio::test]
    async fn format_prompt_falls_back_on_missing_variable() {
        let store = InMemoryConfigStore::new();
        store.create_prompt_version("greeting", "system", "hello {name}", None, true).await.unwrap();
        let vars = HashMap::new();
        let (content, version) = store.format_prompt("greeting", "system", &vars, "fallback text").await;
        assert_eq!(content, "fallback text");
        assert_eq!(version, None);
    }

    #[tokio::test]
    async fn format_prompt_falls_back_when_not_found() {
        let store = InMemoryConfigStore::new();
        let vars = HashMap::new();
        let (content, version) = store.format_prompt("missing", "system", &vars, "fallback").await;
        assert_eq!(content, "fallback");
        assert_eq!(version, None);
    }

    #[tokio::test]
    async fn update_config_validates_and_bumps_version() {
        let store = InMemoryConfigStore::new().with_default_config("main", "production");
        let mut model = crate::domain::ModelSettings::default();
        model.temperature = 0.5;
        model.max_tokens = 2048;
        let patch = ConfigPatch { model_settings: Some(model), ..Default::default() };
        let updated = store.update_config("production", patch).await.unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.model_settings.temperature, 0.5);
    }
}
