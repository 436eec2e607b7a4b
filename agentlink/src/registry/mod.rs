//! Registry of known remote agents.
//!
//! The registry discovers agents through their well-known card descriptor,
//! keeps the latest card per agent, maintains an inverted skill index and
//! tracks reachability. All state is in memory and safe for concurrent use.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use a2a_types::{AgentCard, AGENT_CARD_PATH};

use crate::errors::{AgentError, AgentResult};

/// Default deadline for a discovery fetch.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default deadline for a reachability probe.
pub const DEFAULT_REACHABILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// A known agent: its latest card plus local bookkeeping.
#[derive(Debug, Clone)]
pub struct RegisteredAgent {
    pub card: AgentCard,
    /// Epoch milliseconds of the last successful discovery or registration.
    pub last_updated: i64,
    pub is_reachable: bool,
    /// Why the last probe or discovery failed, if it did.
    pub last_error: Option<String>,
    /// Local labels attached at registration time; not part of the card.
    pub tags: Vec<String>,
}

/// Knobs for [`AgentRegistry::discover`] and [`AgentRegistry::refresh_all`].
#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    /// Overrides [`DEFAULT_DISCOVERY_TIMEOUT`] when set.
    pub timeout: Option<Duration>,
    /// Extra headers sent with the card fetch (e.g. auth).
    pub headers: HashMap<String, String>,
    /// Optional external cancellation.
    pub cancel: Option<CancellationToken>,
}

/// Conjunctive criteria for [`AgentRegistry::find`]. Unset fields match
/// everything.
#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    /// Exact skill id.
    pub skill_id: Option<String>,
    /// Case-insensitive substring of a skill name.
    pub skill_name: Option<String>,
    /// At least one of these skill tags must appear on some skill.
    pub skill_tags: Vec<String>,
    /// A capability flag that must be enabled on the card.
    pub capability: Option<String>,
    /// Require a specific reachability status.
    pub reachable: Option<bool>,
    /// At least one of these local registration tags must be present.
    pub tags: Vec<String>,
}

impl AgentFilter {
    fn matches(&self, agent: &RegisteredAgent) -> bool {
        if let Some(skill_id) = &self.skill_id {
            if !agent.card.has_skill(skill_id) {
                return false;
            }
        }
        if let Some(fragment) = &self.skill_name {
            let fragment = fragment.to_lowercase();
            if !agent
                .card
                .skills
                .iter()
                .any(|skill| skill.name.to_lowercase().contains(&fragment))
            {
                return false;
            }
        }
        if !self.skill_tags.is_empty() {
            let any_tag = agent.card.skills.iter().any(|skill| {
                skill
                    .tags
                    .iter()
                    .any(|tag| self.skill_tags.contains(tag))
            });
            if !any_tag {
                return false;
            }
        }
        if let Some(capability) = &self.capability {
            if !agent.card.has_capability(capability) {
                return false;
            }
        }
        if let Some(reachable) = self.reachable {
            if agent.is_reachable != reachable {
                return false;
            }
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|tag| agent.tags.contains(tag)) {
            return false;
        }
        true
    }
}

/// Outcome of one agent's refresh inside [`AgentRegistry::refresh_all`].
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub success: bool,
    pub error: Option<String>,
}

/// Concurrent in-memory agent registry.
#[derive(Debug)]
pub struct AgentRegistry {
    http: reqwest::Client,
    /// Keyed by normalized base URL (no trailing slash).
    agents: DashMap<String, RegisteredAgent>,
    /// skill id -> normalized URLs of agents advertising it.
    skill_index: DashMap<String, HashSet<String>>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            agents: DashMap::new(),
            skill_index: DashMap::new(),
        }
    }

    /// Use a preconfigured HTTP client for card fetches and probes.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Fetch the card at `{base_url}/.well-known/agent-card.json`, validate
    /// it and register the agent.
    ///
    /// On failure an already-registered agent keeps its stale card but is
    /// marked unreachable with the failure recorded.
    pub async fn discover(
        &self,
        base_url: &str,
        options: DiscoverOptions,
    ) -> AgentResult<AgentCard> {
        let url = normalize_url(base_url);
        match self.fetch_card(&url, &options).await {
            Ok(card) => {
                tracing::debug!(url = %url, agent = %card.name, "discovered agent");
                let tags = self
                    .agents
                    .get(&url)
                    .map(|agent| agent.tags.clone())
                    .unwrap_or_default();
                self.insert(url, card.clone(), tags);
                Ok(card)
            }
            Err(error) => {
                if let Some(mut agent) = self.agents.get_mut(&url) {
                    agent.is_reachable = false;
                    agent.last_error = Some(error.to_string());
                }
                tracing::warn!(url = %url, %error, "agent discovery failed");
                Err(error)
            }
        }
    }

    /// Register a card directly, bypassing discovery.
    pub fn register(&self, card: AgentCard, tags: Vec<String>) -> AgentResult<()> {
        card.validate()?;
        self.insert(normalize_url(&card.url), card, tags);
        Ok(())
    }

    /// Remove an agent and its skill index entries.
    pub fn unregister(&self, base_url: &str) -> bool {
        let url = normalize_url(base_url);
        self.purge_skill_entries(&url);
        self.agents.remove(&url).is_some()
    }

    /// Snapshot of one registered agent.
    pub fn get(&self, base_url: &str) -> Option<RegisteredAgent> {
        self.agents
            .get(&normalize_url(base_url))
            .map(|agent| agent.clone())
    }

    /// Snapshot of every registered agent.
    pub fn list(&self) -> Vec<RegisteredAgent> {
        self.agents.iter().map(|entry| entry.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// All agents matching every set criterion of the filter.
    pub fn find(&self, filter: &AgentFilter) -> Vec<RegisteredAgent> {
        self.agents
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.clone())
            .collect()
    }

    /// Normalized URLs of agents advertising the given skill id.
    pub fn agents_with_skill(&self, skill_id: &str) -> Vec<String> {
        self.skill_index
            .get(skill_id)
            .map(|urls| urls.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Probe the agent's card URL with a HEAD request and record the result.
    pub async fn check_reachability(&self, base_url: &str, timeout: Option<Duration>) -> bool {
        let url = normalize_url(base_url);
        let card_url = format!("{url}/{AGENT_CARD_PATH}");
        let timeout = timeout.unwrap_or(DEFAULT_REACHABILITY_TIMEOUT);

        let result = self.http.head(&card_url).timeout(timeout).send().await;
        let (reachable, error) = match result {
            Ok(response) if response.status().is_success() => (true, None),
            Ok(response) => (false, Some(format!("HTTP {}", response.status()))),
            Err(error) => (false, Some(error.to_string())),
        };
        if let Some(mut agent) = self.agents.get_mut(&url) {
            agent.is_reachable = reachable;
            agent.last_error = error;
        }
        reachable
    }

    /// Re-discover every registered agent concurrently. Each agent settles
    /// independently; one failure never aborts the rest.
    pub async fn refresh_all(&self, options: DiscoverOptions) -> HashMap<String, RefreshOutcome> {
        let urls: Vec<String> = self.agents.iter().map(|entry| entry.key().clone()).collect();
        let refreshes = urls.into_iter().map(|url| {
            let options = options.clone();
            async move {
                let outcome = match self.discover(&url, options).await {
                    Ok(_) => RefreshOutcome {
                        success: true,
                        error: None,
                    },
                    Err(error) => RefreshOutcome {
                        success: false,
                        error: Some(error.to_string()),
                    },
                };
                (url, outcome)
            }
        });
        futures::future::join_all(refreshes).await.into_iter().collect()
    }

    /// Drop all agents and the skill index.
    pub fn clear(&self) {
        self.agents.clear();
        self.skill_index.clear();
    }

    fn insert(&self, url: String, card: AgentCard, tags: Vec<String>) {
        // Purge before rebuilding so skills dropped by a newer card do not
        // linger in the index.
        self.purge_skill_entries(&url);
        for skill in &card.skills {
            self.skill_index
                .entry(skill.id.clone())
                .or_default()
                .insert(url.clone());
        }
        self.agents.insert(
            url,
            RegisteredAgent {
                card,
                last_updated: chrono::Utc::now().timestamp_millis(),
                is_reachable: true,
                last_error: None,
                tags,
            },
        );
    }

    fn purge_skill_entries(&self, url: &str) {
        self.skill_index.retain(|_, urls| {
            urls.remove(url);
            !urls.is_empty()
        });
    }

    async fn fetch_card(&self, url: &str, options: &DiscoverOptions) -> AgentResult<AgentCard> {
        let card_url = format!("{url}/{AGENT_CARD_PATH}");
        let timeout = options.timeout.unwrap_or(DEFAULT_DISCOVERY_TIMEOUT);

        let mut request = self.http.get(&card_url).timeout(timeout);
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }

        let fetch = async {
            let response = request
                .send()
                .await
                .map_err(|e| AgentError::discovery(url, e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(AgentError::discovery(url, format!("HTTP {status}")));
            }
            let card: AgentCard = response
                .json()
                .await
                .map_err(|e| AgentError::discovery(url, format!("invalid card: {e}")))?;
            card.validate()
                .map_err(|e| AgentError::discovery(url, e.to_string()))?;
            Ok(card)
        };

        match &options.cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(AgentError::discovery(url, "discovery canceled")),
                result = fetch => result,
            },
            None => fetch.await,
        }
    }
}

/// Strip trailing slashes so `http://host/` and `http://host` share a key.
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_types::AgentSkill;

    fn card(url: &str, skills: &[(&str, &str)]) -> AgentCard {
        let mut card = AgentCard::new("Agent", url, "0.3.0");
        for (id, name) in skills {
            card = card.add_skill(AgentSkill::new(*id, *name));
        }
        card
    }

    #[test]
    fn register_normalizes_trailing_slash() {
        let registry = AgentRegistry::new();
        registry
            .register(card("http://localhost:9000/", &[]), vec![])
            .unwrap();
        assert!(registry.get("http://localhost:9000").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_rejects_invalid_card() {
        let registry = AgentRegistry::new();
        let mut bad = card("http://localhost:9000", &[]);
        bad.name = String::new();
        assert!(registry.register(bad, vec![]).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn reregistration_purges_dropped_skills() {
        let registry = AgentRegistry::new();
        let url = "http://localhost:9000";
        registry
            .register(card(url, &[("research", "Research"), ("code", "Code")]), vec![])
            .unwrap();
        assert_eq!(registry.agents_with_skill("code"), vec![url.to_string()]);

        registry
            .register(card(url, &[("research", "Research")]), vec![])
            .unwrap();
        assert!(registry.agents_with_skill("code").is_empty());
        assert_eq!(registry.agents_with_skill("research"), vec![url.to_string()]);
    }

    #[test]
    fn unregister_prunes_skill_index() {
        let registry = AgentRegistry::new();
        registry
            .register(card("http://localhost:9000", &[("research", "Research")]), vec![])
            .unwrap();
        assert!(registry.unregister("http://localhost:9000/"));
        assert!(registry.agents_with_skill("research").is_empty());
        assert!(!registry.unregister("http://localhost:9000"));
    }

    #[test]
    fn find_applies_all_criteria_conjunctively() {
        let registry = AgentRegistry::new();
        registry
            .register(
                card("http://a:1", &[("research", "Web Research")])
                    .with_capability("streaming", true),
                vec!["prod".to_string()],
            )
            .unwrap();
        registry
            .register(card("http://b:1", &[("research", "Web Research")]), vec![])
            .unwrap();

        let found = registry.find(&AgentFilter {
            skill_id: Some("research".to_string()),
            capability: Some("streaming".to_string()),
            ..Default::default()
        });
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].card.url, "http://a:1");

        // Unrelated criterion knocks out both.
        let none = registry.find(&AgentFilter {
            skill_id: Some("research".to_string()),
            tags: vec!["staging".to_string()],
            ..Default::default()
        });
        assert!(none.is_empty());
    }

    #[test]
    fn find_matches_skill_name_substring_case_insensitively() {
        let registry = AgentRegistry::new();
        registry
            .register(card("http://a:1", &[("research", "Web Research")]), vec![])
            .unwrap();

        let found = registry.find(&AgentFilter {
            skill_name: Some("RESEARCH".to_string()),
            ..Default::default()
        });
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn find_skill_tags_match_any_of() {
        let registry = AgentRegistry::new();
        let skilled = AgentCard::new("Agent", "http://a:1", "0.3.0").add_skill(
            AgentSkill::new("research", "Research").with_tags(vec!["web".to_string()]),
        );
        registry.register(skilled, vec![]).unwrap();

        let found = registry.find(&AgentFilter {
            skill_tags: vec!["pdf".to_string(), "web".to_string()],
            ..Default::default()
        });
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn empty_filter_matches_everything() {
        let registry = AgentRegistry::new();
        registry.register(card("http://a:1", &[]), vec![]).unwrap();
        registry.register(card("http://b:1", &[]), vec![]).unwrap();
        assert_eq!(registry.find(&AgentFilter::default()).len(), 2);
    }

    #[test]
    fn clear_drops_agents_and_index() {
        let registry = AgentRegistry::new();
        registry
            .register(card("http://a:1", &[("research", "Research")]), vec![])
            .unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.agents_with_skill("research").is_empty());
    }

    #[tokio::test]
    async fn discovery_failure_marks_existing_agent_unreachable() {
        let registry = AgentRegistry::new();
        // Register first, then point discovery at a dead port.
        registry
            .register(card("http://127.0.0.1:1", &[("research", "Research")]), vec![])
            .unwrap();

        let result = registry
            .discover(
                "http://127.0.0.1:1",
                DiscoverOptions {
                    timeout: Some(Duration::from_millis(250)),
                    ..Default::default()
                },
            )
            .await;
        assert!(result.is_err());

        let agent = registry.get("http://127.0.0.1:1").unwrap();
        assert!(!agent.is_reachable);
        assert!(agent.last_error.is_some());
        // The stale card survives.
        assert!(agent.card.has_skill("research"));
    }
}
