//! Client for the generative ranking engine. The engine is asked for JSON
//! and whatever it returns is checked against the candidate pool before it
//! reaches a caller.

use std::collections::HashSet;
use std::time::Duration;

use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::Config;
use crate::error::ServiceError;
use crate::models::{UserProfile, TEAM_SIZE_LIMIT};
use crate::registry::Registry;

/// How many teammates a seeker is offered at most.
pub const MAX_SUGGESTIONS: usize = 3;
const ENGINE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no API key configured for the ranking engine")]
    MissingApiKey,
    #[error("request to ranking engine failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("ranking engine returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("ranking engine response carried no text")]
    MissingText,
    #[error("ranking engine returned malformed JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

impl EngineError {
    /// Logs the cause and hides it behind a generic message for clients.
    pub fn into_service_error(self, message: &str) -> ServiceError {
        error!("Ranking engine failure: {}", self);
        ServiceError::Upstream(message.to_string())
    }
}

/// One ranked candidate as the engine reports it.
#[derive(Debug, Deserialize)]
struct RankedCandidate {
    user_id: String,
    #[serde(default)]
    justification: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MatchSuggestion {
    pub user: UserProfile,
    pub justification: String,
}

pub struct MatchEngine {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl MatchEngine {
    pub fn new(config: &Config) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(ENGINE_TIMEOUT_SECS))
            .build()?;
        Ok(MatchEngine {
            client,
            endpoint: config.ai_endpoint.trim_end_matches('/').to_string(),
            api_key: config.ai_api_key.clone(),
            model: config.ai_model.clone(),
        })
    }

    /// Asks the engine for the best teammates for `seeker` out of `pool`.
    pub async fn suggest_matches(
        &self,
        seeker: &UserProfile,
        pool: &[UserProfile],
    ) -> Result<Vec<MatchSuggestion>, EngineError> {
        if pool.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = format!(
            "You are an expert team builder for hackathons. Find the best teammates for a participant \
             based on skill synergy, shared interests and complementary project ideas. Teams hold at \
             most {limit} people.\n\nParticipant seeking a team:\n{seeker}\n\nAvailable participants:\n{pool}\n\n\
             Return the top {count} matches. For each, give the exact user_id from the list and a \
             one-sentence justification. Never return the seeker.",
            limit = TEAM_SIZE_LIMIT,
            seeker = serde_json::to_string(seeker)?,
            pool = serde_json::to_string(pool)?,
            count = MAX_SUGGESTIONS,
        );
        let schema = json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "user_id": { "type": "STRING" },
                    "justification": { "type": "STRING" }
                },
                "required": ["user_id", "justification"]
            }
        });

        let text = self.generate(&prompt, schema).await?;
        let ranked: Vec<RankedCandidate> = serde_json::from_str(text.trim())?;
        debug!("Engine ranked {} candidates for {}", ranked.len(), seeker.user_id);
        Ok(retain_known_candidates(&seeker.user_id, pool, ranked))
    }

    pub async fn project_ideas(&self, skills: &[String], interests: &str) -> Result<Vec<String>, EngineError> {
        let prompt = format!(
            "You are an expert hackathon mentor. A student has the skills \"{}\" and interests \"{}\". \
             Generate 3 concise and innovative hackathon project ideas. Respond with a JSON array of strings.",
            skills.join(", "),
            interests
        );
        let schema = json!({ "type": "ARRAY", "items": { "type": "STRING" } });

        let text = self.generate(&prompt, schema).await?;
        let ideas: Vec<String> = serde_json::from_str(text.trim())?;
        Ok(ideas.into_iter().filter(|idea| !idea.trim().is_empty()).collect())
    }

    /// One `generateContent` round trip. Single attempt, no retries.
    async fn generate(&self, prompt: &str, schema: Value) -> Result<String, EngineError> {
        let api_key = self.api_key.as_deref().ok_or(EngineError::MissingApiKey)?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model);
        let body = json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema
            }
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read error: {e}>"));
            return Err(EngineError::Status { status, body });
        }

        let json: Value = response.json().await?;
        json["candidates"]
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|candidate| candidate["content"]["parts"].as_array())
            .and_then(|parts| parts.first())
            .and_then(|part| part["text"].as_str())
            .map(str::to_string)
            .ok_or(EngineError::MissingText)
    }
}

/// Users `seeker_id` may be matched with: open to teams, not the seeker,
/// and not already on the seeker's team.
pub fn candidate_pool(registry: &Registry, seeker_id: &str) -> Vec<UserProfile> {
    let seeker_team = registry.user(seeker_id).and_then(|u| u.team_id.clone());
    registry
        .profiles()
        .into_iter()
        .filter(|p| p.user_id != seeker_id && p.is_open_to_teams)
        .filter(|p| seeker_team.is_none() || p.team_id != seeker_team)
        .collect()
}

/// Resolves engine output against the pool. Unknown ids, the seeker and
/// repeats are dropped; at most [`MAX_SUGGESTIONS`] survive.
fn retain_known_candidates(
    seeker_id: &str,
    pool: &[UserProfile],
    ranked: Vec<RankedCandidate>,
) -> Vec<MatchSuggestion> {
    let mut seen = HashSet::new();
    ranked
        .into_iter()
        .filter(|c| c.user_id != seeker_id)
        .filter_map(|c| {
            let user = pool.iter().find(|p| p.user_id == c.user_id)?;
            if !seen.insert(c.user_id) {
                return None;
            }
            Some(MatchSuggestion {
                user: user.clone(),
                justification: c.justification,
            })
        })
        .take(MAX_SUGGESTIONS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::test_support::add_user;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine_reply(text: &str) -> Value {
        json!({
            "candidates": [
                { "content": { "parts": [{ "text": text }] } }
            ]
        })
    }

    fn profiles(registry: &Registry, ids: &[&String]) -> Vec<UserProfile> {
        ids.iter()
            .map(|id| UserProfile::from(registry.user(id).unwrap()))
            .collect()
    }

    #[test]
    fn pool_excludes_seeker_closed_users_and_teammates() {
        let mut registry = Registry::new();
        let seeker = add_user(&mut registry, "Seeker");
        let teammate = add_user(&mut registry, "Teammate");
        let closed = add_user(&mut registry, "Closed");
        let open = add_user(&mut registry, "Open");
        let team = registry.create_team("Alpha", &seeker).unwrap();
        registry.join_team(&teammate, &team.team_id).unwrap();
        registry
            .update_profile(
                &closed,
                crate::registry::ProfilePatch {
                    is_open_to_teams: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        let pool = candidate_pool(&registry, &seeker);
        let ids: Vec<&str> = pool.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, vec![open.as_str()]);
    }

    #[test]
    fn unknown_self_and_repeated_ids_are_dropped() {
        let mut registry = Registry::new();
        let seeker = add_user(&mut registry, "Seeker");
        let a = add_user(&mut registry, "A");
        let b = add_user(&mut registry, "B");
        let pool = profiles(&registry, &[&a, &b]);

        let ranked = vec![
            RankedCandidate { user_id: "ghost".into(), justification: "?".into() },
            RankedCandidate { user_id: seeker.clone(), justification: "me".into() },
            RankedCandidate { user_id: b.clone(), justification: "good".into() },
            RankedCandidate { user_id: b.clone(), justification: "again".into() },
            RankedCandidate { user_id: a.clone(), justification: "fine".into() },
        ];
        let kept = retain_known_candidates(&seeker, &pool, ranked);

        let ids: Vec<&str> = kept.iter().map(|m| m.user.user_id.as_str()).collect();
        assert_eq!(ids, vec![b.as_str(), a.as_str()]);
        assert_eq!(kept[0].justification, "good");
    }

    #[test]
    fn at_most_three_suggestions_survive() {
        let mut registry = Registry::new();
        let seeker = add_user(&mut registry, "Seeker");
        let ids: Vec<String> = (0..5).map(|i| add_user(&mut registry, &format!("C{}", i))).collect();
        let refs: Vec<&String> = ids.iter().collect();
        let pool = profiles(&registry, &refs);

        let ranked = ids
            .iter()
            .map(|id| RankedCandidate { user_id: id.clone(), justification: String::new() })
            .collect();
        assert_eq!(retain_known_candidates(&seeker, &pool, ranked).len(), MAX_SUGGESTIONS);
    }

    #[tokio::test]
    async fn suggestions_come_from_the_engine_reply() {
        let server = MockServer::start().await;
        let mut registry = Registry::new();
        let seeker = add_user(&mut registry, "Seeker");
        let a = add_user(&mut registry, "A");
        let pool = profiles(&registry, &[&a]);
        let seeker_profile = UserProfile::from(registry.user(&seeker).unwrap());

        let text = json!([{ "user_id": a, "justification": "Strong backend skills" }]).to_string();
        Mock::given(method("POST"))
            .and(path("/v1beta/models/test-model:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(engine_reply(&text)))
            .expect(1)
            .mount(&server)
            .await;

        let engine = MatchEngine::new(&Config::for_tests(&server.uri())).unwrap();
        let matches = engine.suggest_matches(&seeker_profile, &pool).await.unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].user.user_id, a);
        assert_eq!(matches[0].justification, "Strong backend skills");
    }

    #[tokio::test]
    async fn engine_outage_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&server)
            .await;

        let engine = MatchEngine::new(&Config::for_tests(&server.uri())).unwrap();
        let err = engine.project_ideas(&["Rust".to_string()], "climate").await.unwrap_err();
        assert!(matches!(err, EngineError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn malformed_engine_text_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(engine_reply("not json")))
            .mount(&server)
            .await;

        let engine = MatchEngine::new(&Config::for_tests(&server.uri())).unwrap();
        let err = engine.project_ideas(&[], "").await.unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
    }

    #[tokio::test]
    async fn empty_pool_skips_the_engine() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mut registry = Registry::new();
        let seeker = add_user(&mut registry, "Seeker");
        let seeker_profile = UserProfile::from(registry.user(&seeker).unwrap());
        let engine = MatchEngine::new(&Config::for_tests(&server.uri())).unwrap();

        assert!(engine.suggest_matches(&seeker_profile, &[]).await.unwrap().is_empty());
    }
}
