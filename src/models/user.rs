use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered participant, as stored.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub major: String,
    pub academic_year: String,
    pub skills: Vec<String>,
    pub interests: String,
    pub project_idea: String,
    pub avatar_url: Option<String>,
    pub is_open_to_teams: bool,
    /// Current team. Kept in sync with the roster of that team.
    pub team_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The public shape of a user. Never carries the password hash.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub major: String,
    pub academic_year: String,
    pub skills: Vec<String>,
    pub interests: String,
    pub project_idea: String,
    pub avatar_url: Option<String>,
    pub is_open_to_teams: bool,
    pub team_id: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            user_id: user.user_id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            major: user.major.clone(),
            academic_year: user.academic_year.clone(),
            skills: user.skills.clone(),
            interests: user.interests.clone(),
            project_idea: user.project_idea.clone(),
            avatar_url: user.avatar_url.clone(),
            is_open_to_teams: user.is_open_to_teams,
            team_id: user.team_id.clone(),
        }
    }
}

/// Skills as sent by clients: either a list or one comma-separated string.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum SkillsInput {
    List(Vec<String>),
    Text(String),
}

impl SkillsInput {
    pub fn into_skills(self) -> Vec<String> {
        match self {
            SkillsInput::List(list) => list
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            SkillsInput::Text(text) => parse_skills(&text),
        }
    }
}

impl Default for SkillsInput {
    fn default() -> Self {
        SkillsInput::List(Vec::new())
    }
}

/// Splits a comma-separated skill list, dropping blanks.
pub fn parse_skills(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
