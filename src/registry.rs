//! Indexed in-memory state shared by the membership coordinator and the
//! reconciler. Mutations record what they touched in a [`Changeset`] so the
//! store can write exactly those records through to MongoDB.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use uuid::Uuid;

use crate::error::MembershipError;
use crate::models::{Notification, Team, TeamRole, User, UserProfile};

/// Ids of the records touched since the journal was last drained.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Changeset {
    pub users: HashSet<String>,
    pub teams: HashSet<String>,
    pub removed_teams: HashSet<String>,
    pub notifications: HashSet<String>,
    pub removed_notifications: HashSet<String>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.teams.is_empty()
            && self.removed_teams.is_empty()
            && self.notifications.is_empty()
            && self.removed_notifications.is_empty()
    }
}

/// Fields accepted when a new account is created.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
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
}

/// Partial profile update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub major: Option<String>,
    pub academic_year: Option<String>,
    pub skills: Option<Vec<String>>,
    pub interests: Option<String>,
    pub project_idea: Option<String>,
    pub avatar_url: Option<String>,
    pub is_open_to_teams: Option<bool>,
}

#[derive(Debug, Default, Clone)]
pub struct Registry {
    pub(crate) users: HashMap<String, User>,
    pub(crate) teams: HashMap<String, Team>,
    pub(crate) notifications: HashMap<String, Notification>,
    journal: Changeset,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a registry from persisted records without journaling them.
    pub fn from_records(users: Vec<User>, teams: Vec<Team>, notifications: Vec<Notification>) -> Self {
        Registry {
            users: users.into_iter().map(|u| (u.user_id.clone(), u)).collect(),
            teams: teams.into_iter().map(|t| (t.team_id.clone(), t)).collect(),
            notifications: notifications
                .into_iter()
                .map(|n| (n.notification_id.clone(), n))
                .collect(),
            journal: Changeset::default(),
        }
    }

    pub fn take_changes(&mut self) -> Changeset {
        std::mem::take(&mut self.journal)
    }

    // ─── LOOKUPS ──────────────────────────────────────────────────────────────

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn team(&self, team_id: &str) -> Option<&Team> {
        self.teams.get(team_id)
    }

    pub fn notification(&self, notification_id: &str) -> Option<&Notification> {
        self.notifications.get(notification_id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<&User> {
        let email = email.trim();
        self.users.values().find(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub fn require_user(&self, user_id: &str) -> Result<&User, MembershipError> {
        self.users
            .get(user_id)
            .ok_or_else(|| MembershipError::UserNotFound(user_id.to_string()))
    }

    pub fn require_team(&self, team_id: &str) -> Result<&Team, MembershipError> {
        self.teams
            .get(team_id)
            .ok_or_else(|| MembershipError::TeamNotFound(team_id.to_string()))
    }

    pub fn require_notification(&self, notification_id: &str) -> Result<&Notification, MembershipError> {
        self.notifications
            .get(notification_id)
            .ok_or_else(|| MembershipError::NotificationNotFound(notification_id.to_string()))
    }

    /// All profiles, sorted by name for stable listings.
    pub fn profiles(&self) -> Vec<UserProfile> {
        let mut profiles: Vec<UserProfile> = self.users.values().map(UserProfile::from).collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.user_id.cmp(&b.user_id)));
        profiles
    }

    /// The team a user currently belongs to, with their role in it.
    pub fn team_of(&self, user_id: &str) -> Option<(&Team, TeamRole)> {
        let team_id = self.users.get(user_id)?.team_id.as_deref()?;
        let team = self.teams.get(team_id)?;
        team.role_of(user_id).map(|role| (team, role))
    }

    pub fn members_of(&self, team: &Team) -> Vec<UserProfile> {
        team.member_ids
            .iter()
            .filter_map(|id| self.users.get(id))
            .map(UserProfile::from)
            .collect()
    }

    /// Pending records the user has to answer, oldest first.
    pub fn pending_for(&self, user_id: &str) -> Vec<&Notification> {
        let mut pending: Vec<&Notification> = self
            .notifications
            .values()
            .filter(|n| n.to_user_id == user_id)
            .collect();
        pending.sort_by_key(|n| n.created_at);
        pending
    }

    // ─── USERS ────────────────────────────────────────────────────────────────

    pub fn register_user(&mut self, new_user: NewUser) -> Result<User, MembershipError> {
        if self.find_user_by_email(&new_user.email).is_some() {
            return Err(MembershipError::EmailTaken);
        }

        let user = User {
            user_id: Uuid::new_v4().to_string(),
            email: new_user.email.trim().to_string(),
            password_hash: new_user.password_hash,
            name: new_user.name.trim().to_string(),
            major: new_user.major,
            academic_year: new_user.academic_year,
            skills: new_user.skills,
            interests: new_user.interests,
            project_idea: new_user.project_idea,
            avatar_url: new_user.avatar_url,
            is_open_to_teams: new_user.is_open_to_teams,
            team_id: None,
            created_at: Utc::now(),
        };
        self.put_user(user.clone());
        Ok(user)
    }

    pub fn update_profile(&mut self, user_id: &str, patch: ProfilePatch) -> Result<User, MembershipError> {
        let mut user = self.require_user(user_id)?.clone();
        if let Some(name) = patch.name {
            user.name = name.trim().to_string();
        }
        if let Some(major) = patch.major {
            user.major = major;
        }
        if let Some(academic_year) = patch.academic_year {
            user.academic_year = academic_year;
        }
        if let Some(skills) = patch.skills {
            user.skills = skills;
        }
        if let Some(interests) = patch.interests {
            user.interests = interests;
        }
        if let Some(project_idea) = patch.project_idea {
            user.project_idea = project_idea;
        }
        if let Some(avatar_url) = patch.avatar_url {
            user.avatar_url = Some(avatar_url).filter(|url| !url.is_empty());
        }
        if let Some(open) = patch.is_open_to_teams {
            user.is_open_to_teams = open;
        }
        self.put_user(user.clone());
        Ok(user)
    }

    // ─── JOURNALED WRITES ─────────────────────────────────────────────────────

    pub(crate) fn put_user(&mut self, user: User) {
        self.journal.users.insert(user.user_id.clone());
        self.users.insert(user.user_id.clone(), user);
    }

    pub(crate) fn set_team_pointer(&mut self, user_id: &str, team_id: Option<&str>) {
        if let Some(user) = self.users.get_mut(user_id) {
            user.team_id = team_id.map(str::to_string);
            self.journal.users.insert(user_id.to_string());
        }
    }

    pub(crate) fn put_team(&mut self, team: Team) {
        self.journal.removed_teams.remove(&team.team_id);
        self.journal.teams.insert(team.team_id.clone());
        self.teams.insert(team.team_id.clone(), team);
    }

    pub(crate) fn drop_team(&mut self, team_id: &str) -> Option<Team> {
        let removed = self.teams.remove(team_id);
        if removed.is_some() {
            self.journal.teams.remove(team_id);
            self.journal.removed_teams.insert(team_id.to_string());
        }
        removed
    }

    pub(crate) fn put_notification(&mut self, notification: Notification) {
        self.journal.notifications.insert(notification.notification_id.clone());
        self.notifications
            .insert(notification.notification_id.clone(), notification);
    }

    pub(crate) fn drop_notification(&mut self, notification_id: &str) -> Option<Notification> {
        let removed = self.notifications.remove(notification_id);
        if removed.is_some() {
            self.journal.notifications.remove(notification_id);
            self.journal.removed_notifications.insert(notification_id.to_string());
        }
        removed
    }

    /// Deletes every notification matching `predicate`, returning how many went.
    pub(crate) fn purge_notifications<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Notification) -> bool,
    {
        let doomed: Vec<String> = self
            .notifications
            .values()
            .filter(|n| predicate(n))
            .map(|n| n.notification_id.clone())
            .collect();
        for id in &doomed {
            self.drop_notification(id);
        }
        doomed.len()
    }

    /// Checks every cross-record invariant. Used by tests after each step.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        use crate::models::TEAM_SIZE_LIMIT;

        for team in self.teams.values() {
            let size = team.member_ids.len();
            if size == 0 || size > TEAM_SIZE_LIMIT {
                return Err(format!("team {} has {} members", team.team_id, size));
            }
            if !team.has_member(&team.leader_id) {
                return Err(format!("leader of {} is not a member", team.team_id));
            }
            let unique: HashSet<&String> = team.member_ids.iter().collect();
            if unique.len() != size {
                return Err(format!("team {} has duplicate members", team.team_id));
            }
            for member in &team.member_ids {
                let pointer = self.users.get(member).and_then(|u| u.team_id.as_deref());
                if pointer != Some(team.team_id.as_str()) {
                    return Err(format!("member {} of {} points elsewhere", member, team.team_id));
                }
            }
        }
        for user in self.users.values() {
            if let Some(team_id) = &user.team_id {
                match self.teams.get(team_id) {
                    Some(team) if team.has_member(&user.user_id) => {}
                    _ => return Err(format!("user {} points at {} without membership", user.user_id, team_id)),
                }
            }
        }
        for n in self.notifications.values() {
            if !self.teams.contains_key(&n.team_id) {
                return Err(format!("notification {} references missing team", n.notification_id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Registers a user with a throwaway hash and returns their id.
    pub fn add_user(registry: &mut Registry, name: &str) -> String {
        registry
            .register_user(NewUser {
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: "x".to_string(),
                name: name.to_string(),
                major: "Computer Science".to_string(),
                academic_year: "Junior".to_string(),
                is_open_to_teams: true,
                ..NewUser::default()
            })
            .map(|u| u.user_id)
            .expect("register test user")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::add_user;
    use super::*;

    #[test]
    fn duplicate_email_is_rejected_case_insensitively() {
        let mut registry = Registry::new();
        add_user(&mut registry, "Elena");
        let err = registry
            .register_user(NewUser {
                email: "ELENA@example.com".to_string(),
                name: "Other".to_string(),
                ..NewUser::default()
            })
            .unwrap_err();
        assert_eq!(err, MembershipError::EmailTaken);
    }

    #[test]
    fn profile_patch_leaves_unset_fields_alone() {
        let mut registry = Registry::new();
        let id = add_user(&mut registry, "Ben");
        let updated = registry
            .update_profile(
                &id,
                ProfilePatch {
                    skills: Some(vec!["Arduino".to_string()]),
                    is_open_to_teams: Some(false),
                    ..ProfilePatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Ben");
        assert_eq!(updated.major, "Computer Science");
        assert_eq!(updated.skills, vec!["Arduino".to_string()]);
        assert!(!updated.is_open_to_teams);
    }

    #[test]
    fn journal_tracks_touched_records_and_drains() {
        let mut registry = Registry::new();
        let id = add_user(&mut registry, "Aisha");
        let changes = registry.take_changes();
        assert!(changes.users.contains(&id));
        assert!(registry.take_changes().is_empty());
    }
}
