//! Team membership coordinator: a user belongs to at most one team, and
//! team lifecycle changes cascade to every member's team pointer.

use chrono::Utc;
use log::{debug, info};
use uuid::Uuid;

use crate::error::MembershipError;
use crate::models::{NotificationKind, Team, TEAM_SIZE_LIMIT};
use crate::registry::Registry;

impl Registry {
    /// Creates a team led by `leader_id`, who must not already be on a team.
    pub fn create_team(&mut self, name: &str, leader_id: &str) -> Result<Team, MembershipError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MembershipError::EmptyTeamName);
        }
        let leader = self.require_user(leader_id)?;
        if leader.team_id.is_some() {
            return Err(MembershipError::AlreadyOnTeam);
        }

        let team = Team {
            team_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            leader_id: leader_id.to_string(),
            member_ids: vec![leader_id.to_string()],
            created_at: Utc::now(),
        };
        self.put_team(team.clone());
        self.set_team_pointer(leader_id, Some(&team.team_id));
        // Requests sent before leading a team carry no disband confirmation.
        let retracted = self.purge_notifications(|n| {
            n.kind == NotificationKind::Request && n.from_user_id == leader_id
        });

        info!("Team {} created by {} ({} join requests retracted)", team.team_id, leader_id, retracted);
        Ok(team)
    }

    /// Leader-initiated disbandment.
    pub fn delete_team(&mut self, team_id: &str, requester_id: &str) -> Result<Team, MembershipError> {
        let team = self.require_team(team_id)?;
        if team.leader_id != requester_id {
            return Err(MembershipError::NotLeader);
        }
        self.disband(team_id)
    }

    /// Removes `user_id` from the team on the leader's behalf.
    pub fn remove_member(
        &mut self,
        team_id: &str,
        requester_id: &str,
        user_id: &str,
    ) -> Result<Team, MembershipError> {
        let team = self.require_team(team_id)?;
        if team.leader_id != requester_id {
            return Err(MembershipError::NotLeader);
        }
        if team.leader_id == user_id {
            return Err(MembershipError::CannotRemoveLeader);
        }
        if !team.has_member(user_id) {
            return Err(MembershipError::NotMember);
        }

        let mut team = team.clone();
        team.member_ids.retain(|id| id != user_id);
        self.set_team_pointer(user_id, None);
        self.put_team(team.clone());

        info!("User {} removed from team {} by {}", user_id, team_id, requester_id);
        Ok(team)
    }

    /// Voluntary departure. Returns the shrunk team, or `None` if it emptied
    /// out and was disbanded.
    pub fn leave_team(&mut self, team_id: &str, user_id: &str) -> Result<Option<Team>, MembershipError> {
        let team = self.require_team(team_id)?;
        if !team.has_member(user_id) {
            return Err(MembershipError::NotMember);
        }
        if team.leader_id == user_id {
            return Err(MembershipError::LeaderCannotLeave);
        }
        let remaining = self.detach(team_id, user_id)?;
        info!("User {} left team {}", user_id, team_id);
        Ok(remaining)
    }

    /// Deletes the team, clears every member's pointer and drops pending
    /// notifications that reference it.
    pub(crate) fn disband(&mut self, team_id: &str) -> Result<Team, MembershipError> {
        let team = self
            .drop_team(team_id)
            .ok_or_else(|| MembershipError::TeamNotFound(team_id.to_string()))?;
        for member in &team.member_ids {
            self.set_team_pointer(member, None);
        }
        let purged = self.purge_notifications(|n| n.team_id == team_id);

        info!(
            "Team {} disbanded ({} members released, {} notifications dropped)",
            team_id,
            team.member_ids.len(),
            purged
        );
        Ok(team)
    }

    /// Detaches a user from the team they are about to leave for another one.
    /// A leader takes the whole team down with them.
    pub(crate) fn transfer_out(&mut self, user_id: &str, from_team_id: &str) -> Result<(), MembershipError> {
        let team = self.require_team(from_team_id)?;
        if team.leader_id == user_id {
            debug!("Leader {} transferring out, disbanding {}", user_id, from_team_id);
            self.disband(from_team_id)?;
        } else {
            self.detach(from_team_id, user_id)?;
        }
        Ok(())
    }

    /// Appends `user_id` to the roster. The capacity check and the append
    /// happen under the same exclusive borrow.
    pub(crate) fn join_team(&mut self, user_id: &str, team_id: &str) -> Result<Team, MembershipError> {
        self.require_user(user_id)?;
        let team = self
            .teams
            .get_mut(team_id)
            .ok_or_else(|| MembershipError::TeamNotFound(team_id.to_string()))?;
        if team.has_member(user_id) {
            return Err(MembershipError::AlreadyMember);
        }
        if team.member_ids.len() >= TEAM_SIZE_LIMIT {
            return Err(MembershipError::TeamFull);
        }
        team.member_ids.push(user_id.to_string());
        let team = team.clone();

        self.put_team(team.clone());
        self.set_team_pointer(user_id, Some(team_id));
        Ok(team)
    }

    fn detach(&mut self, team_id: &str, user_id: &str) -> Result<Option<Team>, MembershipError> {
        let mut team = self.require_team(team_id)?.clone();
        team.member_ids.retain(|id| id != user_id);
        self.set_team_pointer(user_id, None);

        if team.member_ids.is_empty() {
            self.disband(team_id)?;
            return Ok(None);
        }
        self.put_team(team.clone());
        Ok(Some(team))
    }
}
