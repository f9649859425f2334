//! Invite/request reconciler: pending cross-team transactions and their
//! resolution. Acceptance is the only operation that moves people between
//! teams, and it runs as one unit against the registry.

use log::{debug, info};
use serde::Serialize;

use crate::error::MembershipError;
use crate::models::{Notification, NotificationKind, Team};
use crate::registry::Registry;

/// What a successful acceptance changed.
#[derive(Debug, Clone, Serialize)]
pub struct Acceptance {
    pub team: Team,
    pub joined_user_id: String,
    /// Team the joining user led and which was disbanded on the way out.
    pub disbanded_team_id: Option<String>,
    /// Notifications retracted as a side effect, the accepted one excluded.
    pub retracted: usize,
}

impl Registry {
    /// Records an invite from the team's leader. Returns `None` when an
    /// identical invite is already pending.
    pub fn create_invite(
        &mut self,
        team_id: &str,
        from_leader_id: &str,
        candidate_id: &str,
    ) -> Result<Option<Notification>, MembershipError> {
        let team = self.require_team(team_id)?;
        if team.leader_id != from_leader_id {
            return Err(MembershipError::NotLeader);
        }
        self.require_user(candidate_id)?;
        if team.has_member(candidate_id) {
            return Err(MembershipError::AlreadyMember);
        }
        if team.is_full() {
            return Err(MembershipError::TeamFull);
        }

        let duplicate = self.notifications.values().any(|n| {
            n.kind == NotificationKind::Invite && n.team_id == team_id && n.to_user_id == candidate_id
        });
        if duplicate {
            debug!("Invite for {} to team {} already pending", candidate_id, team_id);
            return Ok(None);
        }

        let invite = Notification::new(NotificationKind::Invite, team_id, from_leader_id, candidate_id);
        self.put_notification(invite.clone());
        info!("Invite {} sent to {} for team {}", invite.notification_id, candidate_id, team_id);
        Ok(Some(invite))
    }

    /// Records a request to join, addressed to the team's leader. Returns
    /// `None` when an identical request is already pending.
    ///
    /// A candidate who leads another team confirms here, with `force`, that
    /// their team goes away if the leader accepts.
    pub fn create_join_request(
        &mut self,
        candidate_id: &str,
        team_id: &str,
        force: bool,
    ) -> Result<Option<Notification>, MembershipError> {
        self.require_user(candidate_id)?;
        let team = self.require_team(team_id)?;
        if team.has_member(candidate_id) {
            return Err(MembershipError::AlreadyMember);
        }
        if team.is_full() {
            return Err(MembershipError::TeamFull);
        }

        let duplicate = self.notifications.values().any(|n| {
            n.kind == NotificationKind::Request && n.team_id == team_id && n.from_user_id == candidate_id
        });
        if duplicate {
            debug!("Request from {} to team {} already pending", candidate_id, team_id);
            return Ok(None);
        }
        if !force && self.leads_other_team(candidate_id, team_id) {
            return Err(MembershipError::ConfirmationRequired);
        }

        let request = Notification::new(NotificationKind::Request, team_id, candidate_id, &team.leader_id);
        self.put_notification(request.clone());
        info!("Join request {} from {} to team {}", request.notification_id, candidate_id, team_id);
        Ok(Some(request))
    }

    /// Deletes a pending record. The addressee declines it; the sender may
    /// retract it. Nothing else changes.
    pub fn decline_notification(
        &mut self,
        notification_id: &str,
        actor_id: &str,
    ) -> Result<Notification, MembershipError> {
        let notification = self.require_notification(notification_id)?;
        if notification.to_user_id != actor_id && notification.from_user_id != actor_id {
            return Err(MembershipError::NotAddressee);
        }
        let declined = self
            .drop_notification(notification_id)
            .ok_or_else(|| MembershipError::NotificationNotFound(notification_id.to_string()))?;
        info!("Notification {} declined by {}", notification_id, actor_id);
        Ok(declined)
    }

    /// True when accepting would disband a team the acceptor leads. Only an
    /// invitee can be in that position; a requester confirmed when asking.
    pub fn requires_disband_confirmation(&self, notification_id: &str) -> Result<bool, MembershipError> {
        let notification = self.require_notification(notification_id)?;
        Ok(notification.kind == NotificationKind::Invite
            && self.leads_other_team(&notification.to_user_id, &notification.team_id))
    }

    /// Accepts an invite (as the invitee) or a join request (as the leader).
    ///
    /// Order: resolve parties, check capacity and the confirmation gate
    /// (invitees only), transfer the joining user out of any current team,
    /// append them, delete the accepted record, retract every other invite to
    /// and request from the joining user, and if the team is now full drop
    /// every other pending record for it.
    pub fn resolve_acceptance(
        &mut self,
        notification_id: &str,
        actor_id: &str,
        force: bool,
    ) -> Result<Acceptance, MembershipError> {
        let notification = self.require_notification(notification_id)?.clone();
        if notification.to_user_id != actor_id {
            return Err(MembershipError::NotAddressee);
        }

        let joining_id = notification.joining_user_id().to_string();
        let team_id = notification.team_id.clone();
        let joining = self.require_user(&joining_id)?;
        let destination = self.require_team(&team_id)?;
        if destination.has_member(&joining_id) {
            return Err(MembershipError::AlreadyMember);
        }
        if destination.is_full() {
            return Err(MembershipError::TeamFull);
        }

        let current_team_id = joining.team_id.clone();
        let mut disbanded_team_id = None;
        if let Some(current) = current_team_id.as_deref() {
            if self.leads_other_team(&joining_id, &team_id) {
                if joining_id == actor_id && !force {
                    return Err(MembershipError::ConfirmationRequired);
                }
                disbanded_team_id = Some(current.to_string());
            }
            self.transfer_out(&joining_id, current)?;
        }

        let team = self.join_team(&joining_id, &team_id)?;
        self.drop_notification(notification_id);

        let mut retracted = self.purge_notifications(|n| n.concerns_candidate(&joining_id));
        if team.is_full() {
            retracted += self.purge_notifications(|n| n.team_id == team_id);
        }

        info!(
            "User {} joined team {} via notification {} ({} other notifications retracted)",
            joining_id, team_id, notification_id, retracted
        );
        Ok(Acceptance {
            team,
            joined_user_id: joining_id,
            disbanded_team_id,
            retracted,
        })
    }

    fn leads_other_team(&self, user_id: &str, destination_team_id: &str) -> bool {
        self.team_of(user_id)
            .map(|(team, _)| team.leader_id == user_id && team.team_id != destination_team_id)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::test_support::add_user;

    struct Fixture {
        registry: Registry,
        users: Vec<String>,
    }

    impl Fixture {
        fn new(count: usize) -> Self {
            let mut registry = Registry::new();
            let users = (1..=count)
                .map(|i| add_user(&mut registry, &format!("U{}", i)))
                .collect();
            Fixture { registry, users }
        }

        fn user(&self, n: usize) -> String {
            self.users[n - 1].clone()
        }

        fn team(&mut self, leader: usize, members: &[usize]) -> String {
            let leader_id = self.user(leader);
            let team_id = self.registry.create_team("Team", &leader_id).unwrap().team_id;
            for &m in members {
                let member = self.user(m);
                self.registry.join_team(&member, &team_id).unwrap();
            }
            team_id
        }

        fn members(&self, team_id: &str) -> Vec<String> {
            self.registry.team(team_id).unwrap().member_ids.clone()
        }
    }

    #[test]
    fn duplicate_invite_is_a_no_op() {
        let mut f = Fixture::new(2);
        let a = f.team(1, &[]);
        let (u1, u2) = (f.user(1), f.user(2));

        assert!(f.registry.create_invite(&a, &u1, &u2).unwrap().is_some());
        assert!(f.registry.create_invite(&a, &u1, &u2).unwrap().is_none());
        assert_eq!(f.registry.pending_for(&u2).len(), 1);
    }

    #[test]
    fn duplicate_join_request_is_a_no_op() {
        let mut f = Fixture::new(2);
        let a = f.team(1, &[]);
        let (u1, u2) = (f.user(1), f.user(2));

        let request = f.registry.create_join_request(&u2, &a, false).unwrap().unwrap();
        assert_eq!(request.to_user_id, u1);
        assert!(f.registry.create_join_request(&u2, &a, false).unwrap().is_none());
        assert_eq!(f.registry.pending_for(&u1).len(), 1);
    }

    #[test]
    fn invite_requires_leader_and_room() {
        let mut f = Fixture::new(6);
        let a = f.team(1, &[2, 3, 4]);
        let (u2, u1, u5) = (f.user(2), f.user(1), f.user(5));

        assert_eq!(f.registry.create_invite(&a, &u2, &u5).unwrap_err(), MembershipError::NotLeader);
        assert_eq!(f.registry.create_invite(&a, &u1, &u5).unwrap_err(), MembershipError::TeamFull);
        assert_eq!(f.registry.create_invite(&a, &u1, &u2).unwrap_err(), MembershipError::AlreadyMember);
        assert_eq!(f.registry.create_join_request(&u5, &a, false).unwrap_err(), MembershipError::TeamFull);
    }

    #[test]
    fn user_may_hold_pending_records_across_teams() {
        let mut f = Fixture::new(3);
        let a = f.team(1, &[]);
        let b = f.team(2, &[]);
        let u3 = f.user(3);

        f.registry.create_join_request(&u3, &a, false).unwrap().unwrap();
        f.registry.create_join_request(&u3, &b, false).unwrap().unwrap();
        assert_eq!(f.registry.notifications.len(), 2);
    }

    #[test]
    fn decline_only_deletes_the_record() {
        let mut f = Fixture::new(3);
        let a = f.team(1, &[]);
        let (u1, u2, u3) = (f.user(1), f.user(2), f.user(3));
        let invite = f.registry.create_invite(&a, &u1, &u2).unwrap().unwrap();

        assert_eq!(
            f.registry.decline_notification(&invite.notification_id, &u3).unwrap_err(),
            MembershipError::NotAddressee
        );
        f.registry.decline_notification(&invite.notification_id, &u2).unwrap();

        assert!(f.registry.notifications.is_empty());
        assert_eq!(f.members(&a), vec![u1]);
        assert!(f.registry.user(&u2).unwrap().team_id.is_none());
    }

    #[test]
    fn sender_may_retract() {
        let mut f = Fixture::new(2);
        let a = f.team(1, &[]);
        let u2 = f.user(2);
        let request = f.registry.create_join_request(&u2, &a, false).unwrap().unwrap();

        f.registry.decline_notification(&request.notification_id, &u2).unwrap();
        assert!(f.registry.notifications.is_empty());
    }

    // Team A (leader U1, members U1, U2) has a request from U3; U1 accepts.
    #[test]
    fn leader_accepts_join_request_with_room() {
        let mut f = Fixture::new(4);
        let a = f.team(1, &[2]);
        let b = f.team(4, &[]);
        let (u1, u2, u3) = (f.user(1), f.user(2), f.user(3));
        let request = f.registry.create_join_request(&u3, &a, false).unwrap().unwrap();
        f.registry.create_join_request(&u3, &b, false).unwrap().unwrap();

        let acceptance = f.registry.resolve_acceptance(&request.notification_id, &u1, false).unwrap();

        assert_eq!(f.members(&a), vec![u1, u2, u3.clone()]);
        assert_eq!(acceptance.joined_user_id, u3);
        assert_eq!(acceptance.retracted, 1);
        assert!(f.registry.notifications.is_empty());
        f.registry.check_invariants().unwrap();
    }

    #[test]
    fn only_the_addressee_can_accept() {
        let mut f = Fixture::new(3);
        let a = f.team(1, &[2]);
        let (u2, u3) = (f.user(2), f.user(3));
        let request = f.registry.create_join_request(&u3, &a, false).unwrap().unwrap();

        let err = f.registry.resolve_acceptance(&request.notification_id, &u2, false).unwrap_err();
        assert_eq!(err, MembershipError::NotAddressee);
        let err = f.registry.resolve_acceptance(&request.notification_id, &u3, false).unwrap_err();
        assert_eq!(err, MembershipError::NotAddressee);
    }

    // U moves from S (as a non-leader) to T.
    #[test]
    fn member_switching_teams_leaves_old_roster() {
        let mut f = Fixture::new(3);
        let s = f.team(1, &[2]);
        let t = f.team(3, &[]);
        let (u1, u2, u3) = (f.user(1), f.user(2), f.user(3));
        let invite = f.registry.create_invite(&t, &u3, &u2).unwrap().unwrap();

        assert!(!f.registry.requires_disband_confirmation(&invite.notification_id).unwrap());
        let acceptance = f.registry.resolve_acceptance(&invite.notification_id, &u2, false).unwrap();

        assert!(acceptance.disbanded_team_id.is_none());
        assert_eq!(f.members(&s), vec![u1]);
        assert_eq!(f.members(&t), vec![u3, u2.clone()]);
        assert_eq!(f.registry.user(&u2).unwrap().team_id.as_deref(), Some(t.as_str()));
        f.registry.check_invariants().unwrap();
    }

    // U4 leads B = [U4] and accepts an invite into A.
    #[test]
    fn solo_leader_accepting_invite_needs_confirmation_then_disbands() {
        let mut f = Fixture::new(4);
        let a = f.team(1, &[]);
        let b = f.team(4, &[]);
        let (u1, u4) = (f.user(1), f.user(4));
        let invite = f.registry.create_invite(&a, &u1, &u4).unwrap().unwrap();

        assert!(f.registry.requires_disband_confirmation(&invite.notification_id).unwrap());
        let err = f.registry.resolve_acceptance(&invite.notification_id, &u4, false).unwrap_err();
        assert_eq!(err, MembershipError::ConfirmationRequired);
        assert!(f.registry.team(&b).is_some());

        let acceptance = f.registry.resolve_acceptance(&invite.notification_id, &u4, true).unwrap();
        assert_eq!(acceptance.disbanded_team_id.as_deref(), Some(b.as_str()));
        assert!(f.registry.team(&b).is_none());
        assert!(f.members(&a).contains(&u4));
        f.registry.check_invariants().unwrap();
    }

    #[test]
    fn leader_switching_teams_releases_former_members() {
        let mut f = Fixture::new(5);
        let s = f.team(1, &[2, 3]);
        let t = f.team(4, &[]);
        let (u1, u2, u3, u4) = (f.user(1), f.user(2), f.user(3), f.user(4));
        let u5 = f.user(5);
        let pending_for_s = f.registry.create_invite(&s, &u1, &u5).unwrap().unwrap();
        let invite = f.registry.create_invite(&t, &u4, &u1).unwrap().unwrap();

        f.registry.resolve_acceptance(&invite.notification_id, &u1, true).unwrap();

        assert!(f.registry.team(&s).is_none());
        assert!(f.registry.user(&u2).unwrap().team_id.is_none());
        assert!(f.registry.user(&u3).unwrap().team_id.is_none());
        assert!(f.registry.notification(&pending_for_s.notification_id).is_none());
        assert_eq!(f.members(&t), vec![u4, u1]);
        f.registry.check_invariants().unwrap();
    }

    #[test]
    fn acceptance_retracts_every_other_record_for_the_user() {
        let mut f = Fixture::new(4);
        let a = f.team(1, &[]);
        let b = f.team(2, &[]);
        let c = f.team(3, &[]);
        let (u1, u2, u4) = (f.user(1), f.user(2), f.user(4));
        let invite_a = f.registry.create_invite(&a, &u1, &u4).unwrap().unwrap();
        f.registry.create_invite(&b, &u2, &u4).unwrap().unwrap();
        f.registry.create_join_request(&u4, &c, false).unwrap().unwrap();

        f.registry.resolve_acceptance(&invite_a.notification_id, &u4, false).unwrap();

        assert!(f.registry.notifications.values().all(|n| !n.concerns_candidate(&u4)));
        assert!(f.registry.notifications.is_empty());
    }

    // A reaches 4/4 through another acceptance; U5's request to A goes away.
    #[test]
    fn filling_the_last_slot_purges_pending_records_for_the_team() {
        let mut f = Fixture::new(7);
        let a = f.team(1, &[2, 3]);
        let (u1, u4, u5, u6) = (f.user(1), f.user(4), f.user(5), f.user(6));
        let invite = f.registry.create_invite(&a, &u1, &u4).unwrap().unwrap();
        let other_invite = f.registry.create_invite(&a, &u1, &u6).unwrap().unwrap();
        let request = f.registry.create_join_request(&u5, &a, false).unwrap().unwrap();

        f.registry.resolve_acceptance(&invite.notification_id, &u4, false).unwrap();

        assert_eq!(f.members(&a).len(), 4);
        assert!(f.registry.notification(&request.notification_id).is_none());
        assert!(f.registry.notification(&other_invite.notification_id).is_none());
        assert!(!f.members(&a).contains(&u5));
        assert!(f.registry.user(&u5).unwrap().team_id.is_none());
        f.registry.check_invariants().unwrap();
    }

    // U4 leads B and asks to join A; U1 leads only A.
    #[test]
    fn leading_requester_confirms_when_asking() {
        let mut f = Fixture::new(4);
        let a = f.team(1, &[]);
        let b = f.team(4, &[]);
        let (u1, u4) = (f.user(1), f.user(4));

        assert_eq!(
            f.registry.create_join_request(&u4, &a, false).unwrap_err(),
            MembershipError::ConfirmationRequired
        );
        assert!(f.registry.notifications.is_empty());

        let request = f.registry.create_join_request(&u4, &a, true).unwrap().unwrap();
        assert!(!f.registry.requires_disband_confirmation(&request.notification_id).unwrap());
        let acceptance = f.registry.resolve_acceptance(&request.notification_id, &u1, false).unwrap();

        assert_eq!(acceptance.disbanded_team_id.as_deref(), Some(b.as_str()));
        assert!(f.registry.team(&b).is_none());
        assert_eq!(f.members(&a), vec![u1, u4]);
        f.registry.check_invariants().unwrap();
    }

    #[test]
    fn accepting_leader_is_never_asked_about_their_own_team() {
        let mut f = Fixture::new(3);
        let a = f.team(1, &[2]);
        let (u1, u3) = (f.user(1), f.user(3));
        let request = f.registry.create_join_request(&u3, &a, false).unwrap().unwrap();

        assert!(!f.registry.requires_disband_confirmation(&request.notification_id).unwrap());
        let acceptance = f.registry.resolve_acceptance(&request.notification_id, &u1, false).unwrap();
        assert!(acceptance.disbanded_team_id.is_none());
        assert!(f.registry.team(&a).is_some());
    }

    #[test]
    fn accepting_into_a_full_team_is_rejected_before_any_change() {
        let mut f = Fixture::new(6);
        let a = f.team(1, &[2, 3]);
        let b = f.team(5, &[6]);
        let (u1, u4, u5) = (f.user(1), f.user(4), f.user(5));
        // Leader of B asks to join A, then A fills up through a direct join.
        let request = f.registry.create_join_request(&u5, &a, true).unwrap().unwrap();
        f.registry.join_team(&u4, &a).unwrap();

        let err = f.registry.resolve_acceptance(&request.notification_id, &u1, true).unwrap_err();
        assert_eq!(err, MembershipError::TeamFull);
        assert!(f.registry.team(&b).is_some());
        assert_eq!(f.registry.user(&u5).unwrap().team_id.as_deref(), Some(b.as_str()));
    }

    #[test]
    fn accepting_when_already_a_member_is_rejected() {
        let mut f = Fixture::new(2);
        let a = f.team(1, &[]);
        let (u1, u2) = (f.user(1), f.user(2));
        let invite = f.registry.create_invite(&a, &u1, &u2).unwrap().unwrap();
        f.registry.join_team(&u2, &a).unwrap();

        let err = f.registry.resolve_acceptance(&invite.notification_id, &u2, false).unwrap_err();
        assert_eq!(err, MembershipError::AlreadyMember);
    }
}
