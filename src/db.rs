use futures_util::StreamExt;
use log::{info, warn};
use mongodb::bson::doc;
use mongodb::{options::ClientOptions, Client, ClientSession, Collection, Database};
use serde::de::DeserializeOwned;

use crate::models::{Notification, Team, TeamMessage, User};
use crate::registry::{Changeset, Registry};

const USERS: &str = "users";
const TEAMS: &str = "teams";
const NOTIFICATIONS: &str = "notifications";
const MESSAGES: &str = "messages";

pub struct MongoDB {
    client: Client,
    db: Database,
}

impl MongoDB {
    pub async fn init(uri: &str, db_name: &str) -> Result<Self, mongodb::error::Error> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);
        info!("Connected to MongoDB database {}", db_name);
        Ok(MongoDB { client, db })
    }

    fn users(&self) -> Collection<User> {
        self.db.collection::<User>(USERS)
    }

    fn teams(&self) -> Collection<Team> {
        self.db.collection::<Team>(TEAMS)
    }

    fn notifications(&self) -> Collection<Notification> {
        self.db.collection::<Notification>(NOTIFICATIONS)
    }

    fn messages(&self) -> Collection<TeamMessage> {
        self.db.collection::<TeamMessage>(MESSAGES)
    }

    /// Reads every persisted user, team and notification.
    pub async fn load_registry(&self) -> Result<Registry, mongodb::error::Error> {
        let users = collect_all(&self.users()).await?;
        let teams = collect_all(&self.teams()).await?;
        let notifications = collect_all(&self.notifications()).await?;
        info!(
            "Loaded {} users, {} teams, {} pending notifications",
            users.len(),
            teams.len(),
            notifications.len()
        );
        Ok(Registry::from_records(users, teams, notifications))
    }

    /// Writes the records named in `changes`, reading their current state
    /// from `registry`. All writes commit together or not at all, which needs
    /// a replica set or sharded deployment.
    pub async fn persist(&self, registry: &Registry, changes: &Changeset) -> Result<(), mongodb::error::Error> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;
        match self.write_changes(&mut session, registry, changes).await {
            Ok(()) => session.commit_transaction().await,
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    warn!("Failed to abort transaction: {}", abort_err);
                }
                Err(err)
            }
        }
    }

    async fn write_changes(
        &self,
        session: &mut ClientSession,
        registry: &Registry,
        changes: &Changeset,
    ) -> Result<(), mongodb::error::Error> {
        for user_id in &changes.users {
            if let Some(user) = registry.user(user_id) {
                self.users()
                    .replace_one(doc! { "user_id": user_id }, user)
                    .upsert(true)
                    .session(&mut *session)
                    .await?;
            }
        }
        for team_id in &changes.teams {
            if let Some(team) = registry.team(team_id) {
                self.teams()
                    .replace_one(doc! { "team_id": team_id }, team)
                    .upsert(true)
                    .session(&mut *session)
                    .await?;
            }
        }
        for team_id in &changes.removed_teams {
            self.teams()
                .delete_one(doc! { "team_id": team_id })
                .session(&mut *session)
                .await?;
        }
        for notification_id in &changes.notifications {
            if let Some(notification) = registry.notification(notification_id) {
                self.notifications()
                    .replace_one(doc! { "notification_id": notification_id }, notification)
                    .upsert(true)
                    .session(&mut *session)
                    .await?;
            }
        }
        for notification_id in &changes.removed_notifications {
            self.notifications()
                .delete_one(doc! { "notification_id": notification_id })
                .session(&mut *session)
                .await?;
        }
        Ok(())
    }

    pub async fn insert_message(&self, message: &TeamMessage) -> Result<(), mongodb::error::Error> {
        self.messages().insert_one(message).await?;
        Ok(())
    }

    pub async fn team_messages(&self, team_id: &str) -> Result<Vec<TeamMessage>, mongodb::error::Error> {
        let mut cursor = self
            .messages()
            .find(doc! { "team_id": team_id })
            .sort(doc! { "timestamp": 1 })
            .await?;
        let mut messages = Vec::new();
        while let Some(message) = cursor.next().await {
            messages.push(message?);
        }
        Ok(messages)
    }
}

async fn collect_all<T>(collection: &Collection<T>) -> Result<Vec<T>, mongodb::error::Error>
where
    T: DeserializeOwned + Send + Sync,
{
    let mut cursor = collection.find(doc! {}).await?;
    let mut items = Vec::new();
    while let Some(item) = cursor.next().await {
        items.push(item?);
    }
    Ok(items)
}
