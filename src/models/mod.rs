pub mod message;
pub mod notification;
pub mod team;
pub mod user;

pub use message::{SendMessageRequest, TeamMessage};
pub use notification::{Notification, NotificationKind, NotificationView};
pub use team::{Team, TeamRole};
pub use user::{SkillsInput, User, UserProfile};

/// Maximum number of members a team may hold, leader included.
pub const TEAM_SIZE_LIMIT: usize = 4;
