use serde::{Deserialize, Serialize};
use shared::domain::{Post, PostId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
}

/// Transient user-visible message. At most one is live at a time; replacing
/// it cancels the incumbent's expiry timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    pub kind: NotificationKind,
}

/// Point-in-time copy of the dialog, search, and notification state for the
/// render layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub create_open: bool,
    pub editing: Option<Post>,
    pub pending_deletion: Option<PostId>,
    pub search_query: String,
    pub notification: Option<Notification>,
}
