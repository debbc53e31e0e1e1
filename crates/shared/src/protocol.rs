use serde::{Deserialize, Serialize};

use crate::domain::{PostDraft, UserId};

/// Body of `POST /posts`. The server mints the id, so none is sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub body: String,
    #[serde(rename = "userId")]
    pub user_id: UserId,
}

impl From<&PostDraft> for CreatePostRequest {
    fn from(draft: &PostDraft) -> Self {
        Self {
            title: draft.title.clone(),
            body: draft.body.clone(),
            user_id: draft.user_id,
        }
    }
}
