use serde::{Deserialize, Serialize};

use crate::model::PageStatus;

/// Per-request server response state, passed in explicitly when the page is
/// rendered on the server.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseContext {
    pub status: u16,
}

impl Default for ResponseContext {
    fn default() -> Self {
        Self { status: 200 }
    }
}

impl ResponseContext {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub fn apply_page_status(ctx: &mut ResponseContext, status: &PageStatus) {
    match status {
        PageStatus::NotFound { .. } => ctx.status = 404,
        PageStatus::Failed(error) => {
            ctx.status = error.kind.http_status_hint().unwrap_or(500);
        }
        PageStatus::Idle | PageStatus::Loading | PageStatus::Loaded => {}
    }
}
