use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::TimerOutput;
use crate::config::ExpensePageConfig;
use crate::model::{Comment, Expense, ExpensePageData};
use crate::route::ExpenseRoute;
use crate::AppError;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(ExpenseId);
typed_id!(CommentId);
typed_id!(ActivityId);
typed_id!(AccountId);
typed_id!(ItemId);
typed_id!(ViewerId);

/// Why a page fetch was issued. Carried back with the response.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchPurpose {
    Initial,
    Poll,
    Refresh,
    ViewerUpgrade,
}

impl FetchPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Poll => "poll",
            Self::Refresh => "refresh",
            Self::ViewerUpgrade => "viewer_upgrade",
        }
    }
}

// --- Event enum: large variants boxed ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle
    Mounted {
        route: Box<ExpenseRoute>,
        config: Option<Box<ExpensePageConfig>>,
    },
    Unmounted,
    ViewerChanged {
        viewer: Option<ViewerId>,
    },
    ActivityPulse,

    // Mode intents
    EditRequested,
    EditCancelled,
    DraftSubmitted(Box<Expense>),
    BackToEditRequested,
    PrivateNoteChanged {
        note: String,
    },
    SummaryConfirmed,

    // Thread intents
    CommentAdded(Box<Comment>),
    CommentDeleted {
        id: CommentId,
    },

    // Page chrome
    CreatedBannerDismissed,
    AdminActionFailed(Box<AppError>),

    // Capability responses
    PageFetched {
        purpose: FetchPurpose,
        seq: u64,
        result: Box<Result<ExpensePageData, AppError>>,
    },
    ExpenseEdited(Box<Result<Expense, AppError>>),
    TimerResolved(TimerOutput),
}

impl Event {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mounted { .. } => "mounted",
            Self::Unmounted => "unmounted",
            Self::ViewerChanged { .. } => "viewer_changed",
            Self::ActivityPulse => "activity_pulse",
            Self::EditRequested => "edit_requested",
            Self::EditCancelled => "edit_cancelled",
            Self::DraftSubmitted(_) => "draft_submitted",
            Self::BackToEditRequested => "back_to_edit_requested",
            Self::PrivateNoteChanged { .. } => "private_note_changed",
            Self::SummaryConfirmed => "summary_confirmed",
            Self::CommentAdded(_) => "comment_added",
            Self::CommentDeleted { .. } => "comment_deleted",
            Self::CreatedBannerDismissed => "created_banner_dismissed",
            Self::AdminActionFailed(_) => "admin_action_failed",
            Self::PageFetched { .. } => "page_fetched",
            Self::ExpenseEdited(_) => "expense_edited",
            Self::TimerResolved(_) => "timer_resolved",
        }
    }

    #[must_use]
    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::EditRequested
                | Self::EditCancelled
                | Self::DraftSubmitted(_)
                | Self::BackToEditRequested
                | Self::PrivateNoteChanged { .. }
                | Self::SummaryConfirmed
                | Self::CommentAdded(_)
                | Self::CommentDeleted { .. }
                | Self::CreatedBannerDismissed
        )
    }

    /// High-frequency events that never change what is on screen by themselves.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        matches!(self, Self::ActivityPulse | Self::TimerResolved(_))
    }
}
