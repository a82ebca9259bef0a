use serde::{Deserialize, Serialize};

use crate::model::{AccountRef, Expense, HostAccount, Model, PageStatus, ViewMode};
use crate::thread::ThreadItem;
use crate::{AppError, ErrorSeverity};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserFacingError {
    pub message: String,
    pub code: String,
    pub is_retryable: bool,
    pub is_transient: bool,
}

impl From<&AppError> for UserFacingError {
    fn from(error: &AppError) -> Self {
        Self {
            message: error.user_facing_message(),
            code: error.code().to_string(),
            is_retryable: error.is_retryable(),
            is_transient: matches!(error.severity, ErrorSeverity::Transient),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PageView {
    #[default]
    Idle,
    Loading,
    #[serde(rename_all = "camelCase")]
    NotFound {
        search_term: Option<String>,
    },
    Error {
        error: UserFacingError,
    },
    Ready,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub page: PageView,
    pub mode: ViewMode,
    /// The draft while confirming the summary, otherwise the server snapshot.
    pub expense: Option<Expense>,
    pub draft: Option<Expense>,
    pub error: Option<UserFacingError>,
    pub refresh_error: Option<UserFacingError>,
    pub is_submitting: bool,
    pub is_refreshing: bool,
    pub thread_items: Vec<ThreadItem>,
    pub show_created_banner: bool,
    pub show_tax_form_message: bool,
    pub page_title: Option<String>,
    pub payout_profiles: Vec<AccountRef>,
    pub suggested_tags: Vec<String>,
    pub can_submit_new_expense: bool,
    pub listening_for_activity: bool,
    pub host: Option<HostAccount>,
}

impl ViewModel {
    pub fn from_model(model: &Model) -> Self {
        let page = match &model.status {
            PageStatus::Idle => PageView::Idle,
            PageStatus::Loading => PageView::Loading,
            PageStatus::Loaded => PageView::Ready,
            PageStatus::NotFound { search_term } => PageView::NotFound {
                search_term: search_term.clone(),
            },
            PageStatus::Failed(error) => PageView::Error {
                error: UserFacingError::from(error),
            },
        };

        let mode = model.view_mode();
        let draft = model.mode.draft().cloned();
        let snapshot = model.snapshot().filter(|_| model.status.is_loaded());
        let revision = snapshot.as_ref().map(|s| s.revision);
        let data = snapshot.map(|s| s.data);

        let confirmed = data.as_ref().and_then(|d| d.expense.as_ref());
        let thread_items = match (confirmed, revision) {
            (Some(expense), Some(revision)) => model.thread_memo.get(revision, expense).to_vec(),
            _ => Vec::new(),
        };

        let account = confirmed.and_then(|e| e.account.as_ref());
        let show_tax_form_message =
            confirmed.is_some_and(|e| e.requires_tax_form() && e.permissions.can_edit);
        let page_title = confirmed
            .filter(|e| !e.description.is_empty())
            .map(|e| format!("{} · Expense #{}", e.description, e.legacy_id));
        let payout_profiles = data
            .as_ref()
            .and_then(|d| d.logged_in_account.as_ref())
            .map(|a| a.payout_profiles())
            .unwrap_or_default();
        let suggested_tags = account
            .map(|a| a.expenses_tags.iter().map(|t| t.tag.clone()).collect())
            .unwrap_or_default();
        let host = account.and_then(|a| a.effective_host());

        let expense = match mode {
            ViewMode::ConfirmingSummary => draft.clone(),
            ViewMode::Viewing | ViewMode::Editing => confirmed.cloned(),
        };

        Self {
            page,
            mode,
            expense,
            draft,
            error: model.active_error.as_ref().map(UserFacingError::from),
            refresh_error: model.refresh_error.as_ref().map(UserFacingError::from),
            is_submitting: model.is_submitting,
            is_refreshing: model.is_refreshing,
            thread_items,
            show_created_banner: model.show_created_banner(),
            show_tax_form_message,
            page_title,
            payout_profiles,
            suggested_tags,
            can_submit_new_expense: mode == ViewMode::Viewing && model.status.is_loaded(),
            listening_for_activity: model.mounted,
            host,
        }
    }
}
