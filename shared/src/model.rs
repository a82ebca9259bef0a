use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cache::{CacheError, CacheKey, Cached, QueryCache};
use crate::capabilities::ExpensePageVariables;
use crate::config::ExpensePageConfig;
use crate::event::{AccountId, ActivityId, CommentId, ExpenseId, ItemId, ViewerId};
use crate::polling::{ActivityDebouncer, PollingMachine, TimerSlots};
use crate::route::ExpenseRoute;
use crate::thread::ThreadMemo;
use crate::{AppError, US_TAX_FORM};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseType {
    Receipt,
    Invoice,
    FundingRequest,
    #[default]
    #[serde(other)]
    Unclassified,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountRef {
    pub id: AccountId,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HostAccount {
    pub id: AccountId,
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TagStat {
    pub id: String,
    pub tag: String,
}

/// The collective the expense was submitted to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseAccount {
    pub id: AccountId,
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub host: Option<HostAccount>,
    #[serde(default)]
    pub expenses_tags: Vec<TagStat>,
}

impl ExpenseAccount {
    /// Hosts are their own host, the API only fills `host` for hosted collectives.
    #[must_use]
    pub fn effective_host(&self) -> Option<HostAccount> {
        self.host.clone().or_else(|| {
            self.is_host.then(|| HostAccount {
                id: self.id.clone(),
                slug: self.slug.clone(),
                name: self.name.clone(),
                currency: self.currency.clone(),
            })
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseItem {
    #[serde(default)]
    pub id: Option<ItemId>,
    #[serde(default)]
    pub url: Option<String>,
    pub amount: i64,
    #[serde(default)]
    pub incurred_at: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AttachedFile {
    #[serde(default)]
    pub id: Option<String>,
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PayoutMethod {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub is_saved: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpensePermissions {
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_see_invoice_info: bool,
    pub can_approve: bool,
    pub can_unapprove: bool,
    pub can_reject: bool,
    pub can_pay: bool,
    pub can_mark_as_unpaid: bool,
    pub can_comment: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    #[serde(default)]
    pub html: String,
    pub created_at: String,
    #[serde(default)]
    pub from_account: Option<AccountRef>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommentConnection {
    #[serde(default)]
    pub total_count: Option<u32>,
    #[serde(default)]
    pub nodes: Vec<Comment>,
}

impl CommentConnection {
    /// Appends unless a comment with the same id is already present; the
    /// first occurrence wins.
    pub fn append_unique(&mut self, comment: Comment) -> bool {
        if self.nodes.iter().any(|c| c.id == comment.id) {
            return false;
        }
        self.nodes.push(comment);
        if let Some(count) = self.total_count.as_mut() {
            *count += 1;
        }
        true
    }

    pub fn remove(&mut self, id: &CommentId) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|c| &c.id != id);
        let removed = self.nodes.len() != before;
        if removed {
            if let Some(count) = self.total_count.as_mut() {
                *count = count.saturating_sub(1);
            }
        }
        removed
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: ActivityId,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: String,
    #[serde(default)]
    pub individual: Option<AccountRef>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: ExpenseId,
    pub legacy_id: u64,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub expense_type: ExpenseType,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub private_message: Option<String>,
    #[serde(default)]
    pub invoice_info: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub items: Vec<ExpenseItem>,
    #[serde(default)]
    pub attached_files: Vec<AttachedFile>,
    #[serde(default)]
    pub payee: Option<AccountRef>,
    #[serde(default)]
    pub payout_method: Option<PayoutMethod>,
    #[serde(default)]
    pub permissions: ExpensePermissions,
    #[serde(default)]
    pub comments: CommentConnection,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub required_legal_documents: Vec<String>,
    #[serde(default)]
    pub account: Option<ExpenseAccount>,
}

impl Expense {
    #[must_use]
    pub fn requires_tax_form(&self) -> bool {
        self.required_legal_documents.iter().any(|d| d == US_TAX_FORM)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Membership {
    pub account: AccountRef,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct MembershipConnection {
    #[serde(default)]
    pub nodes: Vec<Membership>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoggedInAccount {
    pub id: AccountId,
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub admin_memberships: MembershipConnection,
}

impl LoggedInAccount {
    /// The viewer's own profile first, then every account they administer.
    #[must_use]
    pub fn payout_profiles(&self) -> Vec<AccountRef> {
        let own = AccountRef {
            id: self.id.clone(),
            slug: self.slug.clone(),
            name: self.name.clone(),
            image_url: self.image_url.clone(),
        };
        std::iter::once(own)
            .chain(self.admin_memberships.nodes.iter().map(|m| m.account.clone()))
            .collect()
    }
}

/// Result of the expense page query; the cached snapshot.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExpensePageData {
    #[serde(default)]
    pub expense: Option<Expense>,
    #[serde(default)]
    pub logged_in_account: Option<LoggedInAccount>,
}

// --- Page state ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub enum PageStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    NotFound {
        search_term: Option<String>,
    },
    Failed(AppError),
}

impl PageStatus {
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ViewMode {
    #[default]
    Viewing,
    Editing,
    ConfirmingSummary,
}

/// The draft lives inside the modes that need it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub enum PageMode {
    #[default]
    Viewing,
    Editing {
        draft: Box<Expense>,
    },
    ConfirmingSummary {
        draft: Box<Expense>,
    },
}

impl PageMode {
    #[must_use]
    pub fn view_mode(&self) -> ViewMode {
        match self {
            Self::Viewing => ViewMode::Viewing,
            Self::Editing { .. } => ViewMode::Editing,
            Self::ConfirmingSummary { .. } => ViewMode::ConfirmingSummary,
        }
    }

    #[must_use]
    pub fn draft(&self) -> Option<&Expense> {
        match self {
            Self::Viewing => None,
            Self::Editing { draft } | Self::ConfirmingSummary { draft } => Some(draft),
        }
    }
}

/// Sequence numbers for page fetches, so a slow response cannot overwrite a newer one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchTracker {
    issued: u64,
    applied: u64,
}

impl FetchTracker {
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    pub fn accept(&mut self, seq: u64) -> bool {
        if seq <= self.applied {
            return false;
        }
        self.applied = seq;
        true
    }

    /// Drops every response issued so far; later fetches still count up.
    pub fn supersede(&mut self) {
        self.applied = self.issued;
    }

    #[must_use]
    pub fn last_issued(&self) -> u64 {
        self.issued
    }

    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.issued.saturating_sub(self.applied)
    }
}

#[derive(Default)]
pub struct Model {
    pub config: ExpensePageConfig,
    pub route: Option<ExpenseRoute>,
    pub mounted: bool,
    pub cache: QueryCache,
    pub status: PageStatus,
    pub mode: PageMode,
    pub active_error: Option<AppError>,
    pub refresh_error: Option<AppError>,
    pub is_submitting: bool,
    pub is_refreshing: bool,
    pub viewer: Option<ViewerId>,
    pub created_banner_dismissed: bool,
    pub polling: PollingMachine,
    pub debouncer: ActivityDebouncer,
    pub timers: TimerSlots,
    pub fetches: FetchTracker,
    pub thread_memo: ThreadMemo,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("route", &self.route)
            .field("mounted", &self.mounted)
            .field("status", &self.status)
            .field("mode", &self.mode.view_mode())
            .field("active_error", &self.active_error)
            .field("is_submitting", &self.is_submitting)
            .field("is_refreshing", &self.is_refreshing)
            .field("viewer_present", &self.viewer.is_some())
            .field("polling", &self.polling.state())
            .finish_non_exhaustive()
    }
}

impl Model {
    /// A model whose query cache is shared with other pages.
    #[must_use]
    pub fn with_cache(cache: QueryCache) -> Self {
        Self {
            cache,
            ..Self::default()
        }
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    #[must_use]
    pub fn view_mode(&self) -> ViewMode {
        self.mode.view_mode()
    }

    #[must_use]
    pub fn page_variables(&self) -> Option<ExpensePageVariables> {
        self.route.as_ref().map(ExpensePageVariables::from)
    }

    pub fn cache_key(&self) -> Option<Result<CacheKey, CacheError>> {
        self.page_variables().map(|v| v.cache_key())
    }

    /// Freshest cached snapshot for the current route.
    #[must_use]
    pub fn snapshot(&self) -> Option<Cached<ExpensePageData>> {
        let key = self.cache_key()?.ok()?;
        self.cache.read(&key).ok()
    }

    /// The server-confirmed expense, only once the page resolved to it.
    #[must_use]
    pub fn current_expense(&self) -> Option<Expense> {
        if !self.status.is_loaded() {
            return None;
        }
        self.snapshot().and_then(|s| s.data.expense)
    }

    #[must_use]
    pub fn show_created_banner(&self) -> bool {
        self.route.as_ref().is_some_and(|r| r.create_success) && !self.created_banner_dismissed
    }

    /// Resolves fetched data against the requested expense and collective.
    #[must_use]
    pub fn evaluate(data: &ExpensePageData, route: &ExpenseRoute) -> PageStatus {
        let Some(expense) = data
            .expense
            .as_ref()
            .filter(|e| e.legacy_id == route.legacy_expense_id)
        else {
            return PageStatus::NotFound { search_term: None };
        };
        match &expense.account {
            Some(account) if account.slug == route.collective_slug => PageStatus::Loaded,
            _ => PageStatus::NotFound {
                search_term: Some(route.collective_slug.clone()),
            },
        }
    }
}
