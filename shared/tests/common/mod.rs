#![allow(dead_code)]

use crux_core::testing::AppTester;
use expense_core::capabilities::{NavigationOperation, TimerId, TimerOperation, TimerOutput};
use expense_core::event::{CommentId, FetchPurpose};
use expense_core::model::{Comment, Expense, ExpensePageData, ExpenseType};
use expense_core::route::ExpenseRoute;
use expense_core::{App, Effect, Event, ExpensePageConfig, Model, ViewModel};

pub const SLUG: &str = "acme";
pub const LEGACY_ID: u64 = 42;

pub fn test_config() -> ExpensePageConfig {
    ExpensePageConfig {
        polling_interval_ms: 1_000,
        activity_debounce_ms: 100,
        ..ExpensePageConfig::default()
    }
}

pub fn route() -> ExpenseRoute {
    ExpenseRoute::new(SLUG, LEGACY_ID)
}

pub fn expense_for(slug: &str) -> Expense {
    serde_json::from_value(serde_json::json!({
        "id": "exp-42",
        "legacyId": LEGACY_ID,
        "description": "Conference travel",
        "type": "RECEIPT",
        "currency": "USD",
        "amount": 1500,
        "privateMessage": null,
        "tags": ["travel"],
        "items": [
            { "id": "item-1", "url": "https://files.example/flight.pdf", "amount": 1000, "incurredAt": "2020-03-01T00:00:00Z" },
            { "id": "item-2", "url": "https://files.example/hotel.pdf", "amount": 500, "incurredAt": "2020-03-02T00:00:00Z" }
        ],
        "permissions": { "canEdit": true, "canComment": true },
        "comments": {
            "totalCount": 1,
            "nodes": [ { "id": "c1", "html": "<p>Looks good</p>", "createdAt": "2020-03-03T10:00:00Z" } ]
        },
        "activities": [ { "id": "a1", "type": "COLLECTIVE_EXPENSE_CREATED", "createdAt": "2020-03-03T09:00:00Z" } ],
        "account": {
            "id": "acc-1",
            "slug": slug,
            "name": "Acme",
            "expensesTags": [ { "id": "t1", "tag": "travel" }, { "id": "t2", "tag": "food" } ]
        }
    }))
    .expect("fixture expense is valid")
}

pub fn expense() -> Expense {
    expense_for(SLUG)
}

pub fn page_data() -> ExpensePageData {
    ExpensePageData {
        expense: Some(expense()),
        logged_in_account: None,
    }
}

pub fn comment(id: &str, at: &str) -> Comment {
    Comment {
        id: CommentId::new(id),
        html: format!("<p>{id}</p>"),
        created_at: at.to_string(),
        from_account: None,
    }
}

pub fn invoice_draft() -> Expense {
    let mut draft = expense();
    draft.expense_type = ExpenseType::Invoice;
    draft
}

/// One mounted expense page driven through the core.
pub struct Page {
    pub app: AppTester<App, Effect>,
    pub model: Model,
}

impl Default for Page {
    fn default() -> Self {
        Self::with_model(Model::default())
    }
}

impl Page {
    pub fn with_model(model: Model) -> Self {
        Self {
            app: AppTester::default(),
            model,
        }
    }

    pub fn send(&mut self, event: Event) -> Vec<Effect> {
        self.app.update(event, &mut self.model).effects
    }

    pub fn view(&self) -> ViewModel {
        self.app.view(&self.model)
    }

    pub fn mount(&mut self, route: ExpenseRoute) -> Vec<Effect> {
        self.send(Event::Mounted {
            route: Box::new(route),
            config: Some(Box::new(test_config())),
        })
    }

    pub fn last_seq(&self) -> u64 {
        self.model.fetches.last_issued()
    }

    /// Answers the most recent page fetch.
    pub fn resolve_fetch(
        &mut self,
        purpose: FetchPurpose,
        result: Result<ExpensePageData, expense_core::AppError>,
    ) -> Vec<Effect> {
        let seq = self.last_seq();
        self.send(Event::PageFetched {
            purpose,
            seq,
            result: Box::new(result),
        })
    }

    pub fn mount_loaded(&mut self) -> Vec<Effect> {
        self.mount(route());
        self.resolve_fetch(FetchPurpose::Initial, Ok(page_data()))
    }

    /// Loaded page in summary mode with `draft` awaiting confirmation.
    pub fn in_summary(&mut self, draft: Expense) {
        self.mount_loaded();
        self.send(Event::EditRequested);
        self.send(Event::DraftSubmitted(Box::new(draft)));
    }

    pub fn fire_timer(&mut self, id: TimerId) -> Vec<Effect> {
        self.send(Event::TimerResolved(TimerOutput::Elapsed { id }))
    }
}

pub fn http_count(effects: &[Effect]) -> usize {
    effects.iter().filter(|e| matches!(e, Effect::Http(_))).count()
}

pub fn http_bodies(effects: &[Effect]) -> Vec<serde_json::Value> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Http(request) => serde_json::from_slice(&request.operation.body).ok(),
            _ => None,
        })
        .collect()
}

pub fn renders(effects: &[Effect]) -> usize {
    effects.iter().filter(|e| matches!(e, Effect::Render(_))).count()
}

pub fn timer_ops(effects: &[Effect]) -> Vec<TimerOperation> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Timer(request) => Some(request.operation.clone()),
            _ => None,
        })
        .collect()
}

pub fn navigation_ops(effects: &[Effect]) -> Vec<NavigationOperation> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Navigation(request) => Some(request.operation.clone()),
            _ => None,
        })
        .collect()
}

pub fn scrolls_to_top(effects: &[Effect]) -> usize {
    navigation_ops(effects)
        .iter()
        .filter(|op| {
            matches!(op, NavigationOperation::ScrollIntoView { anchor } if anchor == expense_core::EXPENSE_TOP_ANCHOR)
        })
        .count()
}
