use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const ROUTE_BASE: &str = "https://opencollective.com";
const CREATE_SUCCESS_PARAM: &str = "createSuccess";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("invalid URL {path:?}: {reason}")]
    InvalidUrl { path: String, reason: String },

    #[error("{path:?} is not an expense page")]
    NotAnExpenseRoute { path: String },

    #[error("invalid expense id {raw:?}")]
    InvalidExpenseId { raw: String },

    #[error("{path:?} points to the legacy expense page")]
    LegacyRoute { path: String },
}

/// `/:parentCollectiveSlug?/:collectiveType(events)?/:collectiveSlug/expenses/:ExpenseId/:version(v2)?`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRoute {
    #[serde(default)]
    pub parent_collective_slug: Option<String>,
    #[serde(default)]
    pub is_event: bool,
    pub collective_slug: String,
    pub legacy_expense_id: u64,
    #[serde(default)]
    pub create_success: bool,
}

impl ExpenseRoute {
    pub fn new(collective_slug: impl Into<String>, legacy_expense_id: u64) -> Self {
        Self {
            parent_collective_slug: None,
            is_event: false,
            collective_slug: collective_slug.into(),
            legacy_expense_id,
            create_success: false,
        }
    }

    #[must_use]
    pub fn with_create_success(mut self, create_success: bool) -> Self {
        self.create_success = create_success;
        self
    }

    /// Accepts a path (optionally with query string) or an absolute URL.
    pub fn parse(input: &str) -> Result<Self, RouteError> {
        let base = Url::parse(ROUTE_BASE).map_err(|e| RouteError::InvalidUrl {
            path: input.to_string(),
            reason: e.to_string(),
        })?;
        let url = base.join(input).map_err(|e| RouteError::InvalidUrl {
            path: input.to_string(),
            reason: e.to_string(),
        })?;

        let mut segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        match segments.last() {
            Some(&"legacy") => {
                return Err(RouteError::LegacyRoute {
                    path: url.path().to_string(),
                })
            }
            Some(&"v2") => {
                segments.pop();
            }
            _ => {}
        }

        let not_expense = || RouteError::NotAnExpenseRoute {
            path: url.path().to_string(),
        };

        let [prefix @ .., collective, "expenses", raw_id] = segments.as_slice() else {
            return Err(not_expense());
        };

        let legacy_expense_id = parse_expense_id(raw_id)?;
        let (parent_collective_slug, is_event) = match prefix {
            [] => (None, false),
            [parent] => (Some((*parent).to_string()), false),
            [parent, "events"] => (Some((*parent).to_string()), true),
            _ => return Err(not_expense()),
        };

        let create_success = url
            .query_pairs()
            .any(|(k, v)| k == CREATE_SUCCESS_PARAM && !v.is_empty());

        Ok(Self {
            parent_collective_slug,
            is_event,
            collective_slug: (*collective).to_string(),
            legacy_expense_id,
            create_success,
        })
    }

    #[must_use]
    pub fn href(&self) -> String {
        let mut href = String::new();
        if let Some(parent) = &self.parent_collective_slug {
            href.push('/');
            href.push_str(parent);
            if self.is_event {
                href.push_str("/events");
            }
        }
        href.push('/');
        href.push_str(&self.collective_slug);
        href.push_str("/expenses/");
        href.push_str(&self.legacy_expense_id.to_string());
        if self.create_success {
            href.push('?');
            href.push_str(CREATE_SUCCESS_PARAM);
            href.push_str("=true");
        }
        href
    }

    #[must_use]
    pub fn without_create_success(&self) -> Self {
        Self {
            create_success: false,
            ..self.clone()
        }
    }
}

fn parse_expense_id(raw: &str) -> Result<u64, RouteError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RouteError::InvalidExpenseId {
            raw: raw.to_string(),
        });
    }
    raw.parse().map_err(|_| RouteError::InvalidExpenseId {
        raw: raw.to_string(),
    })
}
