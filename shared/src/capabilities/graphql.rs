use crux_http::Http;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cache::{CacheError, CacheKey};
use crate::model::Expense;
use crate::route::ExpenseRoute;
use crate::submission::ExpenseUpdateInput;

pub const EXPENSE_PAGE_OPERATION: &str = "ExpensePage";
pub const EDIT_EXPENSE_OPERATION: &str = "editExpense";

const EXPENSE_FIELDS_FRAGMENT: &str = r"
fragment expensePageExpenseFields on Expense {
  id
  legacyId
  description
  type
  currency
  amount
  privateMessage
  invoiceInfo
  tags
  requiredLegalDocuments
  items { id url amount incurredAt description }
  attachedFiles { id url }
  payee { id slug name imageUrl }
  payoutMethod { id type data isSaved }
  permissions {
    canEdit canDelete canSeeInvoiceInfo canApprove canUnapprove
    canReject canPay canMarkAsUnpaid canComment
  }
  comments(limit: 300) {
    totalCount
    nodes { id html createdAt fromAccount { id slug name imageUrl } }
  }
  activities { id type createdAt individual { id slug name imageUrl } }
  account {
    id slug name currency isHost
    expensesTags { id tag }
    ... on AccountWithHost { host { id slug name currency } }
  }
}
";

const LOGGED_IN_ACCOUNT_FRAGMENT: &str = r"
fragment loggedInAccountExpensePayoutFields on Individual {
  id
  slug
  name
  imageUrl
  adminMemberships: memberOf(role: ADMIN) {
    nodes { account { id slug name imageUrl } }
  }
}
";

#[must_use]
pub fn expense_page_query() -> String {
    format!(
        "query ExpensePage($legacyExpenseId: Int!) {{
  expense(expense: {{ legacyId: $legacyExpenseId }}) {{ ...expensePageExpenseFields }}
  loggedInAccount {{ ...loggedInAccountExpensePayoutFields }}
}}
{LOGGED_IN_ACCOUNT_FRAGMENT}{EXPENSE_FIELDS_FRAGMENT}"
    )
}

#[must_use]
pub fn edit_expense_mutation() -> String {
    format!(
        "mutation editExpense($expense: ExpenseUpdateInput!) {{
  editExpense(expense: $expense) {{ ...expensePageExpenseFields }}
}}
{EXPENSE_FIELDS_FRAGMENT}"
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GraphqlError {
    #[error("request failed: {message}")]
    Transport { message: String },

    #[error("server answered with HTTP {status}")]
    Status { status: u16, body: Option<String> },

    #[error("{message}")]
    Server { code: Option<String>, message: String },

    #[error("response carried neither data nor errors")]
    EmptyResponse,

    #[error("could not encode request: {message}")]
    Encode { message: String },
}

pub type GraphqlResult<T> = Result<T, GraphqlError>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest<'a, V> {
    pub query: &'a str,
    pub operation_name: &'a str,
    pub variables: &'a V,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorExtensions {
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorEntry {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<GraphqlErrorExtensions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlErrorEntry>,
}

impl<T> GraphqlResponse<T> {
    /// Any error entry fails the whole operation; partial data is dropped.
    pub fn into_result(self) -> GraphqlResult<T> {
        if let Some(first) = self.errors.first() {
            let code = first.extensions.as_ref().and_then(|e| e.code.clone());
            let message = self
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GraphqlError::Server { code, message });
        }
        self.data.ok_or(GraphqlError::EmptyResponse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpensePageVariables {
    pub legacy_expense_id: u64,
}

impl ExpensePageVariables {
    /// Fetch and refetch reuse these variables, so they double as the cache key.
    pub fn cache_key(&self) -> Result<CacheKey, CacheError> {
        CacheKey::new(EXPENSE_PAGE_OPERATION, self)
    }
}

impl From<&ExpenseRoute> for ExpensePageVariables {
    fn from(route: &ExpenseRoute) -> Self {
        Self {
            legacy_expense_id: route.legacy_expense_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditExpenseVariables<'a> {
    pub expense: &'a ExpenseUpdateInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditExpenseData {
    pub edit_expense: Expense,
}

/// Posts GraphQL operations through the HTTP capability.
pub struct GraphqlClient<'a, Ev> {
    http: &'a Http<Ev>,
    endpoint: &'a str,
}

impl<'a, Ev> GraphqlClient<'a, Ev>
where
    Ev: Send + 'static,
{
    pub fn new(http: &'a Http<Ev>, endpoint: &'a str) -> Self {
        Self { http, endpoint }
    }

    pub fn execute<V, T, F>(
        &self,
        query: &str,
        operation_name: &str,
        variables: &V,
        callback: F,
    ) -> GraphqlResult<()>
    where
        V: Serialize,
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(GraphqlResult<T>) -> Ev + Send + 'static,
    {
        let body = GraphqlRequest {
            query,
            operation_name,
            variables,
        };
        debug!(operation = operation_name, endpoint = self.endpoint, "graphql request");

        self.http
            .post(self.endpoint)
            .body_json(&body)
            .map_err(|e| GraphqlError::Encode {
                message: e.to_string(),
            })?
            .expect_json::<GraphqlResponse<T>>()
            .send(move |result| callback(decode_response(result)));
        Ok(())
    }
}

fn decode_response<T>(
    result: crux_http::Result<crux_http::Response<GraphqlResponse<T>>>,
) -> GraphqlResult<T> {
    let mut response = result.map_err(|e| GraphqlError::Transport {
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(GraphqlError::Status {
            status: u16::from(status),
            body: None,
        });
    }

    response
        .take_body()
        .ok_or(GraphqlError::EmptyResponse)?
        .into_result()
}
