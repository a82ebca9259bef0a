use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{AccountId, ExpenseId, ItemId};
use crate::model::{AttachedFile, Expense, ExpenseItem, ExpenseType, PayoutMethod};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("draft targets expense {draft} but the page shows {original}")]
    ExpenseMismatch {
        original: ExpenseId,
        draft: ExpenseId,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseItemInput {
    pub id: Option<ItemId>,
    pub url: Option<String>,
    pub amount: i64,
    pub incurred_at: Option<String>,
    pub description: Option<String>,
}

impl From<&ExpenseItem> for ExpenseItemInput {
    fn from(item: &ExpenseItem) -> Self {
        Self {
            id: item.id.clone(),
            url: item.url.clone(),
            amount: item.amount,
            incurred_at: item.incurred_at.clone(),
            description: item.description.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AttachedFileInput {
    pub url: String,
}

impl From<&AttachedFile> for AttachedFileInput {
    fn from(file: &AttachedFile) -> Self {
        Self {
            url: file.url.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AccountReferenceInput {
    pub id: AccountId,
}

/// Saved payout methods are referenced by id; new ones carry their data.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PayoutMethodInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl From<&PayoutMethod> for PayoutMethodInput {
    fn from(method: &PayoutMethod) -> Self {
        match &method.id {
            Some(id) if method.is_saved => Self {
                id: Some(id.clone()),
                kind: method.kind.clone(),
                data: None,
            },
            _ => Self {
                id: method.id.clone(),
                kind: method.kind.clone(),
                data: method.data.clone(),
            },
        }
    }
}

/// Body of the `editExpense` mutation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseUpdateInput {
    pub id: ExpenseId,
    pub description: String,
    #[serde(rename = "type")]
    pub expense_type: ExpenseType,
    pub private_message: Option<String>,
    pub invoice_info: Option<String>,
    pub tags: Vec<String>,
    pub payee: Option<AccountReferenceInput>,
    pub payout_method: Option<PayoutMethodInput>,
    pub attached_files: Vec<AttachedFileInput>,
    pub items: Vec<ExpenseItemInput>,
}

/// Strips the draft down to the fields the mutation accepts.
#[must_use]
pub fn prepare_expense_for_submit(draft: &Expense) -> ExpenseUpdateInput {
    ExpenseUpdateInput {
        id: draft.id.clone(),
        description: draft.description.clone(),
        expense_type: draft.expense_type,
        private_message: draft.private_message.clone(),
        invoice_info: draft.invoice_info.clone(),
        tags: draft.tags.clone(),
        payee: draft.payee.as_ref().map(|p| AccountReferenceInput { id: p.id.clone() }),
        payout_method: draft.payout_method.as_ref().map(PayoutMethodInput::from),
        attached_files: draft.attached_files.iter().map(AttachedFileInput::from).collect(),
        items: draft.items.iter().map(ExpenseItemInput::from).collect(),
    }
}

/// Builds the mutation payload. A receipt turned into an invoice loses the
/// files attached to its items.
pub fn prepare_submission(
    original: Option<&Expense>,
    draft: &Expense,
) -> Result<ExpenseUpdateInput, SubmissionError> {
    if let Some(original) = original {
        if original.id != draft.id {
            return Err(SubmissionError::ExpenseMismatch {
                original: original.id.clone(),
                draft: draft.id.clone(),
            });
        }
    }

    let mut input = prepare_expense_for_submit(draft);
    let receipt_to_invoice = original.is_some_and(|o| o.expense_type == ExpenseType::Receipt)
        && draft.expense_type == ExpenseType::Invoice;
    if receipt_to_invoice {
        for item in &mut input.items {
            item.url = None;
        }
    }
    Ok(input)
}
