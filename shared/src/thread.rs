use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::model::{Activity, Comment, Expense};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum ThreadItem {
    Comment(Comment),
    Activity(Activity),
}

impl ThreadItem {
    #[must_use]
    pub fn created_at(&self) -> &str {
        match self {
            Self::Comment(c) => &c.created_at,
            Self::Activity(a) => &a.created_at,
        }
    }
}

/// Comments and activities in one timeline. Timestamps are ISO-8601 and
/// compare lexicographically; ties keep comments before activities.
#[must_use]
pub fn merge_thread_items(comments: &[Comment], activities: &[Activity]) -> Vec<ThreadItem> {
    let mut items: Vec<ThreadItem> = comments
        .iter()
        .cloned()
        .map(ThreadItem::Comment)
        .chain(activities.iter().cloned().map(ThreadItem::Activity))
        .collect();
    items.sort_by(|a, b| a.created_at().cmp(b.created_at()));
    items
}

/// Recomputes the merged thread only when the cache revision it derives from changes.
#[derive(Debug, Default)]
pub struct ThreadMemo {
    slot: Mutex<Option<(u64, Arc<[ThreadItem]>)>>,
    computations: AtomicUsize,
}

impl ThreadMemo {
    pub fn get(&self, revision: u64, expense: &Expense) -> Arc<[ThreadItem]> {
        let mut slot = self.slot.lock();
        if let Some((cached, items)) = slot.as_ref() {
            if *cached == revision {
                return Arc::clone(items);
            }
        }
        let items: Arc<[ThreadItem]> =
            merge_thread_items(&expense.comments.nodes, &expense.activities).into();
        self.computations.fetch_add(1, Ordering::Relaxed);
        *slot = Some((revision, Arc::clone(&items)));
        items
    }

    #[must_use]
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }
}
