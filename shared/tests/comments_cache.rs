mod common;

use common::*;
use expense_core::cache::QueryCache;
use expense_core::event::{CommentId, FetchPurpose};
use expense_core::thread::ThreadItem;
use expense_core::{Event, Model};
use proptest::prelude::*;

fn comment_ids(page: &Page) -> Vec<String> {
    page.view()
        .expense
        .map(|e| e.comments.nodes.into_iter().map(|c| c.id.0).collect())
        .unwrap_or_default()
}

#[test]
fn adding_a_comment_patches_the_cached_page() {
    let mut page = Page::default();
    page.mount_loaded();

    let effects = page.send(Event::CommentAdded(Box::new(comment("c2", "2020-03-04T00:00:00Z"))));
    assert_eq!(http_count(&effects), 0);
    assert_eq!(renders(&effects), 1);
    assert_eq!(comment_ids(&page), vec!["c1", "c2"]);
    assert_eq!(
        page.view().expense.and_then(|e| e.comments.total_count),
        Some(2)
    );
}

#[test]
fn adding_the_same_comment_twice_keeps_one_copy() {
    let mut page = Page::default();
    page.mount_loaded();

    let first = comment("c2", "2020-03-04T00:00:00Z");
    let mut second = first.clone();
    second.html = "<p>edited</p>".into();

    page.send(Event::CommentAdded(Box::new(first.clone())));
    page.send(Event::CommentAdded(Box::new(second)));

    let comments = page.view().expense.unwrap().comments.nodes;
    assert_eq!(comments.iter().filter(|c| c.id == first.id).count(), 1);
    assert_eq!(comments.last().map(|c| c.html.as_str()), Some("<p>c2</p>"));
}

#[test]
fn deleting_an_absent_comment_changes_nothing() {
    let mut page = Page::default();
    page.mount_loaded();
    let before = page.view().expense.unwrap().comments;

    page.send(Event::CommentDeleted {
        id: CommentId::new("does-not-exist"),
    });

    assert_eq!(page.view().expense.unwrap().comments, before);
}

#[test]
fn deleting_a_comment_removes_it_from_the_thread() {
    let mut page = Page::default();
    page.mount_loaded();
    assert_eq!(page.view().thread_items.len(), 2);

    page.send(Event::CommentDeleted {
        id: CommentId::new("c1"),
    });

    let thread = page.view().thread_items;
    assert_eq!(thread.len(), 1);
    assert!(matches!(thread[0], ThreadItem::Activity(_)));
}

#[test]
fn patches_do_not_touch_previously_read_snapshots() {
    let mut page = Page::default();
    page.mount_loaded();
    let earlier = page.model.snapshot().unwrap();

    page.send(Event::CommentAdded(Box::new(comment("c2", "2020-03-04T00:00:00Z"))));

    let later = page.model.snapshot().unwrap();
    assert_eq!(earlier.data.expense.unwrap().comments.nodes.len(), 1);
    assert_eq!(later.data.expense.unwrap().comments.nodes.len(), 2);
    assert!(later.revision > earlier.revision);
}

#[test]
fn comment_before_load_is_ignored() {
    let mut page = Page::default();
    page.mount(route());
    let effects = page.send(Event::CommentAdded(Box::new(comment("c2", "2020-03-04T00:00:00Z"))));
    assert_eq!(http_count(&effects), 0);
    assert!(page.model.snapshot().is_none());
}

#[test]
fn thread_is_merged_in_time_order_and_memoised() {
    let mut page = Page::default();
    page.mount_loaded();

    let thread = page.view().thread_items;
    let order: Vec<&str> = thread.iter().map(ThreadItem::created_at).collect();
    assert_eq!(order, vec!["2020-03-03T09:00:00Z", "2020-03-03T10:00:00Z"]);

    let computed = page.model.thread_memo.computations();
    page.view();
    page.view();
    assert_eq!(page.model.thread_memo.computations(), computed);

    page.send(Event::CommentAdded(Box::new(comment("c0", "2020-03-03T08:00:00Z"))));
    let thread = page.view().thread_items;
    assert_eq!(page.model.thread_memo.computations(), computed + 1);
    assert!(matches!(&thread[0], ThreadItem::Comment(c) if c.id.as_str() == "c0"));
}

#[test]
fn pages_sharing_a_cache_see_each_others_patches() {
    let cache = QueryCache::new(8);
    let mut first = Page::with_model(Model::with_cache(cache.clone()));
    let mut second = Page::with_model(Model::with_cache(cache));

    first.mount_loaded();
    second.mount(route());
    assert_eq!(second.view().expense.map(|e| e.legacy_id), Some(LEGACY_ID));

    first.send(Event::CommentAdded(Box::new(comment("c2", "2020-03-04T00:00:00Z"))));
    assert_eq!(comment_ids(&second), vec!["c1", "c2"]);

    second.resolve_fetch(FetchPurpose::Initial, Ok(page_data()));
    assert_eq!(comment_ids(&first), vec!["c1"]);
}

proptest! {
    #[test]
    fn repeated_appends_are_idempotent(
        ids in prop::collection::vec("c[1-5]", 1..20),
    ) {
        let mut page = Page::default();
        page.mount_loaded();

        for (i, id) in ids.iter().enumerate() {
            let at = format!("2020-04-01T00:00:{:02}Z", i % 60);
            page.send(Event::CommentAdded(Box::new(comment(id, &at))));
        }

        let ids_seen = comment_ids(&page);
        let mut unique = ids_seen.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(ids_seen.len(), unique.len());
        for id in &ids {
            prop_assert!(ids_seen.contains(id));
        }
    }
}
