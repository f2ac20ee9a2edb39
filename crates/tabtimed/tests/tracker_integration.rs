//! Integration tests for the tracker actor.
//!
//! Every test drives the tracker with a manual clock, so elapsed time is
//! exact. Tests CAN use `.unwrap()` and `.expect()`.

mod common;

use std::sync::Arc;

use tabtime_core::{ContextId, LoadStatus, ManualClock, SiteKey, TimingSlot, WindowId};
use tabtimed::directory::ContextDirectory;
use tabtimed::store::LedgerStore;
use tabtimed::tracker::{spawn_tracker, CommitOutcome, DiscardReason};

use common::{t0, tab, TrackerFixture};

#[tokio::test]
async fn test_switching_tabs_commits_previous_interval() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://www.example.com/docs", "Example")).await;
    fx.clock.advance_secs(5);
    fx.activate(tab(2, 10, "https://news.ycombinator.com/", "HN")).await;
    fx.clock.advance_secs(3);
    fx.tracker.focus_lost().await.unwrap();

    assert_eq!(fx.seconds_for("example.com").await, 5);
    assert_eq!(fx.seconds_for("news.ycombinator.com").await, 3);
}

#[tokio::test]
async fn test_intervals_accumulate_with_latest_title() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://example.com/a", "First title")).await;
    fx.clock.advance_secs(5);
    fx.tracker.focus_lost().await.unwrap();

    fx.activate(tab(1, 10, "https://example.com/b", "Second title")).await;
    fx.clock.advance_secs(7);
    let transition = fx.tracker.focus_lost().await.unwrap();

    assert_eq!(
        transition.commit,
        Some(CommitOutcome::Committed {
            site: SiteKey::new("example.com"),
            seconds: 7,
            total: 12,
        })
    );

    let ledger = fx.ledger.snapshot().await.unwrap();
    let entry = ledger.get(&SiteKey::new("example.com")).unwrap();
    assert_eq!(entry.accumulated_seconds, 12);
    assert_eq!(entry.display_title, "Second title");
}

#[tokio::test]
async fn test_closing_twice_does_not_double_count() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://example.com", "Example")).await;
    fx.clock.advance_secs(10);

    let first = fx.tracker.focus_lost().await.unwrap();
    fx.clock.advance_secs(10);
    let second = fx.tracker.focus_lost().await.unwrap();

    assert_eq!(first.committed_seconds(), 10);
    assert_eq!(second.commit, None);
    assert_eq!(fx.seconds_for("example.com").await, 10);
}

#[tokio::test]
async fn test_only_latest_activation_is_timed() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://a.com", "A")).await;
    fx.clock.advance_secs(2);
    fx.activate(tab(2, 20, "https://b.com", "B")).await;

    let view = fx.tracker.current().await.expect("timing");
    assert_eq!(view.context_id, ContextId::new(2));
    assert_eq!(view.since, fx.now());
}

#[tokio::test]
async fn test_focus_loss_leaves_tracker_idle() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://example.com", "Example")).await;
    fx.clock.advance_secs(4);
    let transition = fx.tracker.focus_lost().await.unwrap();
    assert_eq!(transition.slot, TimingSlot::Idle);
    assert!(fx.tracker.current().await.is_none());

    // Time away from the browser is never counted
    fx.clock.advance_secs(600);
    fx.tracker.focus_lost().await.unwrap();
    assert_eq!(fx.seconds_for("example.com").await, 4);
}

#[tokio::test]
async fn test_zero_length_interval_is_discarded() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://a.com", "A")).await;
    fx.directory.activate(tab(2, 10, "https://b.com", "B")).await;
    let transition = fx
        .tracker
        .context_activated(ContextId::new(2))
        .await
        .unwrap();

    assert_eq!(
        transition.commit,
        Some(CommitOutcome::Discarded(DiscardReason::NonPositive {
            elapsed: 0
        }))
    );
    assert!(fx.ledger.snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sub_half_second_rounds_down_to_nothing() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://a.com", "A")).await;
    fx.clock.advance(chrono::Duration::milliseconds(400));
    fx.tracker.focus_lost().await.unwrap();

    assert!(fx.ledger.snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_internal_pages_are_never_timed() {
    let fx = TrackerFixture::new();

    for (id, url) in [
        (1, "chrome://newtab/"),
        (2, "chrome-extension://abcdef/popup.html"),
        (3, "about:blank"),
        (4, "edge://settings"),
    ] {
        fx.activate(tab(id, 10, url, "Internal")).await;
        assert!(fx.tracker.current().await.is_none(), "{url} should not be timed");
        fx.clock.advance_secs(30);
    }
    fx.tracker.focus_lost().await.unwrap();

    assert!(fx.ledger.snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_internal_page_ends_previous_interval() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://example.com", "Example")).await;
    fx.clock.advance_secs(8);
    fx.activate(tab(2, 10, "chrome://settings", "Settings")).await;
    fx.clock.advance_secs(100);
    fx.tracker.focus_lost().await.unwrap();

    assert_eq!(fx.seconds_for("example.com").await, 8);
    assert_eq!(fx.ledger.snapshot().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_closed_context_loses_its_interval() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://example.com", "Example")).await;
    fx.clock.advance_secs(15);

    fx.directory.forget(ContextId::new(1)).await;
    let transition = fx.tracker.context_removed(ContextId::new(1)).await.unwrap();

    assert_eq!(
        transition.commit,
        Some(CommitOutcome::Discarded(DiscardReason::ContextGone {
            context_id: ContextId::new(1)
        }))
    );
    assert_eq!(transition.slot, TimingSlot::Idle);
    assert!(fx.ledger.snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_removing_other_context_is_ignored() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://example.com", "Example")).await;
    fx.directory.upsert(tab(2, 10, "https://other.com", "Other").with_active(false)).await;
    fx.clock.advance_secs(5);

    fx.directory.forget(ContextId::new(2)).await;
    let transition = fx.tracker.context_removed(ContextId::new(2)).await.unwrap();

    assert_eq!(transition.commit, None);
    assert_eq!(transition.slot.context_id(), Some(ContextId::new(1)));
}

#[tokio::test]
async fn test_navigation_in_selected_tab_restarts_timing() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://example.com", "Example")).await;
    fx.clock.advance_secs(6);

    // The interval is attributed to what the tab shows at close time
    fx.directory.upsert(tab(1, 10, "https://rust-lang.org", "Rust")).await;
    let transition = fx
        .tracker
        .navigation_completed(ContextId::new(1), LoadStatus::Complete)
        .await
        .unwrap();

    assert_eq!(transition.committed_seconds(), 6);
    assert_eq!(fx.seconds_for("rust-lang.org").await, 6);
    assert_eq!(fx.tracker.current().await.unwrap().since, fx.now());
}

#[tokio::test]
async fn test_navigation_still_loading_is_ignored() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://example.com", "Example")).await;
    fx.clock.advance_secs(6);

    let transition = fx
        .tracker
        .navigation_completed(ContextId::new(1), LoadStatus::Loading)
        .await
        .unwrap();

    assert_eq!(transition.commit, None);
    assert!(fx.ledger.snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_background_navigation_is_ignored() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://example.com", "Example")).await;
    fx.directory
        .upsert(tab(2, 10, "https://background.com", "Background").with_active(false))
        .await;
    fx.clock.advance_secs(6);

    let transition = fx
        .tracker
        .navigation_completed(ContextId::new(2), LoadStatus::Complete)
        .await
        .unwrap();

    assert_eq!(transition.commit, None);
    assert_eq!(fx.tracker.current().await.unwrap().context_id, ContextId::new(1));
}

#[tokio::test]
async fn test_focus_gained_times_the_windows_selected_tab() {
    let fx = TrackerFixture::new();

    fx.directory.activate(tab(1, 10, "https://a.com", "A")).await;
    fx.directory.activate(tab(2, 20, "https://b.com", "B")).await;

    fx.tracker.focus_gained(WindowId::new(10)).await.unwrap();
    fx.clock.advance_secs(5);
    fx.tracker.focus_lost().await.unwrap();
    fx.clock.advance_secs(100);
    fx.tracker.focus_gained(WindowId::new(20)).await.unwrap();
    fx.clock.advance_secs(6);
    fx.tracker.focus_lost().await.unwrap();

    assert_eq!(fx.seconds_for("a.com").await, 5);
    assert_eq!(fx.seconds_for("b.com").await, 6);
}

#[tokio::test]
async fn test_focus_gained_on_no_window_means_focus_lost() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://a.com", "A")).await;
    fx.clock.advance_secs(3);
    let transition = fx.tracker.focus_gained(WindowId::NONE).await.unwrap();

    assert_eq!(transition.committed_seconds(), 3);
    assert_eq!(transition.slot, TimingSlot::Idle);
}

#[tokio::test]
async fn test_flush_commits_and_keeps_timing() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://a.com", "A")).await;
    fx.clock.advance_secs(5);
    let transition = fx.tracker.flush().await.unwrap();

    assert_eq!(transition.committed_seconds(), 5);
    assert_eq!(transition.slot.context_id(), Some(ContextId::new(1)));
    assert_eq!(fx.seconds_for("a.com").await, 5);

    fx.clock.advance_secs(3);
    fx.tracker.focus_lost().await.unwrap();
    assert_eq!(fx.seconds_for("a.com").await, 8);
}

#[tokio::test]
async fn test_repeated_flushes_do_not_accumulate_rounding() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://a.com", "A")).await;
    fx.clock.advance(chrono::Duration::milliseconds(1_600));
    assert_eq!(fx.tracker.flush().await.unwrap().committed_seconds(), 2);

    // The next interval starts where the committed two seconds end
    let view = fx.tracker.current().await.expect("still timing");
    assert_eq!(view.since, t0() + chrono::Duration::seconds(2));

    fx.clock.advance(chrono::Duration::milliseconds(1_600));
    assert_eq!(fx.tracker.flush().await.unwrap().committed_seconds(), 1);

    fx.clock.advance(chrono::Duration::milliseconds(800));
    fx.tracker.focus_lost().await.unwrap();

    // 4.0s of real time, same as a single commit
    assert_eq!(fx.seconds_for("a.com").await, 4);
}

#[tokio::test]
async fn test_sub_second_flush_keeps_remainder() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://a.com", "A")).await;
    fx.clock.advance(chrono::Duration::milliseconds(400));
    let transition = fx.tracker.flush().await.unwrap();
    assert_eq!(transition.committed_seconds(), 0);
    assert_eq!(transition.slot.since(), Some(t0()));

    fx.clock.advance(chrono::Duration::milliseconds(400));
    assert_eq!(fx.tracker.flush().await.unwrap().committed_seconds(), 1);
    assert_eq!(fx.seconds_for("a.com").await, 1);
}

#[tokio::test]
async fn test_flush_when_idle_is_a_no_op() {
    let fx = TrackerFixture::new();
    let transition = fx.tracker.flush().await.unwrap();
    assert_eq!(transition.commit, None);
    assert!(transition.slot.is_idle());
}

#[tokio::test]
async fn test_sentinel_activation_is_ignored() {
    let fx = TrackerFixture::new();

    fx.activate(tab(1, 10, "https://a.com", "A")).await;
    fx.clock.advance_secs(3);
    let transition = fx.tracker.context_activated(ContextId::NONE).await.unwrap();

    assert_eq!(transition.commit, None);
    assert_eq!(transition.slot.context_id(), Some(ContextId::new(1)));
}

#[tokio::test]
async fn test_failed_ledger_write_still_clears_slot() {
    let dir = tempfile::tempdir().unwrap();
    // Parent directory never exists, so every write fails
    let ledger = Arc::new(LedgerStore::open(dir.path().join("missing").join("ledger.json")));
    let directory = ContextDirectory::new();
    let clock = ManualClock::new(t0());
    let tracker = spawn_tracker(
        Arc::new(directory.clone()),
        Arc::clone(&ledger),
        Arc::new(clock.clone()),
    );

    directory.activate(tab(1, 10, "https://a.com", "A")).await;
    tracker.context_activated(ContextId::new(1)).await.unwrap();
    clock.advance_secs(5);

    let transition = tracker.focus_lost().await.unwrap();
    assert!(matches!(transition.commit, Some(CommitOutcome::Failed(_))));
    assert_eq!(transition.slot, TimingSlot::Idle);
    assert!(tracker.current().await.is_none());
}
