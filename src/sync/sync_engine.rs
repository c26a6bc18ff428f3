use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use super::sync_store::NotificationStore;
use crate::notification::Notification;

/// Cache change announcements for a consuming UI.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A full fetch replaced the cache.
    Refreshed { total: usize },
    /// A delta fetch was merged in.
    Merged { added: usize, updated: usize },
    /// Ids optimistically flipped to read.
    MarkedRead(Vec<Uuid>),
    MarkedAllRead,
}

struct SyncState {
    cache: Vec<Notification>,
    last_fetched_at: Option<DateTime<Utc>>,
    is_open: bool,
    fetch_in_flight: bool,
    marking_all: bool,
    /// Optimistic read marks not yet confirmed by the store. A delta merge
    /// must not resurrect these as unread from a stale server copy.
    pending_read: HashSet<Uuid>,
}

/// Client-side cache of one recipient's notifications.
///
/// Kept approximately consistent with the server store through full fetches
/// (replace semantics, on panel open) and delta fetches (merge semantics, on
/// a poll timer), with optimistic read-state applied locally before the
/// confirmation round-trip. One instance serves exactly one recipient; an
/// empty recipient turns every operation into a no-op.
///
/// Transport failures never propagate to callers: the cache and cursor are
/// simply left unchanged and the failure is logged ("try again later").
#[derive(Clone)]
pub struct NotificationSync {
    recipient: String,
    store: Arc<dyn NotificationStore>,
    state: Arc<Mutex<SyncState>>,
    events: broadcast::Sender<SyncEvent>,
}

impl NotificationSync {
    pub fn new(recipient: impl Into<String>, store: Arc<dyn NotificationStore>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            recipient: recipient.into(),
            store,
            state: Arc::new(Mutex::new(SyncState {
                cache: Vec::new(),
                last_fetched_at: None,
                is_open: false,
                fetch_in_flight: false,
                marking_all: false,
                pending_read: HashSet::new(),
            })),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().expect("sync state lock poisoned")
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the cached notifications, newest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().cache.clone()
    }

    /// Derived on every call from the cache, never stored.
    pub fn unread_count(&self) -> usize {
        self.lock().cache.iter().filter(|n| !n.read).count()
    }

    pub fn last_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.lock().last_fetched_at
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_open
    }

    /// Busy indicator for the fetch operation class.
    pub fn is_fetching(&self) -> bool {
        self.lock().fetch_in_flight
    }

    /// Busy indicator for the mark-all operation class.
    pub fn is_marking_all(&self) -> bool {
        self.lock().marking_all
    }

    /// Panel opened. The first open on an empty cache performs the full
    /// fetch; while open, poll ticks are suppressed (see the sync service).
    pub async fn open(&self) {
        let needs_fetch = {
            let mut state = self.lock();
            state.is_open = true;
            state.cache.is_empty()
        };

        if needs_fetch {
            self.fetch_all().await;
        }
    }

    pub fn close(&self) {
        self.lock().is_open = false;
    }

    /// Replace the cache with the server's full current set.
    ///
    /// Returns `false` when the call was dropped (empty recipient, another
    /// fetch already in flight) or the transport failed; cache and cursor
    /// stay untouched in every non-success case. On success the cursor
    /// advances to the completion time and pending optimistic marks are
    /// discarded in favor of server truth.
    pub async fn fetch_all(&self) -> bool {
        if self.recipient.is_empty() {
            return false;
        }
        {
            let mut state = self.lock();
            if state.fetch_in_flight {
                debug!("fetch_all dropped, another fetch is in flight");
                return false;
            }
            state.fetch_in_flight = true;
        }

        let result = self.store.list(&self.recipient, None).await;
        let fetched_at = Utc::now();

        let mut state = self.lock();
        state.fetch_in_flight = false;
        match result {
            Ok(notifications) => {
                let total = notifications.len();
                state.cache = notifications;
                state.last_fetched_at = Some(fetched_at);
                state.pending_read.clear();
                drop(state);
                let _ = self.events.send(SyncEvent::Refreshed { total });
                true
            }
            Err(e) => {
                drop(state);
                warn!("full notification fetch failed: {e}");
                false
            }
        }
    }

    /// Delta fetch from the last successful fetch, merged into the cache by
    /// id with newest-first order re-applied. Degrades to a full fetch when
    /// no cursor exists yet. Shares the single-flight flag with
    /// [`fetch_all`](Self::fetch_all).
    pub async fn fetch_since(&self) -> bool {
        if self.recipient.is_empty() {
            return false;
        }
        let after = {
            let mut state = self.lock();
            match state.last_fetched_at {
                None => None,
                Some(after) => {
                    if state.fetch_in_flight {
                        debug!("fetch_since dropped, another fetch is in flight");
                        return false;
                    }
                    state.fetch_in_flight = true;
                    Some(after)
                }
            }
        };
        let Some(after) = after else {
            return self.fetch_all().await;
        };

        let result = self.store.list(&self.recipient, Some(after)).await;
        let fetched_at = Utc::now();

        let mut state = self.lock();
        state.fetch_in_flight = false;
        match result {
            Ok(incoming) => {
                let SyncState {
                    cache,
                    pending_read,
                    ..
                } = &mut *state;
                let (added, updated) = merge_into(cache, incoming, pending_read);
                state.last_fetched_at = Some(fetched_at);
                drop(state);
                if added + updated > 0 {
                    let _ = self.events.send(SyncEvent::Merged { added, updated });
                }
                true
            }
            Err(e) => {
                drop(state);
                warn!("delta notification fetch failed: {e}");
                false
            }
        }
    }

    /// Optimistically mark the given ids read, then confirm with the store.
    ///
    /// Ids absent from the cache or already read are filtered out; when
    /// nothing survives the filter no network call is made. A failed
    /// confirmation is not rolled back; the id stays pending so delta
    /// merges cannot revert it, and only the next full fetch re-adopts
    /// server truth.
    pub async fn mark_read(&self, ids: &[Uuid]) {
        if self.recipient.is_empty() {
            return;
        }

        let to_mark: Vec<Uuid> = {
            let mut state = self.lock();
            let SyncState {
                cache,
                pending_read,
                ..
            } = &mut *state;

            let to_mark: Vec<Uuid> = cache
                .iter()
                .filter(|n| !n.read && ids.contains(&n.id))
                .map(|n| n.id)
                .collect();
            for notification in cache.iter_mut().filter(|n| to_mark.contains(&n.id)) {
                notification.read = true;
            }
            pending_read.extend(to_mark.iter().copied());
            to_mark
        };
        if to_mark.is_empty() {
            return;
        }
        let _ = self.events.send(SyncEvent::MarkedRead(to_mark.clone()));

        match self.store.mark_read(&self.recipient, &to_mark).await {
            Ok(()) => {
                let mut state = self.lock();
                for id in &to_mark {
                    state.pending_read.remove(id);
                }
            }
            Err(e) => warn!("read confirmation failed, keeping optimistic state: {e}"),
        }
    }

    /// Batch variant of [`mark_read`](Self::mark_read) covering every
    /// currently-unread entry. Re-entrant calls while a batch is in flight
    /// are ignored; zero unread entries means zero network calls.
    pub async fn mark_all_read(&self) {
        if self.recipient.is_empty() {
            return;
        }

        let to_mark: Vec<Uuid> = {
            let mut state = self.lock();
            let SyncState {
                cache,
                pending_read,
                marking_all,
                ..
            } = &mut *state;

            if *marking_all {
                debug!("mark_all_read already in flight, ignoring");
                return;
            }
            let to_mark: Vec<Uuid> = cache.iter().filter(|n| !n.read).map(|n| n.id).collect();
            if to_mark.is_empty() {
                return;
            }
            for notification in cache.iter_mut() {
                notification.read = true;
            }
            pending_read.extend(to_mark.iter().copied());
            *marking_all = true;
            to_mark
        };
        let _ = self.events.send(SyncEvent::MarkedAllRead);

        let result = self.store.mark_all_read(&self.recipient).await;

        let mut state = self.lock();
        state.marking_all = false;
        match result {
            Ok(()) => {
                for id in &to_mark {
                    state.pending_read.remove(id);
                }
            }
            Err(e) => warn!("mark-all confirmation failed, keeping optimistic state: {e}"),
        }
    }
}

/// Merge `incoming` into `cache` by id: existing entries are replaced, new
/// ids inserted, newest-first order re-applied. An incoming record that
/// still shows unread loses to a pending optimistic mark.
fn merge_into(
    cache: &mut Vec<Notification>,
    incoming: Vec<Notification>,
    pending_read: &HashSet<Uuid>,
) -> (usize, usize) {
    let mut added = 0;
    let mut updated = 0;

    for mut notification in incoming {
        if !notification.read && pending_read.contains(&notification.id) {
            notification.read = true;
        }
        match cache.iter_mut().find(|existing| existing.id == notification.id) {
            Some(existing) => {
                *existing = notification;
                updated += 1;
            }
            None => {
                cache.push(notification);
                added += 1;
            }
        }
    }

    // created_at is immutable, so replacements cannot disturb the order.
    if added > 0 {
        cache.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    (added, updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MockStore {
        list_calls: AtomicUsize,
        mark_read_calls: AtomicUsize,
        mark_all_calls: AtomicUsize,
        list_response: Mutex<Vec<Notification>>,
        list_gate: Mutex<Option<Arc<Notify>>>,
        mark_all_gate: Mutex<Option<Arc<Notify>>>,
        fail_marks: AtomicBool,
    }

    impl MockStore {
        fn respond_with(&self, notifications: Vec<Notification>) {
            *self.list_response.lock().unwrap() = notifications;
        }

        fn hold_list(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.list_gate.lock().unwrap() = Some(gate.clone());
            gate
        }

        fn hold_mark_all(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.mark_all_gate.lock().unwrap() = Some(gate.clone());
            gate
        }
    }

    #[async_trait]
    impl NotificationStore for MockStore {
        async fn list(
            &self,
            _recipient: &str,
            _after: Option<DateTime<Utc>>,
        ) -> Result<Vec<Notification>, StoreError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.list_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            Ok(self.list_response.lock().unwrap().clone())
        }

        async fn mark_read(&self, _recipient: &str, _ids: &[Uuid]) -> Result<(), StoreError> {
            self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_marks.load(Ordering::SeqCst) {
                return Err(StoreError::UnexpectedResponse("mark rejected".into()));
            }
            Ok(())
        }

        async fn mark_all_read(&self, _recipient: &str) -> Result<(), StoreError> {
            self.mark_all_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.mark_all_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if self.fail_marks.load(Ordering::SeqCst) {
                return Err(StoreError::UnexpectedResponse("mark rejected".into()));
            }
            Ok(())
        }
    }

    fn notification(created_at: DateTime<Utc>, read: bool) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient: "a@b.com".to_string(),
            kind: "info".to_string(),
            title: None,
            message: "hello".to_string(),
            read,
            created_at,
            updated_at: created_at,
            metadata: None,
        }
    }

    fn sync_with(store: &Arc<MockStore>) -> NotificationSync {
        NotificationSync::new("a@b.com", store.clone() as Arc<dyn NotificationStore>)
    }

    #[tokio::test]
    async fn test_fetch_all_replaces_cache() {
        let store = Arc::new(MockStore::default());
        let now = Utc::now();
        let old_unread = notification(now - Duration::minutes(2), false);
        let old_read = notification(now - Duration::minutes(1), true);
        store.respond_with(vec![old_read.clone(), old_unread.clone()]);

        let sync = sync_with(&store);
        assert!(sync.fetch_all().await);
        assert_eq!(sync.notifications().len(), 2);

        let replacement = notification(now, false);
        store.respond_with(vec![replacement.clone()]);
        assert!(sync.fetch_all().await);

        let cache = sync.notifications();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache[0].id, replacement.id);
    }

    #[tokio::test]
    async fn test_fetch_since_merges_by_id() {
        let store = Arc::new(MockStore::default());
        let now = Utc::now();
        let first = notification(now - Duration::minutes(2), false);
        let second = notification(now - Duration::minutes(1), true);
        store.respond_with(vec![second.clone(), first.clone()]);

        let sync = sync_with(&store);
        assert!(sync.fetch_all().await);

        // Server copy of `first` flipped to read elsewhere; `second` absent
        // from the delta stays untouched.
        let mut first_updated = first.clone();
        first_updated.read = true;
        store.respond_with(vec![first_updated]);
        assert!(sync.fetch_since().await);

        let cache = sync.notifications();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache[0].id, second.id);
        assert_eq!(cache[1].id, first.id);
        assert!(cache.iter().all(|n| n.read));
        assert_eq!(sync.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_since_inserts_newest_first() {
        let store = Arc::new(MockStore::default());
        let now = Utc::now();
        let older = notification(now - Duration::minutes(5), false);
        store.respond_with(vec![older.clone()]);

        let sync = sync_with(&store);
        assert!(sync.fetch_all().await);

        let newer = notification(now, false);
        store.respond_with(vec![newer.clone()]);
        assert!(sync.fetch_since().await);

        let cache = sync.notifications();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache[0].id, newer.id);
        assert_eq!(cache[1].id, older.id);
    }

    #[tokio::test]
    async fn test_fetch_since_without_cursor_degrades_to_full_fetch() {
        let store = Arc::new(MockStore::default());
        store.respond_with(vec![notification(Utc::now(), false)]);

        let sync = sync_with(&store);
        assert!(sync.fetch_since().await);
        assert_eq!(sync.notifications().len(), 1);
        assert!(sync.last_fetched_at().is_some());
    }

    #[tokio::test]
    async fn test_cursor_advances_to_completion_time() {
        let store = Arc::new(MockStore::default());
        let sync = sync_with(&store);
        assert!(sync.fetch_all().await);

        // Incoming record claims a timestamp well in the future; the cursor
        // must track the fetch completion time, not the record.
        let future = Utc::now() + Duration::hours(1);
        store.respond_with(vec![notification(future, false)]);

        let before = Utc::now();
        assert!(sync.fetch_since().await);
        let after = Utc::now();

        assert_eq!(sync.notifications().len(), 1);
        let cursor = sync.last_fetched_at().unwrap();
        assert!(cursor >= before && cursor <= after);
        assert!(cursor < future);
    }

    #[tokio::test]
    async fn test_concurrent_fetch_is_single_flight() {
        let store = Arc::new(MockStore::default());
        let gate = store.hold_list();
        let sync = sync_with(&store);

        let first = tokio::spawn({
            let sync = sync.clone();
            async move { sync.fetch_all().await }
        });
        // Current-thread runtime: the spawned fetch runs up to the gate.
        tokio::task::yield_now().await;
        assert!(sync.is_fetching());

        // Second full fetch and a colliding poll-style delta are both dropped.
        assert!(!sync.fetch_all().await);
        assert!(!sync.fetch_since().await);

        gate.notify_one();
        assert!(first.await.unwrap());
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_cache_and_cursor() {
        struct FailingStore;

        #[async_trait]
        impl NotificationStore for FailingStore {
            async fn list(
                &self,
                _recipient: &str,
                _after: Option<DateTime<Utc>>,
            ) -> Result<Vec<Notification>, StoreError> {
                Err(StoreError::UnexpectedResponse("boom".into()))
            }
            async fn mark_read(&self, _: &str, _: &[Uuid]) -> Result<(), StoreError> {
                Ok(())
            }
            async fn mark_all_read(&self, _: &str) -> Result<(), StoreError> {
                Ok(())
            }
        }

        let sync = NotificationSync::new("a@b.com", Arc::new(FailingStore));
        assert!(!sync.fetch_all().await);
        assert!(sync.notifications().is_empty());
        assert!(sync.last_fetched_at().is_none());
        assert!(!sync.is_fetching());
    }

    #[tokio::test]
    async fn test_mark_read_is_optimistic_and_idempotent() {
        let store = Arc::new(MockStore::default());
        let target = notification(Utc::now(), false);
        store.respond_with(vec![target.clone()]);

        let sync = sync_with(&store);
        assert!(sync.fetch_all().await);
        assert_eq!(sync.unread_count(), 1);

        sync.mark_read(&[target.id]).await;
        assert_eq!(sync.unread_count(), 0);
        assert_eq!(store.mark_read_calls.load(Ordering::SeqCst), 1);

        // Already read: no second network call, cache unchanged.
        sync.mark_read(&[target.id]).await;
        assert_eq!(store.mark_read_calls.load(Ordering::SeqCst), 1);
        assert_eq!(sync.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_mark_read_unknown_id_is_noop() {
        let store = Arc::new(MockStore::default());
        let sync = sync_with(&store);
        assert!(sync.fetch_all().await);

        sync.mark_read(&[Uuid::new_v4()]).await;
        assert_eq!(store.mark_read_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_recipient_is_noop() {
        let store = Arc::new(MockStore::default());
        store.respond_with(vec![notification(Utc::now(), false)]);
        let sync = NotificationSync::new("", store.clone() as Arc<dyn NotificationStore>);

        assert!(!sync.fetch_all().await);
        assert!(!sync.fetch_since().await);
        sync.mark_read(&[Uuid::new_v4()]).await;
        sync.mark_all_read().await;

        assert!(sync.notifications().is_empty());
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.mark_read_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.mark_all_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let store = Arc::new(MockStore::default());
        let now = Utc::now();
        store.respond_with(vec![
            notification(now - Duration::minutes(2), false),
            notification(now - Duration::minutes(1), true),
            notification(now, false),
        ]);

        let sync = sync_with(&store);
        assert!(sync.fetch_all().await);
        assert_eq!(sync.unread_count(), 2);

        sync.mark_all_read().await;
        assert_eq!(sync.unread_count(), 0);
        assert_eq!(store.mark_all_calls.load(Ordering::SeqCst), 1);

        // Nothing unread left: no further network call.
        sync.mark_all_read().await;
        assert_eq!(store.mark_all_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mark_all_read_is_not_reentrant() {
        let store = Arc::new(MockStore::default());
        store.respond_with(vec![notification(Utc::now(), false)]);
        let gate = store.hold_mark_all();

        let sync = sync_with(&store);
        assert!(sync.fetch_all().await);

        let first = tokio::spawn({
            let sync = sync.clone();
            async move { sync.mark_all_read().await }
        });
        tokio::task::yield_now().await;
        assert!(sync.is_marking_all());

        sync.mark_all_read().await;
        gate.notify_one();
        first.await.unwrap();

        assert_eq!(store.mark_all_calls.load(Ordering::SeqCst), 1);
        assert!(!sync.is_marking_all());
    }

    #[tokio::test]
    async fn test_pending_mark_survives_stale_delta() {
        let store = Arc::new(MockStore::default());
        let target = notification(Utc::now(), false);
        store.respond_with(vec![target.clone()]);

        let sync = sync_with(&store);
        assert!(sync.fetch_all().await);

        // Confirmation fails; the optimistic flag is kept, not rolled back.
        store.fail_marks.store(true, Ordering::SeqCst);
        sync.mark_read(&[target.id]).await;
        assert_eq!(sync.unread_count(), 0);

        // A delta still carrying the stale unread copy must not resurrect it.
        store.respond_with(vec![target.clone()]);
        assert!(sync.fetch_since().await);
        assert_eq!(sync.unread_count(), 0);

        // A full fetch is the trusted baseline and does revert.
        assert!(sync.fetch_all().await);
        assert_eq!(sync.unread_count(), 1);
    }

    #[tokio::test]
    async fn test_open_fetches_once_for_empty_cache() {
        let store = Arc::new(MockStore::default());
        store.respond_with(vec![notification(Utc::now(), false)]);

        let sync = sync_with(&store);
        sync.open().await;
        assert!(sync.is_open());
        assert_eq!(sync.notifications().len(), 1);
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 1);

        // Reopening with a warm cache does not refetch.
        sync.close();
        assert!(!sync.is_open());
        sync.open().await;
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_events_announce_cache_changes() {
        let store = Arc::new(MockStore::default());
        let target = notification(Utc::now(), false);
        store.respond_with(vec![target.clone()]);

        let sync = sync_with(&store);
        let mut events = sync.subscribe();

        assert!(sync.fetch_all().await);
        assert!(matches!(
            events.recv().await.unwrap(),
            SyncEvent::Refreshed { total: 1 }
        ));

        sync.mark_read(&[target.id]).await;
        match events.recv().await.unwrap() {
            SyncEvent::MarkedRead(ids) => assert_eq!(ids, vec![target.id]),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
