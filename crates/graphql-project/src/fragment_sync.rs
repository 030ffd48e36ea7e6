//! Projects the GraphQL fragments embedded in a host file onto stable virtual
//! documents for a delegate language server.
//!
//! Each fragment slot keeps a fractional index across edits, so an edit that
//! only moves fragments around produces no events at all.

use crate::fractional_index::generate_key_between;
use crate::FractionalIndexError;
use async_trait::async_trait;
use graphql_extract::SourceFragment;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// A fragment together with its stable key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRecord {
    pub fractional_index: String,
    pub source: SourceFragment,
}

/// Virtual document notifications for the delegate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Open { uri: String, text: String },
    Change { uri: String, text: String },
    Close { uri: String },
}

impl SyncEvent {
    #[must_use]
    pub fn uri(&self) -> &str {
        match self {
            Self::Open { uri, .. } | Self::Change { uri, .. } | Self::Close { uri } => uri,
        }
    }
}

/// Result of diffing a file's fragments against its previous records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncDiff {
    pub records: Vec<FragmentRecord>,
    pub events: Vec<SyncEvent>,
}

/// URI of the virtual document for one fragment slot
#[must_use]
pub fn virtual_uri(host_uri: &str, fractional_index: &str) -> String {
    format!("{host_uri}/{fractional_index}.graphql")
}

fn start_line(source: &SourceFragment) -> isize {
    isize::try_from(source.location_offset.line).unwrap_or(isize::MAX)
}

fn newline_count(source: &SourceFragment) -> isize {
    isize::try_from(source.body.matches('\n').count()).unwrap_or(isize::MAX)
}

/// Match freshly extracted fragments against the previous records in one
/// forward pass over both lists.
///
/// Both lists must be in document order. For each new fragment, the next old
/// record is kept when its body is unchanged, or when it sits where the old
/// record would now be after earlier line shifts. A new fragment that starts
/// before that point is an insertion and gets a key between its neighbours.
/// Anything else means the old record was deleted.
pub fn diff_fragments(
    host_uri: &str,
    old: &[FragmentRecord],
    new: Vec<SourceFragment>,
) -> Result<SyncDiff, FractionalIndexError> {
    let mut diff = SyncDiff {
        records: Vec::with_capacity(new.len()),
        events: Vec::new(),
    };
    let mut old_records = old.iter().peekable();
    let mut offset_correction: isize = 0;

    for fragment in new {
        let line = start_line(&fragment);

        loop {
            let next_old = old_records.peek().copied();
            let last_key = diff.records.last().map(|r| r.fractional_index.as_str());

            match next_old {
                Some(previous) if previous.source.body == fragment.body => {
                    offset_correction = line - start_line(&previous.source);
                    old_records.next();
                    diff.records.push(FragmentRecord {
                        fractional_index: previous.fractional_index.clone(),
                        source: fragment,
                    });
                }
                Some(previous) if line == start_line(&previous.source) + offset_correction => {
                    offset_correction = line - start_line(&previous.source);
                    old_records.next();
                    diff.events.push(SyncEvent::Change {
                        uri: virtual_uri(host_uri, &previous.fractional_index),
                        text: fragment.body.clone(),
                    });
                    diff.records.push(FragmentRecord {
                        fractional_index: previous.fractional_index.clone(),
                        source: fragment,
                    });
                }
                Some(previous) if line >= start_line(&previous.source) + offset_correction => {
                    old_records.next();
                    diff.events.push(SyncEvent::Close {
                        uri: virtual_uri(host_uri, &previous.fractional_index),
                    });
                    continue;
                }
                _ => {
                    let key = generate_key_between(
                        last_key,
                        next_old.map(|r| r.fractional_index.as_str()),
                    )?;
                    offset_correction += newline_count(&fragment);
                    diff.events.push(SyncEvent::Open {
                        uri: virtual_uri(host_uri, &key),
                        text: fragment.body.clone(),
                    });
                    diff.records.push(FragmentRecord {
                        fractional_index: key,
                        source: fragment,
                    });
                }
            }
            break;
        }
    }

    diff.events.extend(old_records.map(|record| SyncEvent::Close {
        uri: virtual_uri(host_uri, &record.fractional_index),
    }));
    Ok(diff)
}

/// Receives virtual document notifications
#[async_trait]
pub trait DelegateConnection: Send + Sync {
    async fn send(&self, event: SyncEvent);
}

#[derive(Default)]
struct Pending {
    in_flight: bool,
    /// Latest unsynced fragments per host file
    queued: Vec<(String, Vec<SourceFragment>)>,
}

/// Keeps the delegate's virtual documents in step with host files.
///
/// At most one sync runs at a time. Updates that arrive meanwhile are queued,
/// and a newer update for the same file replaces the queued one.
pub struct DocumentSynchronizer {
    delegate: Arc<dyn DelegateConnection>,
    records: Mutex<HashMap<String, Vec<FragmentRecord>>>,
    pending: Mutex<Pending>,
}

/// Clears `in_flight` if a sync loop is cancelled or unwinds
struct InFlight<'a> {
    pending: &'a Mutex<Pending>,
    finished: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .in_flight = false;
        }
    }
}

impl DocumentSynchronizer {
    #[must_use]
    pub fn new(delegate: Arc<dyn DelegateConnection>) -> Self {
        Self {
            delegate,
            records: Mutex::new(HashMap::new()),
            pending: Mutex::new(Pending::default()),
        }
    }

    /// Current records for a host file
    #[must_use]
    pub fn records(&self, host_uri: &str) -> Vec<FragmentRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host_uri)
            .cloned()
            .unwrap_or_default()
    }

    /// Sync a host file's freshly extracted fragments
    pub async fn update(&self, host_uri: &str, fragments: Vec<SourceFragment>) {
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if pending.in_flight {
                match pending.queued.iter_mut().find(|(uri, _)| uri == host_uri) {
                    Some(entry) => entry.1 = fragments,
                    None => pending.queued.push((host_uri.to_string(), fragments)),
                }
                tracing::trace!(uri = host_uri, "Sync in flight; queued update");
                return;
            }
            pending.in_flight = true;
        }
        let mut in_flight = InFlight {
            pending: &self.pending,
            finished: false,
        };

        let mut next = Some((host_uri.to_string(), fragments));
        while let Some((uri, fragments)) = next {
            self.sync(&uri, fragments).await;
            next = {
                let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
                if pending.queued.is_empty() {
                    // Released under the same lock that saw the empty queue,
                    // so a concurrent update either queues before or runs itself
                    pending.in_flight = false;
                    in_flight.finished = true;
                    None
                } else {
                    Some(pending.queued.remove(0))
                }
            };
        }
    }

    /// Close every virtual document of a host file
    pub async fn close(&self, host_uri: &str) {
        let removed = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(host_uri)
            .unwrap_or_default();
        for record in removed {
            self.delegate
                .send(SyncEvent::Close {
                    uri: virtual_uri(host_uri, &record.fractional_index),
                })
                .await;
        }
    }

    async fn sync(&self, host_uri: &str, fragments: Vec<SourceFragment>) {
        let diff = {
            let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
            let old = records.get(host_uri).map(Vec::as_slice).unwrap_or_default();
            diff_fragments(host_uri, old, fragments)
        };

        let diff = match diff {
            Ok(diff) => diff,
            Err(e) => {
                tracing::error!(uri = host_uri, error = %e, "Failed to diff embedded documents");
                return;
            }
        };

        tracing::debug!(
            uri = host_uri,
            fragments = diff.records.len(),
            events = diff.events.len(),
            "Synchronized embedded documents"
        );

        {
            let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
            if diff.records.is_empty() {
                records.remove(host_uri);
            } else {
                records.insert(host_uri.to_string(), diff.records);
            }
        }

        for event in diff.events {
            self.delegate.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphql_extract::LocationOffset;
    use tokio::sync::Notify;

    const HOST: &str = "file:///src/app.ts";

    fn fragment(body: &str, line: usize) -> SourceFragment {
        SourceFragment::new(body, HOST, LocationOffset::new(line, 20))
    }

    fn test1() -> &'static str {
        "\n  query Test1 {\n    hero { name }\n  }\n"
    }

    fn test2() -> &'static str {
        "\n  query Test2 {\n    droid { id }\n  }\n"
    }

    fn test3() -> &'static str {
        "\n  query Test3 {\n    me\n  }\n"
    }

    fn initial() -> Vec<FragmentRecord> {
        diff_fragments(HOST, &[], vec![fragment(test1(), 3), fragment(test2(), 11)])
            .unwrap()
            .records
    }

    fn keys(records: &[FragmentRecord]) -> Vec<&str> {
        records.iter().map(|r| r.fractional_index.as_str()).collect()
    }

    #[test]
    fn test_initial_sync_opens_every_fragment() {
        let diff =
            diff_fragments(HOST, &[], vec![fragment(test1(), 3), fragment(test2(), 11)]).unwrap();
        assert_eq!(keys(&diff.records), vec!["a0", "a1"]);
        assert_eq!(
            diff.events,
            vec![
                SyncEvent::Open {
                    uri: format!("{HOST}/a0.graphql"),
                    text: test1().to_string()
                },
                SyncEvent::Open {
                    uri: format!("{HOST}/a1.graphql"),
                    text: test2().to_string()
                },
            ]
        );
    }

    #[test]
    fn test_shifted_fragments_keep_identity() {
        let old = initial();
        let diff =
            diff_fragments(HOST, &old, vec![fragment(test1(), 5), fragment(test2(), 13)]).unwrap();

        assert_eq!(keys(&diff.records), vec!["a0", "a1"]);
        assert_eq!(diff.records[0].source.location_offset.line, 5);
        assert_eq!(diff.records[1].source.location_offset.line, 13);
        assert!(diff.events.is_empty());
    }

    #[test]
    fn test_inserted_fragment_gets_key_between_neighbours() {
        let old = initial();
        let diff = diff_fragments(
            HOST,
            &old,
            vec![
                fragment(test1(), 3),
                fragment(test3(), 8),
                fragment(test2(), 15),
            ],
        )
        .unwrap();

        assert_eq!(keys(&diff.records), vec!["a0", "a0V", "a1"]);
        assert_eq!(
            diff.events,
            vec![SyncEvent::Open {
                uri: format!("{HOST}/a0V.graphql"),
                text: test3().to_string()
            }]
        );
    }

    #[test]
    fn test_deleted_fragment_is_closed() {
        let old = initial();
        let diff = diff_fragments(HOST, &old, vec![fragment(test1(), 2)]).unwrap();

        assert_eq!(keys(&diff.records), vec!["a0"]);
        assert_eq!(diff.records[0].source.location_offset.line, 2);
        assert_eq!(
            diff.events,
            vec![SyncEvent::Close {
                uri: format!("{HOST}/a1.graphql")
            }]
        );
    }

    #[test]
    fn test_deleting_first_fragment() {
        let old = initial();
        let diff = diff_fragments(HOST, &old, vec![fragment(test2(), 6)]).unwrap();

        assert_eq!(keys(&diff.records), vec!["a1"]);
        assert_eq!(
            diff.events,
            vec![SyncEvent::Close {
                uri: format!("{HOST}/a0.graphql")
            }]
        );
    }

    #[test]
    fn test_edited_body_in_place_is_a_change() {
        let old = initial();
        let edited = "\n  query Test1 {\n    hero { name id }\n  }\n";
        let diff =
            diff_fragments(HOST, &old, vec![fragment(edited, 3), fragment(test2(), 11)]).unwrap();

        assert_eq!(keys(&diff.records), vec!["a0", "a1"]);
        assert_eq!(
            diff.events,
            vec![SyncEvent::Change {
                uri: format!("{HOST}/a0.graphql"),
                text: edited.to_string()
            }]
        );
    }

    #[test]
    fn test_no_op_diff_is_idempotent() {
        let old = initial();
        let fragments = vec![fragment(test1(), 3), fragment(test2(), 11)];

        let first = diff_fragments(HOST, &old, fragments.clone()).unwrap();
        let second = diff_fragments(HOST, &first.records, fragments).unwrap();

        assert_eq!(first.records, old);
        assert_eq!(second.records, old);
        assert!(first.events.is_empty());
        assert!(second.events.is_empty());
    }

    #[test]
    fn test_many_insertions_stay_ordered() {
        let mut records = initial();
        for i in 0..200 {
            // Each pass adds a fragment after the first one, pushing the rest down
            let mut fragments: Vec<SourceFragment> =
                records.iter().map(|r| r.source.clone()).collect();
            for f in fragments.iter_mut().skip(1) {
                f.location_offset.line += 2;
            }
            fragments.insert(1, fragment(&format!("query Insert{i} {{ me }}"), 4));
            records = diff_fragments(HOST, &records, fragments).unwrap().records;

            let keys = keys(&records);
            assert!(keys.windows(2).all(|w| w[0] < w[1]), "unordered: {keys:?}");
        }
        assert_eq!(records.len(), 202);
        assert_eq!(records.first().unwrap().fractional_index, "a0");
        assert_eq!(records.last().unwrap().fractional_index, "a1");
    }

    /// Records events; blocks the first send until released
    #[derive(Default)]
    struct RecordingDelegate {
        events: Mutex<Vec<SyncEvent>>,
        gate: Notify,
        gated: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl DelegateConnection for RecordingDelegate {
        async fn send(&self, event: SyncEvent) {
            if !self.gated.swap(true, std::sync::atomic::Ordering::SeqCst) {
                self.gate.notified().await;
            }
            self.events.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn test_queued_updates_are_last_edit_wins() {
        let delegate = Arc::new(RecordingDelegate::default());
        let synchronizer = Arc::new(DocumentSynchronizer::new(
            delegate.clone() as Arc<dyn DelegateConnection>
        ));

        let first = {
            let synchronizer = Arc::clone(&synchronizer);
            tokio::spawn(async move {
                synchronizer
                    .update(HOST, vec![fragment("query A { a }", 1)])
                    .await;
            })
        };
        tokio::task::yield_now().await;
        while !delegate.gated.load(std::sync::atomic::Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        // Both arrive while the first sync is blocked; only the last is applied
        synchronizer
            .update(HOST, vec![fragment("query B { b }", 1)])
            .await;
        synchronizer
            .update(HOST, vec![fragment("query C { c }", 1)])
            .await;

        delegate.gate.notify_one();
        first.await.unwrap();

        let events = delegate.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                SyncEvent::Open {
                    uri: format!("{HOST}/a0.graphql"),
                    text: "query A { a }".to_string()
                },
                SyncEvent::Change {
                    uri: format!("{HOST}/a0.graphql"),
                    text: "query C { c }".to_string()
                },
            ]
        );
        assert_eq!(synchronizer.records(HOST).len(), 1);

        synchronizer.close(HOST).await;
        assert!(synchronizer.records(HOST).is_empty());
        assert_eq!(
            delegate.events.lock().unwrap().last(),
            Some(&SyncEvent::Close {
                uri: format!("{HOST}/a0.graphql")
            })
        );
    }

    /// Yields on every send so syncs interleave across worker threads
    #[derive(Default)]
    struct YieldingDelegate;

    #[async_trait]
    impl DelegateConnection for YieldingDelegate {
        async fn send(&self, _event: SyncEvent) {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_for_different_files_all_apply() {
        const OTHER: &str = "file:///src/other.ts";

        for round in 0..500 {
            let synchronizer = Arc::new(DocumentSynchronizer::new(Arc::new(YieldingDelegate)));
            let tasks = [HOST, OTHER].map(|host| {
                let synchronizer = Arc::clone(&synchronizer);
                tokio::spawn(async move {
                    let fragment =
                        SourceFragment::new("query A { a }", host, LocationOffset::new(1, 1));
                    synchronizer.update(host, vec![fragment]).await;
                })
            });
            for task in tasks {
                task.await.unwrap();
            }

            assert_eq!(synchronizer.records(HOST).len(), 1, "round {round}");
            assert_eq!(synchronizer.records(OTHER).len(), 1, "round {round}");
        }
    }

    #[tokio::test]
    async fn test_cancelled_sync_releases_in_flight() {
        let delegate = Arc::new(RecordingDelegate::default());
        let synchronizer =
            DocumentSynchronizer::new(delegate.clone() as Arc<dyn DelegateConnection>);

        // The first send blocks on the gate; the timeout drops the sync mid-way
        let blocked = synchronizer.update(HOST, vec![fragment("query A { a }", 1)]);
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(20), blocked)
                .await
                .is_err()
        );

        synchronizer
            .update(HOST, vec![fragment("query B { b }", 1)])
            .await;
        assert_eq!(synchronizer.records(HOST)[0].source.body, "query B { b }");
    }
}
