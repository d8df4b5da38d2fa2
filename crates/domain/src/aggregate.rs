//! The aggregate root: the unit of consistency for one event stream.

use event_store::{AggregateSource, Event};

/// Tracks one aggregate's stream position and uncommitted events.
///
/// Sequence numbers for a root are dense and strictly increasing:
/// every recorded change takes exactly `sequence_no + 1`, starting at 1.
/// Uncommitted events are cleared only by the store, after a successful
/// write.
#[derive(Debug, Clone, Default)]
pub struct AggregateRoot {
    root_id: String,
    sequence_no: i64,
    new_changes: Vec<Event>,
}

impl AggregateRoot {
    /// Creates a root with no history.
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
            sequence_no: 0,
            new_changes: Vec::new(),
        }
    }

    /// The aggregate's identifier.
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// The sequence number of the latest recorded or applied event.
    pub fn sequence_no(&self) -> i64 {
        self.sequence_no
    }

    /// Records a new uncommitted event, stamping its stream position.
    ///
    /// Increments the sequence counter by exactly 1 and writes the new
    /// value into `meta.sequence_no` along with this root's id. Returns
    /// the stamped event as recorded.
    pub fn new_change(&mut self, mut event: Event) -> Event {
        self.sequence_no += 1;
        event.meta.sequence_no = self.sequence_no;
        event.meta.root_id = self.root_id.clone();
        self.new_changes.push(event.clone());
        event
    }

    /// Moves the stream position forward to a replayed event's sequence.
    ///
    /// Used during hydration; never moves the counter backwards.
    pub fn observe_sequence(&mut self, sequence_no: i64) {
        if sequence_no > self.sequence_no {
            self.sequence_no = sequence_no;
        }
    }
}

impl AggregateSource for AggregateRoot {
    fn uncommitted_events(&self) -> &[Event] {
        &self.new_changes
    }

    fn clear_uncommitted(&mut self) {
        self.new_changes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::{create_event, update_event};

    #[test]
    fn new_change_assigns_dense_sequence_from_one() {
        let mut root = AggregateRoot::new("blog-1");

        for i in 0..5 {
            root.new_change(update_event(
                "blog-1",
                "Blog",
                serde_json::json!({"n": i}),
            ));
        }

        let seqs: Vec<i64> = root
            .uncommitted_events()
            .iter()
            .map(|e| e.meta.sequence_no)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
        assert_eq!(root.sequence_no(), 5);
    }

    #[test]
    fn new_change_stamps_root_id() {
        let mut root = AggregateRoot::new("blog-1");
        let stamped = root.new_change(create_event("post-1", "Post", serde_json::json!({})));
        assert_eq!(stamped.meta.root_id, "blog-1");
        assert_eq!(stamped.meta.sequence_no, 1);
    }

    #[test]
    fn observe_sequence_never_regresses() {
        let mut root = AggregateRoot::new("blog-1");
        root.observe_sequence(4);
        root.observe_sequence(2);
        assert_eq!(root.sequence_no(), 4);

        // Next change continues after the observed head.
        let stamped = root.new_change(update_event("blog-1", "Blog", serde_json::json!({})));
        assert_eq!(stamped.meta.sequence_no, 5);
    }

    #[test]
    fn clear_uncommitted_keeps_sequence_counter() {
        let mut root = AggregateRoot::new("blog-1");
        root.new_change(create_event("blog-1", "Blog", serde_json::json!({})));
        root.clear_uncommitted();

        assert!(root.uncommitted_events().is_empty());
        assert_eq!(root.sequence_no(), 1);
    }
}
