//! Classified watch events and per-kind event filters.
//!
//! Raw watcher output only distinguishes applies, deletes, and re-lists. The
//! [`Classifier`] folds that stream over a last-seen cache into the richer
//! event model the filters need: creates vs updates (with the old object),
//! directly observed deletes vs state-unknown deletes inferred from a re-list
//! gap, and generic resync events for objects re-observed on a re-list.

use std::collections::HashMap;

use kube::runtime::watcher;
use kube::{Resource, ResourceExt};

/// A classified change notification for one object of kind `K`.
#[derive(Debug, Clone)]
pub enum Event<K> {
    /// Object observed for the first time.
    Create {
        /// The new object
        obj: K,
    },
    /// Object changed; both generations are available to filters.
    Update {
        /// Last-seen generation
        old: K,
        /// Current generation
        new: K,
    },
    /// Object removed. `state_unknown` marks a delete inferred from a missed
    /// watch window rather than observed directly; acting on one risks a
    /// delete-then-recreate race with no guaranteed ordering.
    Delete {
        /// Last-seen generation
        obj: K,
        /// Whether the delete was inferred rather than observed
        state_unknown: bool,
    },
    /// Out-of-band resync: the object was re-observed on a watch re-list.
    Generic {
        /// Current generation
        obj: K,
    },
}

impl<K: Resource> Event<K> {
    /// Name of the object the event concerns.
    pub fn name(&self) -> String {
        match self {
            Event::Create { obj } | Event::Generic { obj } | Event::Delete { obj, .. } => {
                obj.name_any()
            }
            Event::Update { new, .. } => new.name_any(),
        }
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Create { .. } => "create",
            Event::Update { .. } => "update",
            Event::Delete { .. } => "delete",
            Event::Generic { .. } => "generic",
        }
    }
}

/// Per-kind relevance policy, applied before anything reaches the work queue.
///
/// Methods default to accepting; a filter overrides the cases it wants to
/// suppress. `relevant` dispatches a classified event to the right method.
pub trait EventFilter<K>: Send + Sync {
    /// Relevance of a first observation.
    fn create(&self, _obj: &K) -> bool {
        true
    }

    /// Relevance of a change; the old generation decides.
    fn update(&self, _old: &K, _new: &K) -> bool {
        true
    }

    /// Relevance of a removal.
    fn delete(&self, _obj: &K, _state_unknown: bool) -> bool {
        true
    }

    /// Relevance of a resync observation.
    fn generic(&self, _obj: &K) -> bool {
        true
    }

    /// Dispatch a classified event.
    fn relevant(&self, event: &Event<K>) -> bool {
        match event {
            Event::Create { obj } => self.create(obj),
            Event::Update { old, new } => self.update(old, new),
            Event::Delete { obj, state_unknown } => self.delete(obj, *state_unknown),
            Event::Generic { obj } => self.generic(obj),
        }
    }
}

/// Folds raw watcher events into classified [`Event`]s.
///
/// Keeps the last-seen object per name. During a re-list the incoming page is
/// buffered; on completion, cached names missing from the page become
/// state-unknown deletes and re-observed names become generic events.
pub struct Classifier<K> {
    known: HashMap<String, K>,
    relist: Option<HashMap<String, K>>,
}

impl<K> Default for Classifier<K> {
    fn default() -> Self {
        Self {
            known: HashMap::new(),
            relist: None,
        }
    }
}

impl<K> Classifier<K>
where
    K: Resource + Clone,
{
    /// Create an empty classifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one raw watcher event into zero or more [`Event`]s.
    pub fn classify(&mut self, raw: watcher::Event<K>) -> Vec<Event<K>> {
        match raw {
            watcher::Event::Apply(obj) => {
                let name = obj.name_any();
                match self.known.insert(name, obj.clone()) {
                    Some(old) => vec![Event::Update { old, new: obj }],
                    None => vec![Event::Create { obj }],
                }
            }
            watcher::Event::Delete(obj) => {
                self.known.remove(&obj.name_any());
                vec![Event::Delete {
                    obj,
                    state_unknown: false,
                }]
            }
            watcher::Event::Init => {
                self.relist = Some(HashMap::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                if let Some(page) = self.relist.as_mut() {
                    page.insert(obj.name_any(), obj);
                }
                Vec::new()
            }
            watcher::Event::InitDone => {
                let Some(page) = self.relist.take() else {
                    return Vec::new();
                };
                let mut events = Vec::new();

                // Names we knew that did not come back: the delete happened
                // inside the watch gap, so its ordering is unknown.
                let vanished: Vec<String> = self
                    .known
                    .keys()
                    .filter(|name| !page.contains_key(*name))
                    .cloned()
                    .collect();
                for name in vanished {
                    if let Some(obj) = self.known.remove(&name) {
                        events.push(Event::Delete {
                            obj,
                            state_unknown: true,
                        });
                    }
                }

                for (name, obj) in page {
                    let previously_known = self.known.insert(name, obj.clone()).is_some();
                    if previously_known {
                        events.push(Event::Generic { obj });
                    } else {
                        events.push(Event::Create { obj });
                    }
                }
                events
            }
        }
    }
}
