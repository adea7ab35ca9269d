//! Shared per-document reader state.
//!
//! One [`DocState`] lives for the duration of a single document. It owns the
//! id allocator, the named translation tables dialect readers fill and
//! consult, the block-title directory used to resolve inter-block links, and
//! the outbound event queue with its swappable collection stack.

use std::collections::{HashMap, VecDeque};

use crate::event::{Event, Id};

// ============================================================================
// Id allocation
// ============================================================================

/// Allocates document-unique ids with a common prefix.
///
/// The numeric suffix increases strictly in allocation order, so generated
/// ids sort by creation time. Ids observed in the input move the counter
/// past them, keeping generated ids collision-free.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    prefix: String,
    next: u64,
}

impl IdAllocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        IdAllocator { prefix: prefix.into(), next: 1 }
    }

    /// The next unused id.
    pub fn fresh(&mut self) -> Id {
        let text = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        Id::from_trusted(text)
    }

    /// Note an id supplied by the document, so later [`Self::fresh`] calls
    /// never collide with it.
    pub fn observe(&mut self, id: &Id) {
        if let Some(rest) = id.as_str().strip_prefix(&self.prefix) {
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(n) = rest.parse::<u64>() {
                    self.next = self.next.max(n + 1);
                }
            }
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        IdAllocator::new("e")
    }
}

// ============================================================================
// Translation tables
// ============================================================================

/// Maps both symbolic keys and 1-based integer indices to declared ids.
///
/// Rows keep insertion order, so a token that parses as an integer can still
/// resolve positionally when it was never declared as a key.
#[derive(Debug, Default, Clone)]
pub struct TranslationTable {
    rows: Vec<Id>,
    keys: HashMap<String, Id>,
}

impl TranslationTable {
    pub fn new() -> Self {
        TranslationTable::default()
    }

    /// Append a row, optionally bound to a symbolic key.
    ///
    /// A duplicate key keeps its first binding.
    pub fn push(&mut self, key: Option<&str>, id: Id) {
        if let Some(key) = key {
            self.keys.entry(key.to_string()).or_insert_with(|| id.clone());
        }
        self.rows.push(id);
    }

    /// Bind an extra symbolic key to an id without adding a row.
    pub fn alias(&mut self, key: &str, id: Id) {
        self.keys.entry(key.to_string()).or_insert(id);
    }

    /// Row at a 1-based index.
    pub fn by_index(&self, index: usize) -> Option<&Id> {
        index.checked_sub(1).and_then(|i| self.rows.get(i))
    }

    pub fn by_key(&self, key: &str) -> Option<&Id> {
        self.keys.get(key)
    }

    /// Resolve a token: symbolic key first, then as a 1-based index.
    pub fn resolve(&self, token: &str) -> Option<&Id> {
        if let Some(id) = self.keys.get(token) {
            return Some(id);
        }
        token.parse::<usize>().ok().and_then(|index| self.by_index(index))
    }

    /// The key bound to an id, if any. Linear over the key set.
    pub fn label_of(&self, id: &Id) -> Option<&str> {
        self.keys
            .iter()
            .find(|(_, bound)| *bound == id)
            .map(|(key, _)| key.as_str())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.keys.clear();
    }
}

// ============================================================================
// Document state
// ============================================================================

/// Mutable state shared across one document read.
#[derive(Debug)]
pub struct DocState {
    pub(crate) ids: IdAllocator,
    pub(crate) tables: HashMap<String, TranslationTable>,
    titled_blocks: HashMap<(String, String), Id>,
    first_blocks: HashMap<String, Id>,
    queues: Vec<VecDeque<Event>>,
}

impl DocState {
    pub fn new() -> Self {
        DocState {
            ids: IdAllocator::default(),
            tables: HashMap::new(),
            titled_blocks: HashMap::new(),
            first_blocks: HashMap::new(),
            queues: vec![VecDeque::new()],
        }
    }

    /// The next unused document id.
    pub fn fresh_id(&mut self) -> Id {
        self.ids.fresh()
    }

    /// The named translation table, created empty on first use.
    pub fn table(&mut self, name: &str) -> &mut TranslationTable {
        self.tables.entry(name.to_string()).or_default()
    }

    pub fn table_ref(&self, name: &str) -> Option<&TranslationTable> {
        self.tables.get(name)
    }

    /// Record a block of `block_type` under its optional title.
    ///
    /// The first block of each type also becomes that type's default link
    /// target. Titles match case-insensitively.
    pub fn register_block(&mut self, block_type: &str, title: Option<&str>, id: Id) {
        let block_type = block_type.to_ascii_uppercase();
        if let Some(title) = title {
            self.titled_blocks
                .insert((block_type.clone(), title.to_ascii_uppercase()), id.clone());
        }
        self.first_blocks.entry(block_type).or_insert(id);
    }

    /// Resolve a link to a block: by title when given, otherwise to the
    /// first-seen block of the type.
    pub fn resolve_block(&self, block_type: &str, title: Option<&str>) -> Option<&Id> {
        let block_type = block_type.to_ascii_uppercase();
        match title {
            Some(title) => self
                .titled_blocks
                .get(&(block_type, title.to_ascii_uppercase())),
            None => self.first_blocks.get(&block_type),
        }
    }

    // ------------------------------------------------------------------
    // Event collections
    // ------------------------------------------------------------------

    /// Append an event to the current collection.
    pub fn emit(&mut self, event: Event) {
        if let Some(top) = self.queues.last_mut() {
            top.push_back(event);
        }
    }

    /// Start buffering events into a fresh collection.
    pub fn push_collection(&mut self) {
        self.queues.push(VecDeque::new());
    }

    /// Finish the current collection and return its events.
    ///
    /// Returns `None` when only the outbound queue remains; the outbound
    /// queue itself cannot be popped.
    pub fn pop_collection(&mut self) -> Option<VecDeque<Event>> {
        if self.queues.len() > 1 {
            self.queues.pop()
        } else {
            None
        }
    }

    /// Take the next event off the outbound queue.
    pub fn take_next(&mut self) -> Option<Event> {
        self.queues.first_mut().and_then(VecDeque::pop_front)
    }

    /// Look at the next outbound event without taking it.
    pub fn peek_front(&self) -> Option<&Event> {
        self.queues.first().and_then(VecDeque::front)
    }

    /// Whether any events are waiting on the outbound queue.
    pub fn has_pending(&self) -> bool {
        self.queues.first().is_some_and(|q| !q.is_empty())
    }
}

impl Default for DocState {
    fn default() -> Self {
        DocState::new()
    }
}
