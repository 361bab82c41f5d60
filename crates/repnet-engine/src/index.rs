//! In-memory statement index: exact entity labels and CIDR ranges.
//!
//! Ranged statements are kept in one ordering, sorted by `(min, max, id)`,
//! with a segment tree of maximum upper bounds laid over it. A point query
//! binary-searches the prefix of intervals with `min <= p` and then descends
//! only into subtrees whose maximum bound reaches `p`, so the cost is
//! `O(log n + k log n)` for `k` matches.
//!
//! Unranged statements are indexed by their entity labels.

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::{Arc, Mutex, PoisonError, RwLock},
};

use repnet_core::{
  bound::{Bound, CidrRange},
  id::StatementId,
  record::{Statement, StatementRecord},
};
use tracing::{info, warn};

// ─── Index ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Interval {
  min: Bound,
  max: Bound,
  id:  StatementId,
}

#[derive(Debug, Clone)]
enum Indexed {
  Ranged(CidrRange),
  Exact(Vec<String>),
}

/// One immutable version of the index. Mutations happen on a private clone
/// inside [`IndexHandle`].
#[derive(Debug, Clone, Default)]
pub struct CidrIndex {
  /// Sorted by `(min, max, id)`.
  ranged:  Vec<Interval>,
  /// Segment tree over `ranged`; node `i` has children `2i` and `2i + 1`,
  /// leaves start at `tree.len() / 2`. Padding leaves are `None`.
  tree:    Vec<Option<Bound>>,
  exact:   BTreeMap<String, BTreeSet<StatementId>>,
  entries: BTreeMap<StatementId, Indexed>,
}

impl CidrIndex {
  pub fn new() -> Self { Self::default() }

  /// Build an index in one pass.
  pub fn from_statements<'a>(statements: impl IntoIterator<Item = &'a Statement>) -> Self {
    let mut index = Self::new();
    for statement in statements {
      index.put(statement);
    }
    index.ranged.sort_unstable();
    index.rebuild_tree();
    index
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  pub fn contains(&self, id: StatementId) -> bool { self.entries.contains_key(&id) }

  /// Index a statement. Re-inserting an id replaces its previous entry.
  pub fn insert(&mut self, statement: &Statement) {
    let was_ranged = self.is_ranged(statement.id);
    self.forget(statement.id);
    if let Some(range) = statement.range {
      let interval = Interval { min: range.min(), max: range.max(), id: statement.id };
      let at = self.ranged.partition_point(|iv| *iv < interval);
      self.ranged.insert(at, interval);
      self.entries.insert(statement.id, Indexed::Ranged(range));
      self.rebuild_tree();
    } else {
      self.put(statement);
      if was_ranged {
        self.rebuild_tree();
      }
    }
  }

  /// Drop a statement. Returns whether it was indexed.
  pub fn remove(&mut self, id: StatementId) -> bool {
    let ranged = self.is_ranged(id);
    let removed = self.forget(id);
    if ranged {
      self.rebuild_tree();
    }
    removed
  }

  /// Ids of every ranged statement with `min <= p <= max`.
  pub fn query_point(&self, p: Bound) -> BTreeSet<StatementId> {
    let mut out = BTreeSet::new();
    let limit = self.ranged.partition_point(|iv| iv.min <= p);
    if limit > 0 {
      self.descend(1, 0, self.leaves(), limit, p, &mut out);
    }
    out
  }

  /// Ids of every ranged statement whose range covers all of `range`.
  pub fn query_covering(&self, range: CidrRange) -> BTreeSet<StatementId> {
    let mut out = self.query_point(range.min());
    if range.min() != range.max() {
      out.retain(|id| matches!(self.entries.get(id), Some(Indexed::Ranged(r)) if r.covers(range)));
    }
    out
  }

  /// Ids of unranged statements whose `entity_1` or `entity_2` equals `label`.
  pub fn query_exact(&self, label: &str) -> BTreeSet<StatementId> {
    self.exact.get(label).cloned().unwrap_or_default()
  }

  // ── internals ─────────────────────────────────────────────────────────────

  fn is_ranged(&self, id: StatementId) -> bool {
    matches!(self.entries.get(&id), Some(Indexed::Ranged(_)))
  }

  /// Record a statement without maintaining `ranged` order or the tree.
  fn put(&mut self, statement: &Statement) {
    match statement.range {
      Some(range) => {
        self.ranged.push(Interval { min: range.min(), max: range.max(), id: statement.id });
        self.entries.insert(statement.id, Indexed::Ranged(range));
      }
      None => {
        let labels: Vec<String> = statement.entities().map(str::to_owned).collect();
        for label in &labels {
          self.exact.entry(label.clone()).or_default().insert(statement.id);
        }
        self.entries.insert(statement.id, Indexed::Exact(labels));
      }
    }
  }

  /// Remove `id` from the maps and the ordering. The tree is left stale.
  fn forget(&mut self, id: StatementId) -> bool {
    match self.entries.remove(&id) {
      None => false,
      Some(Indexed::Ranged(range)) => {
        let interval = Interval { min: range.min(), max: range.max(), id };
        if let Ok(at) = self.ranged.binary_search(&interval) {
          self.ranged.remove(at);
        }
        true
      }
      Some(Indexed::Exact(labels)) => {
        for label in labels {
          if let Some(ids) = self.exact.get_mut(&label) {
            ids.remove(&id);
            if ids.is_empty() {
              self.exact.remove(&label);
            }
          }
        }
        true
      }
    }
  }

  fn leaves(&self) -> usize { self.tree.len() / 2 }

  fn rebuild_tree(&mut self) {
    if self.ranged.is_empty() {
      self.tree.clear();
      return;
    }
    let leaves = self.ranged.len().next_power_of_two();
    let mut tree = vec![None; 2 * leaves];
    for (i, iv) in self.ranged.iter().enumerate() {
      tree[leaves + i] = Some(iv.max);
    }
    for node in (1..leaves).rev() {
      tree[node] = tree[2 * node].max(tree[2 * node + 1]);
    }
    self.tree = tree;
  }

  /// Collect intervals in `[lo, hi)` with position `< limit` and
  /// `max >= p`. Every interval before `limit` already has `min <= p`.
  fn descend(
    &self,
    node: usize,
    lo: usize,
    hi: usize,
    limit: usize,
    p: Bound,
    out: &mut BTreeSet<StatementId>,
  ) {
    if lo >= limit {
      return;
    }
    match self.tree[node] {
      Some(max) if max >= p => {}
      _ => return,
    }
    if hi - lo == 1 {
      out.insert(self.ranged[lo].id);
      return;
    }
    let mid = lo + (hi - lo) / 2;
    self.descend(2 * node, lo, mid, limit, p, out);
    self.descend(2 * node + 1, mid, hi, limit, p, out);
  }
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// Shared, swappable reference to the current index version.
///
/// Readers take an `Arc` snapshot and keep using it for the whole
/// resolution. Writers are serialised; each one clones the current version,
/// applies its change, and publishes the result in a single swap.
#[derive(Debug, Clone, Default)]
pub struct IndexHandle {
  current: Arc<RwLock<Arc<CidrIndex>>>,
  writer:  Arc<Mutex<()>>,
}

impl IndexHandle {
  pub fn new(index: CidrIndex) -> Self {
    Self { current: Arc::new(RwLock::new(Arc::new(index))), writer: Arc::default() }
  }

  pub fn snapshot(&self) -> Arc<CidrIndex> {
    self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// Apply `change` to a copy of the current version and publish it.
  pub fn update<R>(&self, change: impl FnOnce(&mut CidrIndex) -> R) -> R {
    let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
    let mut next = CidrIndex::clone(&self.snapshot());
    let out = change(&mut next);
    self.publish(next);
    out
  }

  /// Replace the index with one built from a full store scan. Records that
  /// fail validation are logged and left out. Returns the number indexed.
  pub fn rebuild(&self, records: Vec<StatementRecord>) -> usize {
    let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
    let total = records.len();
    let statements: Vec<Statement> = records
      .into_iter()
      .filter_map(|record| {
        let id = record.id;
        Statement::try_from(record)
          .inspect_err(|e| warn!(statement = %id, error = %e, "skipping statement while indexing"))
          .ok()
      })
      .collect();
    let next = CidrIndex::from_statements(&statements);
    let indexed = next.len();
    self.publish(next);
    info!(indexed, skipped = total - statements.len(), "statement index rebuilt");
    indexed
  }

  fn publish(&self, next: CidrIndex) {
    *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
  }
}
