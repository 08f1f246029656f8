//! Reply threads
//!
//! A thread is a tree of reply nodes rooted at its post. The root stands
//! for the post itself (its favorites are the post's favorites) and has
//! no author of its own.
//!
//! Locking is per node: adding or removing a reply locks only the
//! parent's child list, so siblings elsewhere in the tree can be edited
//! concurrently. Nodes point to their parent with a `Weak`, keeping the
//! ownership graph a tree.
//!
//! Favorite state is tracked per (node, actor) in a ledger owned by the
//! thread. A node's count starts from its stored total and only changes
//! through `toggle_favorite` / `set_favorite`.
//!
//! Every walk over the tree (search, detaching, snapshots, copies and
//! drops) uses an explicit stack, so thread depth is bounded by memory
//! rather than by the call stack.

use std::collections::HashSet;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};

use super::lookup::{AccountSummary, EntityDirectory};
use super::models::{AccountRef, EntityId};
use crate::error::{AppError, Result, ValidationErrors};
use crate::metrics::REPLY_OPERATIONS_TOTAL;

type FavoriteKey = (EntityId, AccountRef);

/// Source of per-thread ownership tokens
static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

fn next_thread_token() -> u64 {
    NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed)
}

// =============================================================================
// Reply Node
// =============================================================================

/// A comment and its nested replies
#[derive(Debug)]
pub struct ReplyNode {
    id: EntityId,
    author: Option<AccountRef>,
    body: String,
    created_at: DateTime<Utc>,
    depth: usize,
    parent: Weak<ReplyNode>,
    /// Token of the thread this node was created in
    thread: u64,
    /// Child replies in insertion (chronological) order
    replies: RwLock<Vec<Arc<ReplyNode>>>,
    favorite_count: AtomicU64,
    detached: AtomicBool,
}

impl ReplyNode {
    fn new(
        thread: u64,
        parent: Option<&Arc<ReplyNode>>,
        id: EntityId,
        author: Option<AccountRef>,
        body: String,
        created_at: DateTime<Utc>,
        favorite_count: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            author,
            body,
            created_at,
            depth: parent.map_or(0, |parent| parent.depth + 1),
            parent: parent.map_or_else(Weak::new, Arc::downgrade),
            thread,
            replies: RwLock::new(Vec::new()),
            favorite_count: AtomicU64::new(favorite_count),
            detached: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Author; `None` only for a thread root
    pub fn author(&self) -> Option<AccountRef> {
        self.author
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Distance from the root (root = 0)
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<Arc<ReplyNode>> {
        self.parent.upgrade()
    }

    pub fn favorite_count(&self) -> u64 {
        self.favorite_count.load(Ordering::SeqCst)
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    /// Direct replies, oldest first
    pub fn replies(&self) -> Vec<Arc<ReplyNode>> {
        self.read_replies().clone()
    }

    pub fn reply_count(&self) -> usize {
        self.read_replies().len()
    }

    fn read_replies(&self) -> RwLockReadGuard<'_, Vec<Arc<ReplyNode>>> {
        // Writers never panic between checks and the write, so a poisoned
        // list is still consistent.
        self.replies.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_replies(&self) -> RwLockWriteGuard<'_, Vec<Arc<ReplyNode>>> {
        self.replies.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of this node's own fields for another thread, without children
    fn copy_into(&self, thread: u64, parent: Option<&Arc<ReplyNode>>) -> Arc<ReplyNode> {
        Self::new(
            thread,
            parent,
            self.id.clone(),
            self.author,
            self.body.clone(),
            self.created_at,
            self.favorite_count(),
        )
    }

    /// Detach this node and its subtree; returns the detached ids
    ///
    /// A node is flagged before its children are read, so an `add_reply`
    /// racing the removal either lands before the read or sees the flag.
    fn mark_detached(self: &Arc<Self>) -> Vec<EntityId> {
        let mut removed = Vec::new();
        let mut pending = vec![Arc::clone(self)];
        while let Some(node) = pending.pop() {
            node.detached.store(true, Ordering::SeqCst);
            removed.push(node.id.clone());
            pending.extend(node.read_replies().iter().cloned());
        }
        removed
    }

    /// Pre-order walk of this node and its subtree
    fn visit(self: &Arc<Self>, mut f: impl FnMut(&Arc<ReplyNode>)) {
        let mut pending = vec![Arc::clone(self)];
        while let Some(node) = pending.pop() {
            f(&node);
            pending.extend(node.read_replies().iter().rev().cloned());
        }
    }
}

impl Drop for ReplyNode {
    fn drop(&mut self) {
        // Unlink uniquely owned descendants one level at a time so a long
        // chain does not drop recursively.
        let mut pending = mem::take(self.replies.get_mut().unwrap_or_else(PoisonError::into_inner));
        while let Some(child) = pending.pop() {
            if let Ok(mut child) = Arc::try_unwrap(child) {
                pending.append(child.replies.get_mut().unwrap_or_else(PoisonError::into_inner));
            }
        }
    }
}

/// Favorite state after a favorite operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteState {
    pub favorited: bool,
    pub favorite_count: u64,
}

// =============================================================================
// Reply Thread
// =============================================================================

/// Tree of replies owned by one post
#[derive(Debug)]
pub struct ReplyThread {
    /// Shared by every node created in this thread
    token: u64,
    root: Arc<ReplyNode>,
    /// (node, actor) -> when the actor favorited the node
    favorites: DashMap<FavoriteKey, DateTime<Utc>>,
}

impl ReplyThread {
    /// Empty thread
    pub fn new() -> Self {
        let token = next_thread_token();
        Self {
            token,
            root: ReplyNode::new(token, None, EntityId::new(), None, String::new(), Utc::now(), 0),
            favorites: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Arc<ReplyNode> {
        &self.root
    }

    /// Append a reply to `parent`
    ///
    /// Replies are kept in call order. Only `parent`'s child list is
    /// locked.
    ///
    /// # Errors
    /// `DetachedNode` if `parent` was removed or belongs to another thread
    pub fn add_reply(
        &self,
        parent: &Arc<ReplyNode>,
        author: AccountRef,
        body: impl Into<String>,
    ) -> Result<Arc<ReplyNode>> {
        self.ensure_attached(parent)?;

        let mut replies = parent.write_replies();
        // Re-check under the lock: a concurrent removal flags the parent
        // before reading its list.
        if parent.is_detached() {
            return Err(AppError::DetachedNode(parent.id.to_string()).recorded());
        }

        let child = ReplyNode::new(
            self.token,
            Some(parent),
            EntityId::new(),
            Some(author),
            body.into(),
            Utc::now(),
            0,
        );
        replies.push(Arc::clone(&child));
        drop(replies);

        REPLY_OPERATIONS_TOTAL.with_label_values(&["add"]).inc();
        tracing::debug!(
            parent_id = %parent.id,
            reply_id = %child.id,
            author = %author,
            depth = child.depth,
            "Reply added"
        );
        Ok(child)
    }

    /// Remove the reply `child_id` (and its subtree) from `parent`
    ///
    /// Every removed node becomes detached and its favorites are dropped
    /// from the ledger.
    ///
    /// # Errors
    /// `DetachedNode` if `parent` is detached or has no such reply
    pub fn remove_reply(&self, parent: &Arc<ReplyNode>, child_id: &EntityId) -> Result<Arc<ReplyNode>> {
        self.ensure_attached(parent)?;

        let mut replies = parent.write_replies();
        let position = replies
            .iter()
            .position(|reply| &reply.id == child_id)
            .ok_or_else(|| AppError::DetachedNode(child_id.to_string()).recorded())?;
        let removed = replies.remove(position);
        drop(replies);

        let removed_ids: HashSet<EntityId> = removed.mark_detached().into_iter().collect();
        self.favorites
            .retain(|(node_id, _), _| !removed_ids.contains(node_id));

        REPLY_OPERATIONS_TOTAL.with_label_values(&["remove"]).inc();
        tracing::debug!(
            parent_id = %parent.id,
            reply_id = %child_id,
            removed = removed_ids.len(),
            "Reply removed"
        );
        Ok(removed)
    }
    /// Flip `actor`'s favorite on `node`
    ///
    /// The count moves by exactly one per call; two calls in a row by
    /// the same actor restore it.
    pub fn toggle_favorite(&self, node: &Arc<ReplyNode>, actor: AccountRef) -> Result<FavoriteState> {
        self.ensure_attached(node)?;

        let favorited = match self.favorites.entry((node.id.clone(), actor)) {
            Entry::Occupied(entry) => {
                entry.remove();
                node.favorite_count.fetch_sub(1, Ordering::SeqCst);
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(Utc::now());
                node.favorite_count.fetch_add(1, Ordering::SeqCst);
                true
            }
        };

        Ok(self.favorite_changed(node, actor, favorited, "toggle_favorite"))
    }

    /// Set `actor`'s favorite on `node` to `favorited`
    ///
    /// Repeating the current state is a no-op.
    pub fn set_favorite(
        &self,
        node: &Arc<ReplyNode>,
        actor: AccountRef,
        favorited: bool,
    ) -> Result<FavoriteState> {
        self.ensure_attached(node)?;

        match (self.favorites.entry((node.id.clone(), actor)), favorited) {
            (Entry::Occupied(entry), false) => {
                entry.remove();
                node.favorite_count.fetch_sub(1, Ordering::SeqCst);
            }
            (Entry::Vacant(entry), true) => {
                entry.insert(Utc::now());
                node.favorite_count.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }

        Ok(self.favorite_changed(node, actor, favorited, "set_favorite"))
    }

    /// Whether `actor` currently favorites `node`
    pub fn is_favorited(&self, node: &ReplyNode, actor: AccountRef) -> bool {
        self.favorites.contains_key(&(node.id.clone(), actor))
    }

    /// Depth of `node` (root = 0)
    pub fn depth(&self, node: &ReplyNode) -> usize {
        node.depth
    }

    /// Find an attached node by id
    pub fn find(&self, id: &EntityId) -> Option<Arc<ReplyNode>> {
        let mut found = None;
        self.root.visit(|node| {
            if found.is_none() && &node.id == id {
                found = Some(Arc::clone(node));
            }
        });
        found
    }

    /// Number of replies in the whole tree (root excluded)
    pub fn reply_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(|_| count += 1);
        count - 1
    }

    /// Distinct reply authors in thread order, resolved through `directory`
    ///
    /// Authors the directory does not know are skipped.
    pub fn participants(&self, directory: &dyn EntityDirectory) -> Vec<AccountSummary> {
        let mut seen = HashSet::new();
        let mut authors = Vec::new();
        self.root.visit(|node| {
            if let Some(author) = node.author {
                if seen.insert(author) {
                    authors.push(author);
                }
            }
        });

        authors
            .into_iter()
            .filter_map(|author| {
                let summary = directory.account(author);
                if summary.is_none() {
                    tracing::debug!(author = %author, "Reply author not found in directory");
                }
                summary
            })
            .collect()
    }

    /// Serializable view of the replies, with `favorited` relative to `viewer`
    pub fn snapshot(&self, viewer: Option<AccountRef>) -> Vec<ReplyView> {
        self.fold_replies(|node, replies| ReplyView {
            id: node.id.clone(),
            author: node.author,
            body: node.body.clone(),
            created_at: node.created_at,
            depth: node.depth,
            favorite: viewer.is_some_and(|viewer| self.is_favorited(node, viewer)),
            favorite_count: node.favorite_count(),
            replies,
        })
    }

    /// Storage shape of the replies (root excluded)
    pub fn to_records(&self) -> Vec<ReplyRecord> {
        self.fold_replies(|node, replies| {
            let mut favorited_by = self.favorited_by(&node.id);
            favorited_by.sort();
            ReplyRecord {
                id: Some(node.id.clone()),
                author: node.author,
                body: node.body.clone(),
                created_at: Some(node.created_at),
                favorite_count: node.favorite_count(),
                favorited_by,
                replies,
            }
        })
    }

    /// Rebuild a thread from storage records
    ///
    /// `root_favorites` are the favorites of the post itself.
    pub fn from_records(
        root_favorites: FavoriteRecord,
        records: Vec<ReplyRecord>,
    ) -> std::result::Result<Self, ValidationErrors> {
        let token = next_thread_token();
        let mut builder = Builder {
            token,
            favorites: DashMap::new(),
            seen_ids: HashSet::new(),
            errors: ValidationErrors::new(),
        };

        let root_id = EntityId::new();
        let root_count = builder.favorites_of(&root_id, &root_favorites, "");
        let root = ReplyNode::new(token, None, root_id, None, String::new(), Utc::now(), root_count);

        // Parents get their children before the children are expanded, so
        // the build runs top-down off an explicit stack.
        let mut pending = vec![(Arc::clone(&root), records, "replies".to_string())];
        while let Some((parent, records, path)) = pending.pop() {
            let mut children = Vec::with_capacity(records.len());
            for (i, mut record) in records.into_iter().enumerate() {
                let path = format!("{path}[{i}]");
                let nested = mem::take(&mut record.replies);
                let child = builder.node(&parent, &mut record, &path);
                pending.push((Arc::clone(&child), nested, format!("{path}.replies")));
                children.push(child);
            }
            *parent.write_replies() = children;
        }

        if !builder.errors.is_empty() {
            return Err(builder.errors);
        }

        Ok(Self {
            token,
            root,
            favorites: builder.favorites,
        })
    }

    fn ensure_attached(&self, node: &ReplyNode) -> Result<()> {
        if node.thread != self.token || node.is_detached() {
            return Err(AppError::DetachedNode(node.id.to_string()).recorded());
        }
        Ok(())
    }

    fn favorite_changed(
        &self,
        node: &ReplyNode,
        actor: AccountRef,
        favorited: bool,
        operation: &'static str,
    ) -> FavoriteState {
        let favorite_count = node.favorite_count();
        REPLY_OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
        tracing::debug!(
            reply_id = %node.id,
            actor = %actor,
            favorited,
            favorite_count,
            "Favorite updated"
        );
        FavoriteState {
            favorited,
            favorite_count,
        }
    }

    /// Build one value per reply, children before their parent
    ///
    /// Returns the values of the root's direct replies in thread order.
    fn fold_replies<V>(&self, mut make: impl FnMut(&ReplyNode, Vec<V>) -> V) -> Vec<V> {
        // Pre-order list of (node, index of its parent in the list).
        let mut order: Vec<(Arc<ReplyNode>, Option<usize>)> = Vec::new();
        let mut pending: Vec<(Arc<ReplyNode>, Option<usize>)> = self
            .root
            .read_replies()
            .iter()
            .rev()
            .map(|node| (Arc::clone(node), None))
            .collect();
        while let Some((node, parent)) = pending.pop() {
            let slot = order.len();
            pending.extend(
                node.read_replies()
                    .iter()
                    .rev()
                    .map(|child| (Arc::clone(child), Some(slot))),
            );
            order.push((node, parent));
        }

        let mut children: Vec<Vec<V>> = order.iter().map(|_| Vec::new()).collect();
        let mut top = Vec::new();
        for (slot, (node, parent)) in order.iter().enumerate().rev() {
            let mut replies = mem::take(&mut children[slot]);
            replies.reverse();
            let value = make(&**node, replies);
            match parent {
                Some(parent) => children[*parent].push(value),
                None => top.push(value),
            }
        }
        top.reverse();
        top
    }

    /// Actors currently favoriting the node `id`
    pub(crate) fn favorited_by(&self, id: &EntityId) -> Vec<AccountRef> {
        self.favorites
            .iter()
            .filter(|entry| &entry.key().0 == id)
            .map(|entry| entry.key().1)
            .collect()
    }
}

impl Default for ReplyThread {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep copy: the clone shares no nodes with the original, and nodes of
/// one are rejected by the other.
impl Clone for ReplyThread {
    fn clone(&self) -> Self {
        let token = next_thread_token();
        let root = self.root.copy_into(token, None);

        let mut pending = vec![(Arc::clone(&self.root), Arc::clone(&root))];
        while let Some((original, copy)) = pending.pop() {
            let mut children = Vec::new();
            for child in original.read_replies().iter() {
                let child_copy = child.copy_into(token, Some(&copy));
                pending.push((Arc::clone(child), Arc::clone(&child_copy)));
                children.push(child_copy);
            }
            *copy.write_replies() = children;
        }

        Self {
            token,
            root,
            favorites: self.favorites.clone(),
        }
    }
}

// =============================================================================
// Views and records
// =============================================================================

/// Read-only view of a reply for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyView {
    pub id: EntityId,
    pub author: Option<AccountRef>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub depth: usize,
    /// Whether the viewer favorites this reply
    pub favorite: bool,
    pub favorite_count: u64,
    pub replies: Vec<ReplyView>,
}

impl Drop for ReplyView {
    fn drop(&mut self) {
        let mut pending = mem::take(&mut self.replies);
        while let Some(mut view) = pending.pop() {
            pending.append(&mut view.replies);
        }
    }
}

/// Favorite totals as stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FavoriteRecord {
    pub favorite_count: u64,
    pub favorited_by: Vec<AccountRef>,
}

/// Storage shape of a reply and its subtree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRecord {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub author: Option<AccountRef>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub favorite_count: u64,
    #[serde(default)]
    pub favorited_by: Vec<AccountRef>,
    #[serde(default)]
    pub replies: Vec<ReplyRecord>,
}

impl Drop for ReplyRecord {
    fn drop(&mut self) {
        let mut pending = mem::take(&mut self.replies);
        while let Some(mut record) = pending.pop() {
            pending.append(&mut record.replies);
        }
    }
}

struct Builder {
    token: u64,
    favorites: DashMap<FavoriteKey, DateTime<Utc>>,
    seen_ids: HashSet<EntityId>,
    errors: ValidationErrors,
}

impl Builder {
    /// Seed the ledger for one node and return its favorite count
    fn favorites_of(&mut self, id: &EntityId, record: &FavoriteRecord, path: &str) -> u64 {
        let field = |name: &str| {
            if path.is_empty() {
                name.to_string()
            } else {
                format!("{path}.{name}")
            }
        };

        let distinct: HashSet<AccountRef> = record.favorited_by.iter().copied().collect();
        if distinct.len() != record.favorited_by.len() {
            self.errors
                .push(field("favoritedBy"), "lists the same actor more than once");
        }
        let tracked = distinct.len() as u64;
        if record.favorite_count < tracked {
            self.errors.push(
                field("favoriteCount"),
                format!(
                    "is {} but {} actors are recorded as favoriting",
                    record.favorite_count, tracked
                ),
            );
        }

        let now = Utc::now();
        for actor in distinct {
            self.favorites.insert((id.clone(), actor), now);
        }
        record.favorite_count.max(tracked)
    }

    /// Node for `record` under `parent`, without its replies
    fn node(&mut self, parent: &Arc<ReplyNode>, record: &mut ReplyRecord, path: &str) -> Arc<ReplyNode> {
        let id = record.id.take().unwrap_or_default();
        if !self.seen_ids.insert(id.clone()) {
            self.errors
                .push(format!("{path}.id"), format!("duplicate reply id {id}"));
        }
        if record.author.is_none() {
            self.errors.push(format!("{path}.author"), "is required");
        }

        let favorites = FavoriteRecord {
            favorite_count: record.favorite_count,
            favorited_by: mem::take(&mut record.favorited_by),
        };
        let count = self.favorites_of(&id, &favorites, path);

        ReplyNode::new(
            self.token,
            Some(parent),
            id,
            record.author,
            mem::take(&mut record.body),
            record.created_at.unwrap_or_else(Utc::now),
            count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::lookup::MockEntityDirectory;

    const ALICE: AccountRef = AccountRef(1);
    const BOB: AccountRef = AccountRef(2);

    fn stored_reply(
        id: Option<&str>,
        author: Option<AccountRef>,
        favorite_count: u64,
        favorited_by: Vec<AccountRef>,
    ) -> ReplyRecord {
        ReplyRecord {
            id: id.map(|id| EntityId::from_string(id.to_string())),
            author,
            body: "hi".to_string(),
            created_at: None,
            favorite_count,
            favorited_by,
            replies: Vec::new(),
        }
    }

    #[test]
    fn replies_nest_and_report_depth() {
        let thread = ReplyThread::new();
        let child = thread.add_reply(thread.root(), ALICE, "hi").unwrap();
        let grandchild = thread.add_reply(&child, BOB, "reply").unwrap();

        assert_eq!(thread.depth(thread.root()), 0);
        assert_eq!(thread.depth(&child), 1);
        assert_eq!(thread.depth(&grandchild), 2);
        assert_eq!(thread.reply_count(), 2);
        assert!(Arc::ptr_eq(&grandchild.parent().unwrap(), &child));
    }

    #[test]
    fn replies_keep_call_order() {
        let thread = ReplyThread::new();
        for body in ["first", "second", "third"] {
            thread.add_reply(thread.root(), ALICE, body).unwrap();
        }

        let bodies: Vec<String> = thread
            .root()
            .replies()
            .iter()
            .map(|r| r.body().to_string())
            .collect();
        assert_eq!(bodies, ["first", "second", "third"]);
    }

    #[test]
    fn toggle_twice_restores_count() {
        let thread = ReplyThread::new();
        let reply = thread.add_reply(thread.root(), ALICE, "hi").unwrap();

        let on = thread.toggle_favorite(&reply, BOB).unwrap();
        assert_eq!(on, FavoriteState { favorited: true, favorite_count: 1 });

        let off = thread.toggle_favorite(&reply, BOB).unwrap();
        assert_eq!(off, FavoriteState { favorited: false, favorite_count: 0 });
    }

    #[test]
    fn set_favorite_is_idempotent() {
        let thread = ReplyThread::new();
        let reply = thread.add_reply(thread.root(), ALICE, "hi").unwrap();

        thread.set_favorite(&reply, BOB, true).unwrap();
        let again = thread.set_favorite(&reply, BOB, true).unwrap();
        assert_eq!(again.favorite_count, 1);

        thread.set_favorite(&reply, ALICE, true).unwrap();
        assert_eq!(reply.favorite_count(), 2);

        thread.set_favorite(&reply, BOB, false).unwrap();
        let unset_again = thread.set_favorite(&reply, BOB, false).unwrap();
        assert_eq!(unset_again.favorite_count, 1);
        assert!(thread.is_favorited(&reply, ALICE));
        assert!(!thread.is_favorited(&reply, BOB));
    }

    #[test]
    fn removed_subtree_is_detached() {
        let thread = ReplyThread::new();
        let child = thread.add_reply(thread.root(), ALICE, "hi").unwrap();
        let grandchild = thread.add_reply(&child, BOB, "reply").unwrap();
        thread.toggle_favorite(&grandchild, ALICE).unwrap();

        thread.remove_reply(thread.root(), child.id()).unwrap();

        assert!(child.is_detached());
        assert!(grandchild.is_detached());
        assert!(matches!(
            thread.add_reply(&grandchild, ALICE, "late"),
            Err(AppError::DetachedNode(_))
        ));
        assert!(matches!(
            thread.toggle_favorite(&child, BOB),
            Err(AppError::DetachedNode(_))
        ));
        assert!(!thread.is_favorited(&grandchild, ALICE));
        assert_eq!(thread.reply_count(), 0);
    }

    #[test]
    fn nodes_of_another_thread_are_rejected() {
        let ours = ReplyThread::new();
        let theirs = ReplyThread::new();
        let foreign = theirs.add_reply(theirs.root(), ALICE, "elsewhere").unwrap();

        assert!(matches!(
            ours.add_reply(&foreign, BOB, "hi"),
            Err(AppError::DetachedNode(_))
        ));
        assert!(matches!(
            ours.add_reply(theirs.root(), BOB, "hi"),
            Err(AppError::DetachedNode(_))
        ));
    }

    #[test]
    fn clone_is_deep() {
        let thread = ReplyThread::new();
        let reply = thread.add_reply(thread.root(), ALICE, "hi").unwrap();
        thread.toggle_favorite(&reply, BOB).unwrap();

        let copy = thread.clone();
        let copied_reply = copy.find(reply.id()).unwrap();
        assert!(!Arc::ptr_eq(&copied_reply, &reply));
        assert_eq!(copied_reply.favorite_count(), 1);
        assert_eq!(copied_reply.depth(), 1);

        copy.add_reply(&copied_reply, BOB, "only in the copy").unwrap();
        assert_eq!(copy.reply_count(), 2);
        assert_eq!(thread.reply_count(), 1);
        assert!(Arc::ptr_eq(&copied_reply.parent().unwrap(), copy.root()));

        // Each thread only accepts its own nodes.
        assert!(copy.add_reply(&reply, BOB, "wrong thread").is_err());
        assert!(thread.add_reply(&copied_reply, BOB, "wrong thread").is_err());
    }

    #[test]
    fn records_round_trip_favorites() {
        let thread = ReplyThread::new();
        let reply = thread.add_reply(thread.root(), ALICE, "hi").unwrap();
        thread.toggle_favorite(&reply, BOB).unwrap();
        thread.toggle_favorite(thread.root(), ALICE).unwrap();

        let records = thread.to_records();
        assert_eq!(records[0].favorited_by, vec![BOB]);

        let root_favorites = FavoriteRecord {
            favorite_count: 1,
            favorited_by: thread.favorited_by(thread.root().id()),
        };
        let rebuilt = ReplyThread::from_records(root_favorites, records).unwrap();
        let rebuilt_reply = rebuilt.find(reply.id()).unwrap();
        assert!(rebuilt.is_favorited(&rebuilt_reply, BOB));
        assert_eq!(rebuilt.root().favorite_count(), 1);

        // BOB un-favorites, count drops to zero, never below.
        let state = rebuilt.toggle_favorite(&rebuilt_reply, BOB).unwrap();
        assert_eq!(state.favorite_count, 0);
    }

    #[test]
    fn records_keep_sibling_and_nesting_order() {
        let thread = ReplyThread::new();
        let first = thread.add_reply(thread.root(), ALICE, "first").unwrap();
        thread.add_reply(&first, BOB, "first.a").unwrap();
        thread.add_reply(&first, BOB, "first.b").unwrap();
        thread.add_reply(thread.root(), BOB, "second").unwrap();

        let records = thread.to_records();
        let top: Vec<&str> = records.iter().map(|r| r.body.as_str()).collect();
        assert_eq!(top, ["first", "second"]);
        let nested: Vec<&str> = records[0].replies.iter().map(|r| r.body.as_str()).collect();
        assert_eq!(nested, ["first.a", "first.b"]);

        let rebuilt = ReplyThread::from_records(FavoriteRecord::default(), records).unwrap();
        assert_eq!(rebuilt.snapshot(None)[0].replies[1].body, "first.b");
        assert_eq!(rebuilt.snapshot(None)[0].replies[1].depth, 2);
    }

    #[test]
    fn stored_count_covers_untracked_favorites() {
        let records = vec![stored_reply(None, Some(ALICE), 5, vec![BOB])];
        let thread = ReplyThread::from_records(FavoriteRecord::default(), records).unwrap();
        let replies = thread.root().replies();
        let reply = &replies[0];

        assert_eq!(reply.favorite_count(), 5);
        assert_eq!(thread.toggle_favorite(reply, BOB).unwrap().favorite_count, 4);
        assert_eq!(thread.toggle_favorite(reply, ALICE).unwrap().favorite_count, 5);
    }

    #[test]
    fn from_records_collects_field_errors() {
        let records = vec![
            stored_reply(Some("r1"), Some(ALICE), 0, vec![BOB]),
            stored_reply(Some("r1"), None, 0, Vec::new()),
        ];

        let errors = ReplyThread::from_records(FavoriteRecord::default(), records).unwrap_err();
        assert!(errors.mentions("replies[0].favoriteCount"));
        assert!(errors.mentions("replies[1].id"));
        assert!(errors.mentions("replies[1].author"));
    }

    #[test]
    fn nested_record_errors_carry_their_path() {
        let mut parent = stored_reply(Some("p"), Some(ALICE), 0, Vec::new());
        parent.replies.push(stored_reply(Some("c"), None, 0, Vec::new()));

        let errors = ReplyThread::from_records(FavoriteRecord::default(), vec![parent]).unwrap_err();
        assert!(errors.mentions("replies[0].replies[0].author"));
    }

    #[test]
    fn snapshot_is_relative_to_viewer() {
        let thread = ReplyThread::new();
        let reply = thread.add_reply(thread.root(), ALICE, "hi").unwrap();
        thread.add_reply(&reply, BOB, "nested").unwrap();
        thread.toggle_favorite(&reply, BOB).unwrap();

        let as_bob = thread.snapshot(Some(BOB));
        assert!(as_bob[0].favorite);
        assert_eq!(as_bob[0].replies[0].depth, 2);

        let anonymous = thread.snapshot(None);
        assert!(!anonymous[0].favorite);
        assert_eq!(anonymous[0].favorite_count, 1);
    }

    #[test]
    fn participants_resolves_distinct_authors() {
        let thread = ReplyThread::new();
        let first = thread.add_reply(thread.root(), ALICE, "a").unwrap();
        thread.add_reply(&first, BOB, "b").unwrap();
        thread.add_reply(thread.root(), ALICE, "c").unwrap();

        let mut directory = MockEntityDirectory::new();
        directory
            .expect_account()
            .withf(|account| *account == ALICE)
            .times(1)
            .returning(|account| {
                Some(AccountSummary {
                    account,
                    display_name: "Alice".to_string(),
                })
            });
        directory
            .expect_account()
            .withf(|account| *account == BOB)
            .times(1)
            .returning(|_| None);

        let participants = thread.participants(&directory);
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].display_name, "Alice");
    }

    #[test]
    fn long_reply_chains_run_on_a_small_stack() {
        const DEPTH: usize = 50_000;

        let worker = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| {
                let thread = ReplyThread::new();
                let mut tip = Arc::clone(thread.root());
                for _ in 0..DEPTH {
                    tip = thread.add_reply(&tip, ALICE, "deeper").unwrap();
                }
                assert_eq!(thread.depth(&tip), DEPTH);
                assert_eq!(thread.reply_count(), DEPTH);
                assert!(thread.find(tip.id()).is_some());
                thread.toggle_favorite(&tip, BOB).unwrap();

                let snapshot = thread.snapshot(Some(BOB));
                assert_eq!(snapshot.len(), 1);
                drop(snapshot);

                let copy = thread.clone();
                assert_eq!(copy.reply_count(), DEPTH);
                drop(copy);

                let rebuilt =
                    ReplyThread::from_records(FavoriteRecord::default(), thread.to_records())
                        .unwrap();
                let rebuilt_tip = rebuilt.find(tip.id()).unwrap();
                assert!(rebuilt.is_favorited(&rebuilt_tip, BOB));
                assert_eq!(rebuilt_tip.depth(), DEPTH);
                drop(rebuilt_tip);
                drop(rebuilt);

                let first = thread.root().replies()[0].id().clone();
                thread.remove_reply(thread.root(), &first).unwrap();
                assert!(tip.is_detached());
                assert_eq!(thread.reply_count(), 0);
            })
            .unwrap();

        worker.join().unwrap();
    }
}
