//! The mutation boundary.
//!
//! An [`Editor`] owns the committed [`EditorState`]. Changes happen inside
//! [`Editor::update`], which hands the closure a writable copy of the state;
//! when the closure succeeds the copy is frozen, committed, recorded in the
//! history and announced to every update listener. When it fails, the copy is
//! dropped and the committed state is untouched.
//!
//! Updates made by a listener are announced only after the current event has
//! reached every listener, so events arrive in commit order and the last one
//! seen always carries the committed state.
//!
//! Listeners and command handlers are registered through [`Subscription`]s
//! that unregister themselves when dropped.

use crate::commands::{self, EditorCommand};
use crate::error::EditorError;
use crate::history::History;
use crate::selection::{Point, Selection};
use crate::tree::DocumentTree;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};

/// Default number of undo steps kept by [`Editor::default`].
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// A committed (or working) document plus its selection.
#[derive(Debug, Clone, Default)]
pub struct EditorState {
    tree: DocumentTree,
    selection: Option<Selection>,
}

impl EditorState {
    /// The document tree.
    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    /// The current selection, if any.
    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }
}

/// Marks attached to an update, visible to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UpdateTag {
    /// State restored by undo or redo.
    Historic,
    /// Rewrite performed by the math promotion engine.
    Promotion,
    /// Whole document replaced from Markdown.
    Load,
    /// Math node turned back into source text.
    Demotion,
}

/// Notification delivered to update listeners after a commit.
#[derive(Debug, Clone)]
pub struct UpdateEvent {
    /// The newly committed state.
    pub state: Rc<EditorState>,
    /// The state it replaced.
    pub previous: Rc<EditorState>,
    /// Tags attached to the update.
    pub tags: BTreeSet<UpdateTag>,
    /// Whether the tree changed (false for selection-only updates).
    pub dirty: bool,
}

impl UpdateEvent {
    /// Whether the update carried `tag`.
    pub fn has_tag(&self, tag: UpdateTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Writable view handed to update closures.
pub struct UpdateScope<'a> {
    state: &'a mut EditorState,
    tags: &'a mut BTreeSet<UpdateTag>,
}

impl UpdateScope<'_> {
    /// The working tree.
    pub fn tree(&self) -> &DocumentTree {
        &self.state.tree
    }

    /// The working tree, writable.
    pub fn tree_mut(&mut self) -> &mut DocumentTree {
        &mut self.state.tree
    }

    /// The working selection.
    pub fn selection(&self) -> Option<Selection> {
        self.state.selection
    }

    /// Replaces the working selection.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.state.selection = selection;
    }

    /// Collapses the selection to `point`.
    pub fn select(&mut self, point: Point) {
        self.state.selection = Some(Selection::caret(point));
    }

    /// Attaches `tag` to this update.
    pub fn add_tag(&mut self, tag: UpdateTag) {
        self.tags.insert(tag);
    }

    /// Whether the update carries `tag`.
    pub fn has_tag(&self, tag: UpdateTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Ordering of command handlers; higher runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandPriority {
    /// Runs after everything else.
    Low,
    /// Regular plugin handlers.
    Normal,
    /// Handlers that must see input before regular plugins.
    High,
    /// Reserved for handlers that must run first.
    Critical,
}

/// Callback run after each commit.
pub type UpdateListener = dyn Fn(&Editor, &UpdateEvent);

/// Callback offered each dispatched command. Returning `Ok(true)` marks the
/// command handled and stops propagation.
pub type CommandHandler = dyn Fn(&Editor, &EditorCommand) -> Result<bool, EditorError>;

trait Unregister {
    fn unregister(&self, id: u64);
}

struct RegistryEntry<T: ?Sized> {
    id: u64,
    priority: CommandPriority,
    callback: Rc<T>,
}

struct Registry<T: ?Sized> {
    entries: RefCell<Vec<RegistryEntry<T>>>,
    next_id: Cell<u64>,
}

impl<T: ?Sized> Registry<T> {
    fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    fn insert(&self, priority: CommandPriority, callback: Rc<T>) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let mut entries = self.entries.borrow_mut();
        // Stable: equal priorities keep registration order.
        let at = entries
            .iter()
            .position(|entry| entry.priority < priority)
            .unwrap_or(entries.len());
        entries.insert(
            at,
            RegistryEntry {
                id,
                priority,
                callback,
            },
        );
        id
    }

    fn snapshot(&self) -> Vec<Rc<T>> {
        self.entries
            .borrow()
            .iter()
            .map(|entry| Rc::clone(&entry.callback))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

impl<T: ?Sized> Unregister for Registry<T> {
    fn unregister(&self, id: u64) {
        self.entries.borrow_mut().retain(|entry| entry.id != id);
    }
}

/// Registration handle. Dropping it (or calling [`Subscription::dispose`])
/// removes the callback; outliving the editor is harmless.
#[must_use = "dropping a subscription unregisters its callback immediately"]
pub struct Subscription {
    registry: Weak<dyn Unregister>,
    id: u64,
}

impl Subscription {
    fn new<T: ?Sized + 'static>(registry: &Rc<Registry<T>>, id: u64) -> Self {
        let registry: Rc<dyn Unregister> = Rc::clone(registry) as Rc<dyn Unregister>;
        Self {
            registry: Rc::downgrade(&registry),
            id,
        }
    }

    /// Unregisters the callback now.
    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("live", &(self.registry.strong_count() > 0))
            .finish()
    }
}

struct EditorInner {
    state: RefCell<Rc<EditorState>>,
    updating: Cell<bool>,
    notifying: Cell<bool>,
    pending: RefCell<VecDeque<UpdateEvent>>,
    listeners: Rc<Registry<UpdateListener>>,
    commands: Rc<Registry<CommandHandler>>,
    history: RefCell<History>,
}

/// Shared handle to one document and its mutation boundary. Cloning is
/// cheap and yields another handle to the same editor.
#[derive(Clone)]
pub struct Editor {
    inner: Rc<EditorInner>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("state", &self.inner.state.borrow())
            .field("listeners", &self.inner.listeners.len())
            .field("commands", &self.inner.commands.len())
            .finish()
    }
}

/// Resets a busy flag even if the guarded code unwinds.
struct BusyGuard<'a>(&'a Cell<bool>);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Editor {
    /// An editor on an empty document keeping `history_limit` undo steps.
    pub fn new(history_limit: usize) -> Self {
        Self {
            inner: Rc::new(EditorInner {
                state: RefCell::new(Rc::new(EditorState::default())),
                updating: Cell::new(false),
                notifying: Cell::new(false),
                pending: RefCell::new(VecDeque::new()),
                listeners: Rc::new(Registry::new()),
                commands: Rc::new(Registry::new()),
                history: RefCell::new(History::new(history_limit)),
            }),
        }
    }

    /// The committed state.
    pub fn state(&self) -> Rc<EditorState> {
        Rc::clone(&self.inner.state.borrow())
    }

    /// Runs `f` against the committed state.
    pub fn read<R>(&self, f: impl FnOnce(&EditorState) -> R) -> R {
        let state = self.state();
        f(&state)
    }

    /// Whether an update closure is currently running.
    pub fn is_updating(&self) -> bool {
        self.inner.updating.get()
    }

    /// Runs `f` inside a mutation boundary; see [`Editor::update_with_tags`].
    pub fn update<R>(
        &self,
        f: impl FnOnce(&mut UpdateScope<'_>) -> Result<R, EditorError>,
    ) -> Result<R, EditorError> {
        self.update_with_tags(&[], f)
    }

    /// Runs `f` on a writable copy of the committed state and commits it if
    /// `f` succeeds. Fails with [`EditorError::NestedUpdate`] when called from
    /// inside another update closure.
    pub fn update_with_tags<R>(
        &self,
        tags: &[UpdateTag],
        f: impl FnOnce(&mut UpdateScope<'_>) -> Result<R, EditorError>,
    ) -> Result<R, EditorError> {
        if self.inner.updating.get() {
            return Err(EditorError::NestedUpdate);
        }
        let previous = self.state();
        let mut working = EditorState::clone(&previous);
        let mut tags: BTreeSet<UpdateTag> = tags.iter().copied().collect();

        working.tree.begin_mutation();
        let result = {
            self.inner.updating.set(true);
            let _guard = BusyGuard(&self.inner.updating);
            let mut scope = UpdateScope {
                state: &mut working,
                tags: &mut tags,
            };
            f(&mut scope)
        };
        let value = match result {
            Ok(value) => value,
            Err(err) => {
                log::debug!("update rolled back: {}", err);
                return Err(err);
            }
        };

        let dirty = working.tree.end_mutation();
        if working
            .selection
            .is_some_and(|selection| !selection.is_valid_in(&working.tree))
        {
            working.selection = None;
        }
        if !dirty && working.selection == previous.selection {
            return Ok(value);
        }

        if dirty && !tags.contains(&UpdateTag::Historic) {
            self.inner.history.borrow_mut().record(Rc::clone(&previous));
        }
        self.commit(Rc::new(working), previous, tags, dirty);
        Ok(value)
    }

    fn commit(
        &self,
        next: Rc<EditorState>,
        previous: Rc<EditorState>,
        tags: BTreeSet<UpdateTag>,
        dirty: bool,
    ) {
        *self.inner.state.borrow_mut() = Rc::clone(&next);
        self.inner.pending.borrow_mut().push_back(UpdateEvent {
            state: next,
            previous,
            tags,
            dirty,
        });
        if self.inner.notifying.get() {
            // The outer commit delivers it once the current event is done.
            return;
        }

        self.inner.notifying.set(true);
        let _guard = BusyGuard(&self.inner.notifying);
        loop {
            let Some(event) = self.inner.pending.borrow_mut().pop_front() else {
                break;
            };
            for listener in self.inner.listeners.snapshot() {
                listener(self, &event);
            }
        }
    }

    /// Registers `listener` to run after every commit.
    pub fn register_update_listener(
        &self,
        listener: impl Fn(&Editor, &UpdateEvent) + 'static,
    ) -> Subscription {
        let id = self
            .inner
            .listeners
            .insert(CommandPriority::Normal, Rc::new(listener));
        Subscription::new(&self.inner.listeners, id)
    }

    /// Registers a command handler. Handlers run by descending priority,
    /// then registration order, until one reports the command handled.
    pub fn register_command(
        &self,
        priority: CommandPriority,
        handler: impl Fn(&Editor, &EditorCommand) -> Result<bool, EditorError> + 'static,
    ) -> Subscription {
        let id = self.inner.commands.insert(priority, Rc::new(handler));
        Subscription::new(&self.inner.commands, id)
    }

    /// Offers `command` to the registered handlers, falling back to the
    /// built-in behaviour. Returns whether anything handled it.
    pub fn dispatch(&self, command: EditorCommand) -> Result<bool, EditorError> {
        for handler in self.inner.commands.snapshot() {
            if handler(self, &command)? {
                return Ok(true);
            }
        }
        commands::apply_default(self, &command)
    }

    /// Restores the state before the last recorded edit.
    pub fn undo(&self) -> Result<bool, EditorError> {
        self.travel(|history, current| history.undo(current))
    }

    /// Re-applies the last undone edit.
    pub fn redo(&self) -> Result<bool, EditorError> {
        self.travel(|history, current| history.redo(current))
    }

    fn travel(
        &self,
        step: impl FnOnce(&mut History, Rc<EditorState>) -> Option<Rc<EditorState>>,
    ) -> Result<bool, EditorError> {
        if self.inner.updating.get() {
            return Err(EditorError::NestedUpdate);
        }
        let current = self.state();
        let target = step(&mut self.inner.history.borrow_mut(), Rc::clone(&current));
        let Some(target) = target else {
            return Ok(false);
        };
        self.commit(target, current, BTreeSet::from([UpdateTag::Historic]), true);
        Ok(true)
    }

    /// Whether [`Editor::undo`] would do anything.
    pub fn can_undo(&self) -> bool {
        self.inner.history.borrow().can_undo()
    }

    /// Whether [`Editor::redo`] would do anything.
    pub fn can_redo(&self) -> bool {
        self.inner.history.borrow().can_redo()
    }

    /// Forgets all undo/redo steps.
    pub fn clear_history(&self) {
        self.inner.history.borrow_mut().clear();
    }
}
