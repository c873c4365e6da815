use crate::core::{Collect, Context, Gc, GcPtr, GcTrace, PersistentRoots, RootId, SymbolData, new_gc_cell_ptr};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Tunables for a new [`Isolate`].
#[derive(Clone, Debug)]
pub struct IsolateOptions {
    /// Upper bound on live objects. Allocation past it fails with
    /// `JsErrorCode::OutOfMemory`. `None` means unbounded.
    pub max_objects: Option<usize>,
    /// Upper bound on back-to-back collection cycles run by
    /// [`Isolate::collect_garbage`] while finalizers keep releasing roots.
    pub max_collect_rounds: usize,
}

impl Default for IsolateOptions {
    fn default() -> Self {
        IsolateOptions {
            max_objects: None,
            max_collect_rounds: 8,
        }
    }
}

impl IsolateOptions {
    pub fn max_objects(mut self, max: usize) -> Self {
        self.max_objects = Some(max);
        self
    }

    pub fn max_collect_rounds(mut self, rounds: usize) -> Self {
        self.max_collect_rounds = rounds.max(1);
        self
    }
}

/// Host-side isolate state shared with values that outlive a single
/// `enter` call (persistent handles, external payloads, allocation tokens).
#[derive(Debug)]
pub struct IsolateState {
    pub(crate) options: IsolateOptions,
    pub(crate) execution_disabled: Cell<bool>,
    pub(crate) live_objects: Cell<usize>,
    pub(crate) live_externals: Cell<usize>,
    pub(crate) pending_releases: RefCell<Vec<RootId>>,
}

pub struct IsolateRoot<'gc> {
    /// Well-known hidden key external data is attached under.
    pub(crate) external_property_id: Gc<'gc, SymbolData>,
    pub(crate) persistent: GcPtr<'gc, PersistentRoots<'gc>>,
    pub(crate) state: Rc<IsolateState>,
}

unsafe impl<'gc> Collect<'gc> for IsolateRoot<'gc> {
    fn trace<T: GcTrace<'gc>>(&self, cc: &mut T) {
        self.external_property_id.trace(cc);
        self.persistent.trace(cc);
    }
}

pub type JsArena = gc_arena::Arena<gc_arena::Rootable!['gc => IsolateRoot<'gc>]>;

/// An isolated engine heap.
///
/// All access to values goes through [`Isolate::enter`]; values handed to the
/// closure cannot escape it, use a [`Persistent`](crate::Persistent) to keep
/// one alive across calls.
pub struct Isolate {
    arena: JsArena,
    state: Rc<IsolateState>,
}

impl Isolate {
    pub fn new() -> Self {
        Self::with_options(IsolateOptions::default())
    }

    pub fn with_options(options: IsolateOptions) -> Self {
        let state = Rc::new(IsolateState {
            options,
            execution_disabled: Cell::new(false),
            live_objects: Cell::new(0),
            live_externals: Cell::new(0),
            pending_releases: RefCell::new(Vec::new()),
        });

        let root_state = state.clone();
        let arena = JsArena::new(move |mc| IsolateRoot {
            external_property_id: Gc::new(
                mc,
                SymbolData {
                    description: Some("__externalData".to_string()),
                },
            ),
            persistent: new_gc_cell_ptr(mc, PersistentRoots::default()),
            state: root_state,
        });

        log::debug!("isolate created (max_objects: {:?})", state.options.max_objects);
        Isolate { arena, state }
    }

    /// Runs `f` with access to the heap.
    pub fn enter<F, R>(&self, f: F) -> R
    where
        F: for<'gc> FnOnce(Context<'gc>) -> R,
    {
        self.arena.mutate(|mc, root| {
            let cx = Context { mc, root };
            cx.release_pending_roots();
            f(cx)
        })
    }

    /// Runs full collection cycles until finalizers stop releasing
    /// persistent roots (or `max_collect_rounds` is reached).
    ///
    /// A collected promise finalizes its external record, which drops the
    /// record's persistent handles; those only become garbage on the next
    /// cycle, hence the loop.
    pub fn collect_garbage(&mut self) {
        let rounds = self.state.options.max_collect_rounds;
        for round in 0..rounds {
            let released = self.arena.mutate(|mc, root| Context { mc, root }.release_pending_roots());
            self.arena.finish_cycle();
            log::trace!(
                "gc round {}: released {} roots, {} objects live",
                round,
                released,
                self.state.live_objects.get()
            );
            if self.state.pending_releases.borrow().is_empty() {
                break;
            }
        }
    }

    pub fn disable_execution(&self) {
        self.state.execution_disabled.set(true);
    }

    pub fn enable_execution(&self) {
        self.state.execution_disabled.set(false);
    }

    pub fn is_execution_disabled(&self) -> bool {
        self.state.execution_disabled.get()
    }

    pub fn options(&self) -> &IsolateOptions {
        &self.state.options
    }

    /// Number of heap objects not yet swept, including garbage the collector
    /// has not reached yet.
    pub fn object_count(&self) -> usize {
        self.state.live_objects.get()
    }

    /// Number of external objects whose finalizer has not run yet.
    pub fn live_external_objects(&self) -> usize {
        self.state.live_externals.get()
    }

    /// Number of live persistent roots, after releasing dropped handles.
    pub fn persistent_handle_count(&self) -> usize {
        self.enter(|cx| cx.root.persistent.borrow().len())
    }
}

impl Default for Isolate {
    fn default() -> Self {
        Self::new()
    }
}
