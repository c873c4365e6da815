use crate::core::{Collect, Context, IsolateState, Value};
use crate::error::JSError;
use std::rc::Rc;

/// An ID for a persistent root stored in the isolate's root table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct RootId(pub(crate) u32);

impl RootId {
    /// The underlying index into the persistent root table.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Values kept alive independently of any `Isolate::enter` call.
#[derive(Collect, Default)]
#[collect(no_drop)]
pub struct PersistentRoots<'gc> {
    slots: Vec<Option<Value<'gc>>>,
    free: Vec<u32>,
}

impl<'gc> PersistentRoots<'gc> {
    pub(crate) fn add(&mut self, value: Value<'gc>) -> RootId {
        let idx = match self.free.pop() {
            Some(idx) => idx as usize,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        debug_assert!(self.slots[idx].is_none());
        self.slots[idx] = Some(value);
        RootId(idx as u32)
    }

    pub(crate) fn get(&self, id: RootId) -> Option<Value<'gc>> {
        self.slots.get(id.0 as usize).and_then(|slot| slot.clone())
    }

    pub(crate) fn remove(&mut self, id: RootId) -> bool {
        let Some(slot) = self.slots.get_mut(id.0 as usize) else {
            return false;
        };
        if slot.take().is_none() {
            return false;
        }
        self.free.push(id.0);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/// A strong handle that keeps a value alive across collections.
///
/// Dropping (or [`reset`](Persistent::reset)ting) the handle does not touch the
/// heap directly: the root is queued and released the next time the isolate
/// is entered or collected. This makes it safe to drop persistent handles from
/// finalizers, which run while the collector is sweeping.
pub struct Persistent {
    id: RootId,
    released: bool,
    state: Rc<IsolateState>,
}

impl Persistent {
    pub fn new<'gc>(cx: &Context<'gc>, value: Value<'gc>) -> Self {
        let id = cx.root.persistent.borrow_mut(cx.mc).add(value);
        log::trace!("persistent handle {} created", id.index());
        Persistent {
            id,
            released: false,
            state: cx.root.state.clone(),
        }
    }

    pub fn id(&self) -> RootId {
        self.id
    }

    pub fn is_empty(&self) -> bool {
        self.released
    }

    pub fn get<'gc>(&self, cx: &Context<'gc>) -> Result<Value<'gc>, JSError> {
        if !Rc::ptr_eq(&self.state, &cx.root.state) {
            return Err(JSError::ForeignHandle { id: self.id.index() });
        }
        if self.released {
            return Err(JSError::ReleasedHandle { id: self.id.index() });
        }
        cx.root
            .persistent
            .borrow()
            .get(self.id)
            .ok_or(JSError::ReleasedHandle { id: self.id.index() })
    }

    pub fn reset(&mut self) {
        if !self.released {
            self.released = true;
            self.state.pending_releases.borrow_mut().push(self.id);
        }
    }
}

impl Drop for Persistent {
    fn drop(&mut self) {
        self.reset();
    }
}

impl std::fmt::Debug for Persistent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistent").field("id", &self.id).field("released", &self.released).finish()
    }
}
