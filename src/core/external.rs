use crate::core::IsolateState;
use std::any::Any;
use std::rc::Rc;

/// Called by the engine with the payload of an external object once the
/// object has been collected. The payload is `None` when it was detached
/// before collection.
pub type JsFinalizeCallback = fn(Option<Box<dyn Any>>);

/// Backing store of an external object: an opaque host payload plus the
/// callback that releases it.
pub struct ExternalSlot {
    data: Option<Box<dyn Any>>,
    finalizer: Option<JsFinalizeCallback>,
    state: Rc<IsolateState>,
}

impl ExternalSlot {
    pub(crate) fn new(data: Option<Box<dyn Any>>, finalizer: Option<JsFinalizeCallback>, state: &Rc<IsolateState>) -> Self {
        state.live_externals.set(state.live_externals.get() + 1);
        ExternalSlot {
            data,
            finalizer,
            state: state.clone(),
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut (dyn Any + 'static)> {
        self.data.as_deref_mut()
    }

    pub(crate) fn take_data(&mut self) -> Option<Box<dyn Any>> {
        self.data.take()
    }
}

impl Drop for ExternalSlot {
    fn drop(&mut self) {
        let live = self.state.live_externals.get();
        self.state.live_externals.set(live.saturating_sub(1));

        let data = self.data.take();
        log::trace!("finalizing external object (payload present: {})", data.is_some());
        match self.finalizer {
            Some(finalize) => finalize(data),
            None => drop(data),
        }
    }
}
