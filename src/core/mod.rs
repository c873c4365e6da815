pub(crate) use gc_arena::GcWeak;
pub(crate) use gc_arena::Mutation as MutationContext;
pub(crate) use gc_arena::collect::Trace as GcTrace;
pub(crate) use gc_arena::lock::RefLock as GcCell;
pub(crate) use gc_arena::{Collect, Gc};
pub(crate) type GcPtr<'gc, T> = Gc<'gc, GcCell<T>>;

#[inline]
pub fn new_gc_cell_ptr<'gc, T: 'gc + Collect<'gc>>(mc: &MutationContext<'gc>, value: T) -> GcPtr<'gc, T> {
    Gc::new(mc, GcCell::new(value))
}

mod gc;

mod value;
pub use value::*;

mod property_key;
pub use property_key::*;

mod external;
pub use external::*;

mod persistent;
pub use persistent::*;

mod context;
pub use context::*;

mod isolate;
pub use isolate::*;
