use crate::core::{Collect, GcTrace, JSObjectData, NativeFunction, ObjectKind, Value};

// Manual implementations of trace: these types carry host-owned fields
// (external payloads, allocation tokens, fn pointers) that the derive cannot
// see through, and they never touch Gc pointers from `Drop`.

unsafe impl<'gc> Collect<'gc> for Value<'gc> {
    fn trace<T: GcTrace<'gc>>(&self, cc: &mut T) {
        match self {
            Value::Symbol(sym) => sym.trace(cc),
            Value::Object(obj) => obj.trace(cc),
            Value::Number(_) | Value::String(_) | Value::Boolean(_) | Value::Undefined | Value::Null => {}
        }
    }
}

unsafe impl<'gc> Collect<'gc> for NativeFunction<'gc> {
    fn trace<T: GcTrace<'gc>>(&self, cc: &mut T) {
        match self {
            NativeFunction::Resolving {
                promise, already_resolved, ..
            } => {
                promise.trace(cc);
                already_resolved.trace(cc);
            }
            NativeFunction::Host(_) => {}
        }
    }
}

unsafe impl<'gc> Collect<'gc> for ObjectKind<'gc> {
    fn trace<T: GcTrace<'gc>>(&self, cc: &mut T) {
        match self {
            ObjectKind::Function(func) => func.trace(cc),
            ObjectKind::Promise(promise) => promise.trace(cc),
            // External payloads are 'static host data and hold no Gc pointers.
            ObjectKind::External(_) | ObjectKind::Ordinary => {}
        }
    }
}

unsafe impl<'gc> Collect<'gc> for JSObjectData<'gc> {
    fn trace<T: GcTrace<'gc>>(&self, cc: &mut T) {
        for (k, v) in &self.properties {
            k.trace(cc);
            v.trace(cc);
        }
        self.kind.trace(cc);
    }
}
