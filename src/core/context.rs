//! Engine primitives available while an isolate is entered.
//!
//! This is the lower-layer surface the promise and external-data layers are
//! written against: promise capability creation, hidden property access,
//! external objects with finalize callbacks, and function invocation.

use crate::core::{
    ExternalSlot, Gc, IsolateRoot, JSObjectDataPtr, JSPromise, JsFinalizeCallback, MutationContext, NativeCallback, NativeFunction,
    ObjectKind, PromiseState, PropertyKey, SettleKind, SymbolData, Value, new_gc_cell_ptr, new_js_object_data,
};
use crate::error::JsErrorCode;
use std::any::Any;

/// Borrowed access to an entered isolate.
#[derive(Clone, Copy)]
pub struct Context<'gc> {
    pub(crate) mc: &'gc MutationContext<'gc>,
    pub(crate) root: &'gc IsolateRoot<'gc>,
}

/// Error of [`Context::create_external_object`]: the payload is handed back
/// untouched and its finalizer is not run.
pub type ExternalObjectError = (JsErrorCode, Option<Box<dyn Any>>);

impl<'gc> Context<'gc> {
    pub fn mutation(&self) -> &'gc MutationContext<'gc> {
        self.mc
    }

    pub fn get_undefined(&self) -> Value<'gc> {
        Value::Undefined
    }

    /// The hidden property key external data is attached under.
    pub fn external_property_id(&self) -> PropertyKey<'gc> {
        PropertyKey::Symbol(self.root.external_property_id)
    }

    pub fn is_execution_disabled(&self) -> bool {
        self.root.state.execution_disabled.get()
    }

    fn check_allocation_budget(&self) -> Result<(), JsErrorCode> {
        let state = &self.root.state;
        if let Some(max) = state.options.max_objects
            && state.live_objects.get() >= max
        {
            log::debug!("object allocation refused: {} live objects, budget {}", state.live_objects.get(), max);
            return Err(JsErrorCode::OutOfMemory);
        }
        Ok(())
    }

    fn alloc_object(&self, kind: ObjectKind<'gc>) -> Result<JSObjectDataPtr<'gc>, JsErrorCode> {
        self.check_allocation_budget()?;
        Ok(new_js_object_data(self.mc, kind, &self.root.state))
    }

    pub fn create_object(&self) -> Result<JSObjectDataPtr<'gc>, JsErrorCode> {
        self.alloc_object(ObjectKind::Ordinary)
    }

    pub fn create_symbol(&self, description: Option<&str>) -> Gc<'gc, SymbolData> {
        Gc::new(
            self.mc,
            SymbolData {
                description: description.map(str::to_string),
            },
        )
    }

    pub fn create_native_function(&self, callback: NativeCallback) -> Result<Value<'gc>, JsErrorCode> {
        Ok(Value::Object(self.alloc_object(ObjectKind::Function(NativeFunction::Host(callback)))?))
    }

    /// Creates a pending promise together with its resolve and reject functions.
    pub fn create_promise(&self) -> Result<(JSObjectDataPtr<'gc>, Value<'gc>, Value<'gc>), JsErrorCode> {
        let promise = self.alloc_object(ObjectKind::Promise(JSPromise::new()))?;
        let already_resolved = new_gc_cell_ptr(self.mc, false);
        let make_resolving = |kind| {
            self.alloc_object(ObjectKind::Function(NativeFunction::Resolving {
                promise: Gc::downgrade(promise),
                already_resolved,
                kind,
            }))
        };
        let resolve = make_resolving(SettleKind::Fulfill)?;
        let reject = make_resolving(SettleKind::Reject)?;
        log::trace!("created native promise {:p}", Gc::as_ptr(promise));
        Ok((promise, Value::Object(resolve), Value::Object(reject)))
    }

    /// The state of the script-visible promise, as the engine tracks it.
    pub fn promise_state(&self, promise: &JSObjectDataPtr<'gc>) -> Result<PromiseState, JsErrorCode> {
        match &promise.borrow().kind {
            ObjectKind::Promise(p) => Ok(p.state),
            _ => Err(JsErrorCode::InvalidArgument),
        }
    }

    pub fn promise_value(&self, promise: &JSObjectDataPtr<'gc>) -> Result<Option<Value<'gc>>, JsErrorCode> {
        match &promise.borrow().kind {
            ObjectKind::Promise(p) => Ok(p.value.clone()),
            _ => Err(JsErrorCode::InvalidArgument),
        }
    }

    pub fn set_property(&self, obj: &JSObjectDataPtr<'gc>, key: PropertyKey<'gc>, value: Value<'gc>) -> Result<(), JsErrorCode> {
        let mut data = obj.borrow_mut(self.mc);
        if !data.extensible && !data.properties.contains_key(&key) {
            log::debug!("set_property: cannot add {} to a non-extensible object", key);
            return Err(JsErrorCode::ObjectNotExtensible);
        }
        data.properties.insert(key, value);
        Ok(())
    }

    /// Returns `Value::Undefined` for absent properties.
    pub fn get_property(&self, obj: &JSObjectDataPtr<'gc>, key: &PropertyKey<'gc>) -> Value<'gc> {
        obj.borrow().properties.get(key).cloned().unwrap_or(Value::Undefined)
    }

    pub fn has_own_property(&self, obj: &JSObjectDataPtr<'gc>, key: &PropertyKey<'gc>) -> bool {
        obj.borrow().properties.contains_key(key)
    }

    /// String-keyed own properties in insertion order. Symbol keys, including
    /// the hidden external data key, are not reported.
    pub fn own_property_names(&self, obj: &JSObjectDataPtr<'gc>) -> Vec<String> {
        obj.borrow()
            .properties
            .keys()
            .filter_map(|k| match k {
                PropertyKey::String(s) => Some(s.clone()),
                PropertyKey::Symbol(_) => None,
            })
            .collect()
    }

    pub fn prevent_extensions(&self, obj: &JSObjectDataPtr<'gc>) {
        obj.borrow_mut(self.mc).extensible = false;
    }

    pub fn create_external_object(
        &self,
        data: Option<Box<dyn Any>>,
        finalizer: Option<JsFinalizeCallback>,
    ) -> Result<JSObjectDataPtr<'gc>, ExternalObjectError> {
        if let Err(code) = self.check_allocation_budget() {
            return Err((code, data));
        }
        let slot = ExternalSlot::new(data, finalizer, &self.root.state);
        Ok(new_js_object_data(self.mc, ObjectKind::External(slot), &self.root.state))
    }

    /// Runs `f` on the payload of an external object. The payload is `None`
    /// when it was created empty or has been detached.
    ///
    /// The payload is exclusively borrowed while `f` runs; a nested call on the
    /// same external object fails with `InvalidArgument`.
    pub fn with_external_data<R>(&self, obj: &JSObjectDataPtr<'gc>, f: impl FnOnce(Option<&mut (dyn Any + 'static)>) -> R) -> Result<R, JsErrorCode> {
        let mut data = obj.try_borrow_mut(self.mc).map_err(|_| self.already_borrowed(obj))?;
        match &mut data.kind {
            ObjectKind::External(slot) => Ok(f(slot.data_mut())),
            _ => Err(JsErrorCode::InvalidArgument),
        }
    }

    /// Detaches the payload of an external object without finalizing it.
    pub fn take_external_data(&self, obj: &JSObjectDataPtr<'gc>) -> Result<Option<Box<dyn Any>>, JsErrorCode> {
        let mut data = obj.try_borrow_mut(self.mc).map_err(|_| self.already_borrowed(obj))?;
        match &mut data.kind {
            ObjectKind::External(slot) => Ok(slot.take_data()),
            _ => Err(JsErrorCode::InvalidArgument),
        }
    }

    fn already_borrowed(&self, obj: &JSObjectDataPtr<'gc>) -> JsErrorCode {
        log::debug!("external object {:p} is already borrowed", Gc::as_ptr(*obj));
        JsErrorCode::InvalidArgument
    }

    /// Calls `function` with `args[0]` as the receiver and the rest as
    /// positional arguments.
    pub fn call_function(&self, function: &Value<'gc>, args: &[Value<'gc>]) -> Result<Value<'gc>, JsErrorCode> {
        if self.is_execution_disabled() {
            return Err(JsErrorCode::InDisabledState);
        }
        let Some((this, rest)) = args.split_first() else {
            return Err(JsErrorCode::InvalidArgument);
        };
        let Value::Object(obj) = function else {
            return Err(JsErrorCode::NotAFunction);
        };
        let native = match &obj.borrow().kind {
            ObjectKind::Function(native) => native.clone(),
            _ => return Err(JsErrorCode::NotAFunction),
        };

        match native {
            NativeFunction::Resolving {
                promise,
                already_resolved,
                kind,
            } => {
                if *already_resolved.borrow() {
                    return Ok(Value::Undefined);
                }
                *already_resolved.borrow_mut(self.mc) = true;
                let value = rest.first().cloned().unwrap_or(Value::Undefined);
                if let Some(promise) = promise.upgrade(self.mc) {
                    self.settle_promise(&promise, kind, value);
                }
                Ok(Value::Undefined)
            }
            NativeFunction::Host(callback) => callback(*self, this, rest),
        }
    }

    fn settle_promise(&self, promise: &JSObjectDataPtr<'gc>, kind: SettleKind, value: Value<'gc>) {
        let mut data = promise.borrow_mut(self.mc);
        if let ObjectKind::Promise(p) = &mut data.kind
            && p.state == PromiseState::Pending
        {
            p.state = match kind {
                SettleKind::Fulfill => PromiseState::Fulfilled,
                SettleKind::Reject => PromiseState::Rejected,
            };
            log::trace!("native promise {:p} settled: {}", Gc::as_ptr(*promise), p.state);
            p.value = Some(value);
        }
    }

    /// Drops roots queued by released persistent handles. Returns how many
    /// were removed.
    pub(crate) fn release_pending_roots(&self) -> usize {
        let pending = std::mem::take(&mut *self.root.state.pending_releases.borrow_mut());
        if pending.is_empty() {
            return 0;
        }
        let mut roots = self.root.persistent.borrow_mut(self.mc);
        pending.into_iter().filter(|id| roots.remove(*id)).count()
    }
}
