//! # Promise and Promise Resolver
//!
//! A V8-shaped `Promise` / `Promise::Resolver` API implemented on top of the
//! engine's native promise capability.
//!
//! ## Architecture Overview
//!
//! 1. [`PromiseResolver::new`] asks the engine for a promise together with its
//!    resolve and reject functions.
//! 2. The two functions are kept in a [`PromiseResolverData`] record that also
//!    mirrors the settlement state and result.
//! 3. The record is attached to the promise object through the external data
//!    layer; from then on the collector owns it, and it is dropped by the
//!    external object's finalize callback.
//! 4. Every later call finds the record again from the promise object.
//!
//! A promise created any other way has no record. It reports `Pending` and no
//! result, and cannot be settled through this API.
//!
//! Reaction chaining (`then` / `catch`) is not supported.

use crate::core::{Context, JSObjectDataPtr, Persistent, Value};
use crate::external_data::{ExternalData, ExternalDataTypes, add_external_data, try_get_from_property};
use std::any::Any;

pub use crate::core::PromiseState;

/// Host record attached to every promise created by [`PromiseResolver::new`].
pub(crate) struct PromiseResolverData {
    resolve: Persistent,
    reject: Persistent,
    result: Option<Persistent>,
    state: PromiseState,
}

impl ExternalData for PromiseResolverData {
    const EXTERNAL_DATA_TYPE: ExternalDataTypes = ExternalDataTypes::PromiseResolverData;
}

impl PromiseResolverData {
    fn new<'gc>(cx: &Context<'gc>, resolve: Value<'gc>, reject: Value<'gc>) -> Self {
        PromiseResolverData {
            resolve: Persistent::new(cx, resolve),
            reject: Persistent::new(cx, reject),
            result: None,
            state: PromiseState::Pending,
        }
    }

    fn finalize_callback(data: Option<Box<dyn Any>>) {
        if let Some(data) = data {
            log::trace!("releasing promise resolver data");
            drop(data);
        }
    }

    fn state(&self) -> PromiseState {
        self.state
    }

    fn result<'gc>(&self, cx: &Context<'gc>) -> Option<Value<'gc>> {
        self.result.as_ref().and_then(|result| result.get(cx).ok())
    }

    fn settle_function<'gc>(&self, cx: &Context<'gc>, target: PromiseState) -> Option<Value<'gc>> {
        let handle = match target {
            PromiseState::Fulfilled => &self.resolve,
            PromiseState::Rejected => &self.reject,
            PromiseState::Pending => return None,
        };
        handle.get(cx).ok()
    }

    fn record_settlement<'gc>(&mut self, cx: &Context<'gc>, target: PromiseState, value: Value<'gc>) {
        self.state = target;
        self.result = Some(Persistent::new(cx, value));
    }
}

/// Looks up the record, calls the captured resolve or reject function with
/// `(undefined, value)` and, only if that call succeeds, overwrites the
/// mirrored state and result.
fn settle<'gc>(cx: &Context<'gc>, promise: &JSObjectDataPtr<'gc>, target: PromiseState, value: Value<'gc>) -> Option<bool> {
    let function = try_get_from_property(cx, promise, |data: &mut PromiseResolverData| data.settle_function(cx, target)).flatten()?;

    let args = [cx.get_undefined(), value.clone()];
    if let Err(err) = cx.call_function(&function, &args) {
        log::debug!("settling promise as {} failed: {}", target, err);
        return None;
    }

    // The record is looked up again: the call may have run host code that
    // replaced the attachment. The engine has settled either way.
    if try_get_from_property(cx, promise, |data: &mut PromiseResolverData| data.record_settlement(cx, target, value)).is_none() {
        log::debug!("promise settled as {} but its resolver record is gone", target);
    }
    Some(true)
}

/// A script promise, viewed through the host API.
#[derive(Clone, Copy)]
pub struct Promise<'gc>(JSObjectDataPtr<'gc>);

impl<'gc> Promise<'gc> {
    /// Narrows `value` to a promise.
    ///
    /// The caller must already know `value` is a promise (see
    /// [`Value::is_promise`]); this is a reinterpretation, not a conversion.
    pub fn cast(value: &Value<'gc>) -> Promise<'gc> {
        debug_assert!(value.is_promise(), "Promise::cast on a non-promise value");
        match value {
            Value::Object(obj) => Promise(*obj),
            _ => panic!("Promise::cast on a non-object value"),
        }
    }

    pub fn object(&self) -> JSObjectDataPtr<'gc> {
        self.0
    }

    pub fn as_value(&self) -> Value<'gc> {
        Value::Object(self.0)
    }

    /// `Pending` for promises this API did not create.
    pub fn state(&self, cx: &Context<'gc>) -> PromiseState {
        try_get_from_property(cx, &self.0, |data: &mut PromiseResolverData| data.state()).unwrap_or(PromiseState::Pending)
    }

    /// The value of the last successful resolve or reject, if any.
    ///
    /// `None` both for pending promises and for promises this API did not
    /// create; the two cannot be told apart here.
    pub fn result(&self, cx: &Context<'gc>) -> Option<Value<'gc>> {
        try_get_from_property(cx, &self.0, |data: &mut PromiseResolverData| data.result(cx)).flatten()
    }

    pub fn then(&self, _cx: &Context<'gc>, _handler: Value<'gc>) -> Option<Promise<'gc>> {
        panic!("Promise::then is not supported");
    }

    pub fn catch(&self, _cx: &Context<'gc>, _handler: Value<'gc>) -> Option<Promise<'gc>> {
        panic!("Promise::catch is not supported");
    }
}

impl<'gc> PartialEq for Promise<'gc> {
    fn eq(&self, other: &Self) -> bool {
        crate::core::Gc::ptr_eq(self.0, other.0)
    }
}

impl<'gc> std::fmt::Debug for Promise<'gc> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Promise({:p})", crate::core::Gc::as_ptr(self.0))
    }
}

/// The capability to settle one promise. Shares its object with the promise.
#[derive(Clone, Copy)]
pub struct PromiseResolver<'gc>(JSObjectDataPtr<'gc>);

impl<'gc> PromiseResolver<'gc> {
    /// Creates a pending promise and its resolver.
    ///
    /// Returns `None` if the engine cannot create the promise or the record
    /// cannot be attached to it. In the latter case the record is dropped
    /// here and the already created promise is left untracked.
    pub fn new(cx: &Context<'gc>) -> Option<PromiseResolver<'gc>> {
        let (promise, resolve, reject) = match cx.create_promise() {
            Ok(triple) => triple,
            Err(err) => {
                log::debug!("PromiseResolver::new: engine could not create a promise: {}", err);
                return None;
            }
        };

        let data = Box::new(PromiseResolverData::new(cx, resolve, reject));
        if let Err((err, data)) = add_external_data(cx, &promise, data, PromiseResolverData::finalize_callback) {
            log::debug!("PromiseResolver::new: attaching resolver data failed: {}", err);
            drop(data);
            return None;
        }

        Some(PromiseResolver(promise))
    }

    /// Like [`new`](Self::new) but treats failure as fatal.
    pub fn new_checked(cx: &Context<'gc>) -> PromiseResolver<'gc> {
        match Self::new(cx) {
            Some(resolver) => resolver,
            None => panic!("PromiseResolver::new_checked: could not create a promise resolver"),
        }
    }

    /// Narrows `value` to a resolver. Same contract as [`Promise::cast`].
    pub fn cast(value: &Value<'gc>) -> PromiseResolver<'gc> {
        PromiseResolver(Promise::cast(value).0)
    }

    pub fn get_promise(&self) -> Promise<'gc> {
        Promise(self.0)
    }

    pub fn as_value(&self) -> Value<'gc> {
        Value::Object(self.0)
    }

    /// `None` if this object has no resolver record or the engine's resolve
    /// function failed; state and result are untouched in that case.
    pub fn resolve(&self, cx: &Context<'gc>, value: Value<'gc>) -> Option<bool> {
        settle(cx, &self.0, PromiseState::Fulfilled, value)
    }

    pub fn reject(&self, cx: &Context<'gc>, value: Value<'gc>) -> Option<bool> {
        settle(cx, &self.0, PromiseState::Rejected, value)
    }

    /// Resolves without reporting the outcome to the caller. Failures are
    /// logged.
    pub fn resolve_value(&self, cx: &Context<'gc>, value: Value<'gc>) {
        if self.resolve(cx, value).is_none() {
            log::warn!("PromiseResolver::resolve_value: promise was not resolved");
        }
    }

    pub fn reject_value(&self, cx: &Context<'gc>, value: Value<'gc>) {
        if self.reject(cx, value).is_none() {
            log::warn!("PromiseResolver::reject_value: promise was not rejected");
        }
    }
}

impl<'gc> PartialEq for PromiseResolver<'gc> {
    fn eq(&self, other: &Self) -> bool {
        crate::core::Gc::ptr_eq(self.0, other.0)
    }
}

impl<'gc> std::fmt::Debug for PromiseResolver<'gc> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PromiseResolver({:p})", crate::core::Gc::as_ptr(self.0))
    }
}
