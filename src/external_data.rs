//! # External data attachment
//!
//! Binds one piece of host-owned, typed state to an engine object. The state
//! lives in an external object stored under the isolate's well-known hidden
//! property key; when the collector reclaims the owning object it reclaims
//! the external object too, and the engine runs the registered finalize
//! callback with the payload.
//!
//! Several subsystems share the one key, so every payload carries an
//! [`ExternalDataTypes`] tag that is checked before the payload is handed out
//! as a concrete type.

use crate::core::{Context, JSObjectDataPtr, JsFinalizeCallback, Value};
use crate::error::JsErrorCode;
use std::any::Any;

/// Kinds of host records that may be attached to an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExternalDataTypes {
    Unknown,
    PromiseResolverData,
    /// Free for embedders attaching their own records.
    EmbedderData,
}

/// A host record that can be attached to an engine object.
pub trait ExternalData: Any {
    const EXTERNAL_DATA_TYPE: ExternalDataTypes;
}

/// The payload actually stored in the external object.
struct TaggedExternalData {
    data_type: ExternalDataTypes,
    data: Box<dyn Any>,
}

/// Attaches `data` to `object` under the hidden external data key.
///
/// On failure nothing is attached and `data` is returned to the caller, who
/// remains responsible for disposing of it. An earlier attachment on the same
/// object is replaced; its external object becomes garbage and is finalized
/// by the next collection.
pub fn add_external_data<'gc, T: ExternalData>(
    cx: &Context<'gc>,
    object: &JSObjectDataPtr<'gc>,
    data: Box<T>,
    finalizer: JsFinalizeCallback,
) -> Result<(), (JsErrorCode, Box<T>)> {
    let tagged: Box<dyn Any> = Box::new(TaggedExternalData {
        data_type: T::EXTERNAL_DATA_TYPE,
        data,
    });

    let external = match cx.create_external_object(Some(tagged), Some(finalizer)) {
        Ok(external) => external,
        Err((code, payload)) => return Err((code, reclaim::<T>(payload))),
    };

    if let Err(code) = cx.set_property(object, cx.external_property_id(), Value::Object(external)) {
        // Detach the payload so the orphaned external object finalizes empty.
        let payload = cx.take_external_data(&external).ok().flatten();
        return Err((code, reclaim::<T>(payload)));
    }

    log::trace!("attached {:?} external data", T::EXTERNAL_DATA_TYPE);
    Ok(())
}

fn reclaim<T: ExternalData>(payload: Option<Box<dyn Any>>) -> Box<T> {
    payload
        .and_then(|payload| payload.downcast::<TaggedExternalData>().ok())
        .and_then(|tagged| tagged.data.downcast::<T>().ok())
        .unwrap_or_else(|| unreachable!("external payload is always the TaggedExternalData created above"))
}

/// Looks up the record of type `T` attached to `object` and runs `f` on it.
///
/// Returns `None`, never an error, when the object has no attachment, the
/// hidden property does not hold an external object, the payload was put
/// there by something else, or it is tagged with another record type. A
/// lookup nested inside `f` on the same object also reports `None`, since the
/// payload is still borrowed.
pub fn try_get_from_property<'gc, T: ExternalData, R>(cx: &Context<'gc>, object: &JSObjectDataPtr<'gc>, f: impl FnOnce(&mut T) -> R) -> Option<R> {
    let Value::Object(external) = cx.get_property(object, &cx.external_property_id()) else {
        return None;
    };

    cx.with_external_data(&external, |payload| {
        let tagged = payload?.downcast_mut::<TaggedExternalData>()?;
        if tagged.data_type != T::EXTERNAL_DATA_TYPE {
            log::trace!("external data tag mismatch: wanted {:?}, found {:?}", T::EXTERNAL_DATA_TYPE, tagged.data_type);
            return None;
        }
        tagged.data.downcast_mut::<T>().map(f)
    })
    .ok()
    .flatten()
}

pub fn has_external_data<'gc, T: ExternalData>(cx: &Context<'gc>, object: &JSObjectDataPtr<'gc>) -> bool {
    try_get_from_property::<T, ()>(cx, object, |_| ()).is_some()
}

/// Finalize callback that simply releases whatever was attached.
pub fn drop_external_data(data: Option<Box<dyn Any>>) {
    if let Some(data) = data {
        drop(data);
    }
}
