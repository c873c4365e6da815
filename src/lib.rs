pub(crate) mod core;
pub(crate) mod error;
pub(crate) mod external_data;
pub(crate) mod js_promise;

pub use crate::core::{
    Context, ExternalObjectError, Isolate, IsolateOptions, JSObjectData, JSObjectDataPtr, JsArena, JsFinalizeCallback, NativeCallback,
    ObjectKind, Persistent, PromiseState, PropertyKey, RootId, SymbolData, Value, value_to_string,
};
pub use error::{JSError, JsErrorCode};
pub use external_data::{ExternalData, ExternalDataTypes, add_external_data, drop_external_data, has_external_data, try_get_from_property};
pub use js_promise::{Promise, PromiseResolver};
