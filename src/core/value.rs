use crate::core::{Collect, ExternalSlot, Gc, GcPtr, GcWeak, IsolateState, MutationContext, PropertyKey, new_gc_cell_ptr};
use crate::core::{Context, GcCell};
use crate::error::JsErrorCode;
use std::rc::Rc;

pub type JSObjectDataPtr<'gc> = GcPtr<'gc, JSObjectData<'gc>>;
pub type JSObjectDataWeakPtr<'gc> = GcWeak<'gc, GcCell<JSObjectData<'gc>>>;

/// Signature of a host-implemented function object.
///
/// `this` is the receiver slot (`args[0]` of a `call_function`), `args` the
/// remaining positional arguments.
pub type NativeCallback = for<'gc> fn(Context<'gc>, &Value<'gc>, &[Value<'gc>]) -> Result<Value<'gc>, JsErrorCode>;

#[derive(Debug, Collect)]
#[collect(require_static)]
pub struct SymbolData {
    pub description: Option<String>,
}

/// Settlement state of a promise.
///
/// The discriminants match `v8::Promise::PromiseState`.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Collect)]
#[collect(require_static)]
pub enum PromiseState {
    Pending = 0,
    Fulfilled = 1,
    Rejected = 2,
}

impl std::fmt::Display for PromiseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PromiseState::Pending => "pending",
            PromiseState::Fulfilled => "fulfilled",
            PromiseState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Collect)]
#[collect(no_drop)]
pub struct JSPromise<'gc> {
    pub state: PromiseState,
    pub value: Option<Value<'gc>>,
}

impl<'gc> JSPromise<'gc> {
    pub fn new() -> Self {
        Self {
            state: PromiseState::Pending,
            value: None,
        }
    }
}

impl<'gc> Default for JSPromise<'gc> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettleKind {
    Fulfill,
    Reject,
}

#[derive(Clone)]
pub enum NativeFunction<'gc> {
    /// One half of a promise capability. Both halves share `already_resolved`,
    /// and hold their promise weakly: once the promise is unreachable nothing
    /// can observe its settlement.
    Resolving {
        promise: JSObjectDataWeakPtr<'gc>,
        already_resolved: GcPtr<'gc, bool>,
        kind: SettleKind,
    },
    Host(NativeCallback),
}

pub enum ObjectKind<'gc> {
    Ordinary,
    Function(NativeFunction<'gc>),
    Promise(JSPromise<'gc>),
    External(ExternalSlot),
}

/// Decrements the isolate's live object count when the owning object is swept.
pub struct AllocationToken {
    state: Rc<IsolateState>,
}

impl AllocationToken {
    pub(crate) fn new(state: &Rc<IsolateState>) -> Self {
        state.live_objects.set(state.live_objects.get() + 1);
        Self { state: state.clone() }
    }
}

impl Drop for AllocationToken {
    fn drop(&mut self) {
        let live = self.state.live_objects.get();
        self.state.live_objects.set(live.saturating_sub(1));
    }
}

pub struct JSObjectData<'gc> {
    pub properties: indexmap::IndexMap<PropertyKey<'gc>, Value<'gc>>,
    // Whether new own properties can be added to this object. Default true.
    pub extensible: bool,
    pub kind: ObjectKind<'gc>,
    _token: AllocationToken,
}

impl<'gc> JSObjectData<'gc> {
    pub(crate) fn new(kind: ObjectKind<'gc>, token: AllocationToken) -> Self {
        JSObjectData {
            properties: indexmap::IndexMap::new(),
            extensible: true,
            kind,
            _token: token,
        }
    }

    pub fn is_promise(&self) -> bool {
        matches!(self.kind, ObjectKind::Promise(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }
}

pub(crate) fn new_js_object_data<'gc>(mc: &MutationContext<'gc>, kind: ObjectKind<'gc>, state: &Rc<IsolateState>) -> JSObjectDataPtr<'gc> {
    new_gc_cell_ptr(mc, JSObjectData::new(kind, AllocationToken::new(state)))
}

#[derive(Clone)]
pub enum Value<'gc> {
    Number(f64),
    String(String),
    Boolean(bool),
    Undefined,
    Null,
    Symbol(Gc<'gc, SymbolData>),
    Object(JSObjectDataPtr<'gc>),
}

impl<'gc> Value<'gc> {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn is_promise(&self) -> bool {
        match self {
            Value::Object(obj) => obj.borrow().is_promise(),
            _ => false,
        }
    }

    pub fn is_function(&self) -> bool {
        match self {
            Value::Object(obj) => obj.borrow().is_function(),
            _ => false,
        }
    }

    pub fn as_object(&self) -> Option<JSObjectDataPtr<'gc>> {
        match self {
            Value::Object(obj) => Some(*obj),
            _ => None,
        }
    }
}

impl<'gc> PartialEq for Value<'gc> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Symbol(a), Value::Symbol(b)) => Gc::ptr_eq(*a, *b),
            (Value::Object(a), Value::Object(b)) => Gc::ptr_eq(*a, *b),
            _ => false,
        }
    }
}

impl<'gc> From<f64> for Value<'gc> {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl<'gc> From<bool> for Value<'gc> {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<'gc> From<&str> for Value<'gc> {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<'gc> From<String> for Value<'gc> {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<'gc> From<JSObjectDataPtr<'gc>> for Value<'gc> {
    fn from(obj: JSObjectDataPtr<'gc>) -> Self {
        Value::Object(obj)
    }
}

pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Number(n) => {
            if n.is_nan() {
                "NaN".to_string()
            } else if n.is_infinite() {
                if *n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
            } else if *n == 0.0 {
                // Covers -0 too.
                "0".to_string()
            } else if n.fract() == 0.0 && n.abs() < 1e21 {
                format!("{:.0}", n)
            } else {
                format!("{}", n)
            }
        }
        Value::String(s) => s.clone(),
        Value::Boolean(b) => b.to_string(),
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Symbol(sym) => match &sym.description {
            Some(desc) => format!("Symbol({})", desc),
            None => "Symbol()".to_string(),
        },
        Value::Object(obj) => match &obj.borrow().kind {
            ObjectKind::Promise(_) => "[object Promise]".to_string(),
            ObjectKind::Function(_) => "function () { [native code] }".to_string(),
            ObjectKind::External(_) | ObjectKind::Ordinary => "[object Object]".to_string(),
        },
    }
}

impl<'gc> std::fmt::Debug for Value<'gc> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(obj) => write!(f, "{} @ {:p}", value_to_string(self), Gc::as_ptr(*obj)),
            _ => f.write_str(&value_to_string(self)),
        }
    }
}
