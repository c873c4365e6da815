/// Error codes reported by the host engine primitives.
///
/// The set mirrors the codes a JSRT-style embedding API hands back from its
/// `Js*` entry points; the promise layer collapses all of them into `None`.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsErrorCode {
    #[error("An argument to a hosting API was invalid")]
    InvalidArgument,

    #[error("An argument to a hosting API was null in a context where null is not allowed")]
    NullArgument,

    #[error("The object is not extensible")]
    ObjectNotExtensible,

    #[error("The hosting interface ran out of memory")]
    OutOfMemory,

    #[error("Script execution is disabled for this runtime")]
    InDisabledState,

    #[error("The value is not a function")]
    NotAFunction,

    #[error("A JavaScript exception occurred while running a script")]
    ScriptException,
}

#[derive(thiserror::Error, Debug)]
pub enum JSError {
    #[error("Engine error: {0}")]
    Engine(#[from] JsErrorCode),

    #[error("Persistent handle {id} belongs to a different isolate")]
    ForeignHandle { id: u32 },

    #[error("Persistent handle {id} has already been reset")]
    ReleasedHandle { id: u32 },
}
