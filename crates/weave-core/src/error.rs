use crate::host::HostError;
use crate::value::Value;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A component was constructed from something other than a component definition.
    #[error("cannot construct a component from {found}; expected a component definition")]
    InvalidConstructor { found: &'static str },

    #[error("public property `{prop}` of <{component}> requires a getter")]
    MissingGetter { component: String, prop: String },

    #[error("public property `{prop}` of <{component}> requires a setter")]
    MissingSetter { component: String, prop: String },

    #[error("public property `{prop}` of <{component}> declares a setter without a getter")]
    SetterOnlyProperty { component: String, prop: String },

    #[error("public method `{method}` of <{component}> is not defined")]
    MissingMethod { component: String, method: String },

    #[error("`{prop}` of <{component}> is read-only")]
    ReadOnlyProperty { component: String, prop: String },

    #[error("`{prop}` of <{component}> can only be set by its owner")]
    NotOwner { component: String, prop: String },

    #[error("`{name}` of <{component}> is not a public method")]
    NotAMethod { component: String, name: String },

    #[error("vnode has not been mounted")]
    NotMounted,

    #[error("component instance is no longer alive")]
    Detached,

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("microtask checkpoint exceeded {limit} tasks")]
    RunawayMicrotasks { limit: usize },

    #[error("{0}")]
    Callback(String),
}

impl Error {
    /// Error raised from user component code.
    pub fn callback(message: impl Into<String>) -> Self {
        Error::Callback(message.into())
    }

    pub(crate) fn invalid_constructor(value: &Value) -> Self {
        Error::InvalidConstructor {
            found: value.type_name(),
        }
    }

    /// Whether this error is a fatal declaration problem detected at mount time.
    pub fn is_declaration_error(&self) -> bool {
        matches!(
            self,
            Error::MissingGetter { .. }
                | Error::MissingSetter { .. }
                | Error::SetterOnlyProperty { .. }
                | Error::MissingMethod { .. }
        )
    }

    /// Whether this error is an access violation on the public surface.
    pub fn is_access_violation(&self) -> bool {
        matches!(
            self,
            Error::ReadOnlyProperty { .. } | Error::NotOwner { .. } | Error::NotAMethod { .. }
        )
    }
}
