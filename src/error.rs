use crate::observer::Method;

/// Registration failed because the observer does not answer to the method.
///
/// Nothing was mutated when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("observer does not respond to `{method}`")]
pub struct InvalidObserver {
    pub method: Method,
}

impl InvalidObserver {
    pub(crate) fn new(method: Method) -> Self {
        Self { method }
    }
}
