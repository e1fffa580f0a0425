//! Observer-side traits and the method name an observer is registered under.

use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;

/// Name of the method an observer is notified through.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Method(Cow<'static, str>);

impl Method {
    /// The method used when none is given.
    pub const UPDATE: Method = Method(Cow::Borrowed("update"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Method(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Method {
    fn default() -> Self {
        Method::UPDATE
    }
}

impl Deref for Method {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Method {
    fn from(name: &'static str) -> Self {
        Method(Cow::Borrowed(name))
    }
}

impl From<String> for Method {
    fn from(name: String) -> Self {
        Method(Cow::Owned(name))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trailing callback handed through `notify` to every observer.
pub type Callback<'a, A, R> = dyn Fn(&A) -> R + 'a;

/// Anything that can be registered with an `Observable`.
///
/// Registration only checks that the observer answers to the requested method;
/// dispatch itself goes through [`Receive`].
pub trait Observer {
    fn responds_to(&self, method: &str) -> bool;
}

/// Dispatch of a named notification carrying arguments of type `A`.
///
/// `method` is always one `responds_to` accepted when the observer was added.
/// An `Err` aborts the surrounding `notify` and reaches its caller unchanged.
pub trait Receive<A: ?Sized>: Observer {
    type Output;
    type Error;

    fn receive(
        &self,
        method: &str,
        args: &A,
        callback: Option<&Callback<'_, A, Self::Output>>,
    ) -> Result<Self::Output, Self::Error>;
}
