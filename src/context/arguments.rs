//! # Caller-supplied arguments.
//!
//! [`Arguments`] is an immutable list of opaque values threaded through a run alongside the
//! cancellation signal. Values are retrieved with the typed accessor [`Arguments::get`].
//!
//! ## Example
//! ```rust
//! use routine::{args, Arguments};
//!
//! let a: Arguments = args![1i32, "ok", false];
//! assert_eq!(a.len(), 3);
//! assert_eq!(a.get::<i32>(0), Some(&1));
//! assert_eq!(a.get::<&str>(1), Some(&"ok"));
//! assert_eq!(a.get::<bool>(0), None); // wrong type
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// One opaque argument value.
pub type Arg = Arc<dyn Any + Send + Sync>;

/// Immutable, cheaply clonable argument list.
#[derive(Clone, Default)]
pub struct Arguments {
    values: Arc<[Arg]>,
}

impl Arguments {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an argument list from already type-erased values.
    pub fn from_values(values: Vec<Arg>) -> Self {
        Self {
            values: values.into(),
        }
    }

    /// Returns a new list with `value` appended.
    pub fn with<T: Any + Send + Sync>(&self, value: T) -> Self {
        let mut values: Vec<Arg> = self.values.to_vec();
        values.push(Arc::new(value));
        Self::from_values(values)
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value at `index` if it exists and has type `T`.
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.values.get(index)?.downcast_ref::<T>()
    }

    /// Returns the type-erased value at `index`.
    pub fn raw(&self, index: usize) -> Option<&Arg> {
        self.values.get(index)
    }

    /// Iterates over the type-erased values.
    pub fn iter(&self) -> impl Iterator<Item = &Arg> {
        self.values.iter()
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("len", &self.values.len())
            .finish()
    }
}

impl<T: Any + Send + Sync> FromIterator<T> for Arguments {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_values(iter.into_iter().map(|v| Arc::new(v) as Arg).collect())
    }
}

/// Builds an [`Arguments`] list from heterogeneous values.
#[macro_export]
macro_rules! args {
    () => {
        $crate::Arguments::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Arguments::from_values(vec![
            $(::std::sync::Arc::new($value) as $crate::Arg),+
        ])
    };
}
