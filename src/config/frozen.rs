//! Read-only handles to composed configurations.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use super::compose::SectionInfo;

/// A shared, immutable configuration.
///
/// The value is only reachable through `Deref`, so neither the composite
/// nor any model inside it can be reassigned once frozen:
///
/// ```compile_fail
/// # use mdtc::Frozen;
/// struct Settings { level: i64 }
/// let frozen = Frozen::new(Settings { level: 1 }, "inline");
/// frozen.level = 2;
/// ```
///
/// Clones share one allocation; [`Frozen::ptr_eq`] tells whether two
/// handles are the same instance.
pub struct Frozen<C> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    value: C,
    origin: String,
    sections: Vec<SectionInfo>,
}

impl<C> Frozen<C> {
    /// Freezes `value`. `origin` names where it came from.
    pub fn new(value: C, origin: impl Into<String>) -> Self {
        Self::with_sections(value, origin.into(), Vec::new())
    }

    pub(crate) fn with_sections(value: C, origin: String, sections: Vec<SectionInfo>) -> Self {
        Self {
            inner: Arc::new(Inner {
                value,
                origin,
                sections,
            }),
        }
    }

    /// True when both handles point to the same frozen instance.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    pub fn origin(&self) -> &str {
        &self.inner.origin
    }

    /// Declared sections in declaration order. Empty for values frozen
    /// directly with [`Frozen::new`].
    pub fn sections(&self) -> &[SectionInfo] {
        &self.inner.sections
    }
}

impl<C> Clone for Frozen<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> Deref for Frozen<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.inner.value
    }
}

impl<C> AsRef<C> for Frozen<C> {
    fn as_ref(&self) -> &C {
        &self.inner.value
    }
}

impl<C: fmt::Debug> fmt::Debug for Frozen<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frozen")
            .field("config", &std::any::type_name::<C>())
            .field("origin", &self.inner.origin)
            .field("value", &self.inner.value)
            .finish()
    }
}
