//! Copy-on-write drafts of the machine data.

use std::sync::Arc;

/// A working copy of the data for one chain run.
///
/// The draft shares the committed value until the first write, at which
/// point the value is cloned. Committing hands the (possibly new) value back;
/// dropping the draft discards every change without touching the committed
/// value.
///
/// # Example
///
/// ```rust
/// use statecraft::core::Draft;
/// use std::sync::Arc;
///
/// let committed = Arc::new(vec![1, 2]);
/// let mut draft = Draft::new(Arc::clone(&committed));
/// draft.to_mut().push(3);
///
/// assert!(draft.is_dirty());
/// assert_eq!(*committed, vec![1, 2]);
/// assert_eq!(*draft.commit(), vec![1, 2, 3]);
/// ```
#[derive(Debug)]
pub struct Draft<D> {
    base: Arc<D>,
    working: Arc<D>,
}

impl<D: Clone> Draft<D> {
    pub fn new(base: Arc<D>) -> Self {
        Self {
            working: Arc::clone(&base),
            base,
        }
    }

    /// Current value of the draft.
    pub fn get(&self) -> &D {
        &self.working
    }

    /// Mutable access; clones the data on first write.
    pub fn to_mut(&mut self) -> &mut D {
        Arc::make_mut(&mut self.working)
    }

    /// True once the draft diverged from the committed value.
    pub fn is_dirty(&self) -> bool {
        !Arc::ptr_eq(&self.base, &self.working)
    }

    pub fn commit(self) -> Arc<D> {
        self.working
    }
}
