use std::mem::MaybeUninit;

/// An index arena with slot reuse.
///
/// A `Slab` stores values of type `T` in a contiguous array and hands out
/// small integer keys that stay valid until the value is removed. Freed
/// keys are recycled by later insertions.
///
/// The wait queue uses it to hold waiter slots, so linking and unlinking a
/// waiter never allocates once the arena has grown to the peak number of
/// concurrent waiters.
pub(crate) struct Slab<T> {
    /// Storage for items (may contain uninitialized slots).
    items: Vec<MaybeUninit<T>>,
    /// Stack of free indices that can be reused.
    free: Vec<usize>,
    /// Marks whether a slot is currently initialized.
    used: Vec<bool>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates an empty slab without allocating.
    pub(crate) const fn new() -> Self {
        Self {
            items: Vec::new(),
            free: Vec::new(),
            used: Vec::new(),
            len: 0,
        }
    }

    /// Returns the number of occupied slots.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if `key` refers to an occupied slot.
    pub(crate) fn contains(&self, key: usize) -> bool {
        self.used.get(key).copied().unwrap_or(false)
    }

    /// Inserts a value and returns its key.
    ///
    /// If a free slot is available, it is reused. Otherwise, the slab
    /// grows geometrically.
    pub(crate) fn insert(&mut self, item: T) -> usize {
        let index = if let Some(i) = self.free.pop() {
            i
        } else {
            let len = self.items.len();
            let new_len = if len == 0 { 4 } else { 2 * len };

            self.items
                .extend((len..new_len).map(|_| MaybeUninit::<T>::uninit()));
            // Pushed in reverse so the lowest keys are handed out first.
            self.free.extend(((len + 1)..new_len).rev());
            self.used.extend((len..new_len).map(|_| false));

            len
        };

        self.items[index] = MaybeUninit::new(item);
        self.used[index] = true;
        self.len += 1;

        index
    }

    /// Removes and returns the value stored at `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is out of bounds or the slot is vacant.
    pub(crate) fn remove(&mut self, key: usize) -> T {
        assert!(self.contains(key), "slab key {key} is vacant");

        self.free.push(key);
        self.used[key] = false;
        self.len -= 1;

        // SAFETY: `used[key]` was true, so the slot holds an initialized value,
        // and clearing the flag above prevents a second read.
        unsafe { self.items[key].assume_init_read() }
    }

    /// Returns a shared reference to the value at `key`, if occupied.
    pub(crate) fn get(&self, key: usize) -> Option<&T> {
        if self.contains(key) {
            // SAFETY: the slot is marked used, hence initialized.
            Some(unsafe { self.items[key].assume_init_ref() })
        } else {
            None
        }
    }

    /// Returns a mutable reference to the value at `key`, if occupied.
    pub(crate) fn get_mut(&mut self, key: usize) -> Option<&mut T> {
        if self.contains(key) {
            // SAFETY: the slot is marked used, hence initialized.
            Some(unsafe { self.items[key].assume_init_mut() })
        } else {
            None
        }
    }
}

impl<T> Drop for Slab<T> {
    /// Drops all initialized elements stored in the slab.
    fn drop(&mut self) {
        for (slot, &used) in self.items.iter_mut().zip(self.used.iter()) {
            if used {
                // SAFETY: `used` marks exactly the initialized slots.
                unsafe {
                    slot.assume_init_drop();
                }
            }
        }
    }
}
