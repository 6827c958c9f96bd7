use parking_lot::Mutex;

/// Component state that can be handed to a fresh view after its previous
/// view is gone.
pub trait Recycle: Default + Send + 'static {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Bounded free list of component states, one per component type.
pub struct Pool<C> {
    items: Mutex<Vec<C>>,
    max_size: usize,
}

impl<C: Recycle> Pool<C> {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: Mutex::new(Vec::with_capacity(max_size.min(16))),
            max_size,
        }
    }

    pub fn checkout(&self) -> C {
        self.items.lock().pop().unwrap_or_default()
    }

    /// Resets `item` and keeps it unless the pool is full.
    pub fn checkin(&self, mut item: C) {
        item.reset();

        let mut items = self.items.lock();

        if items.len() < self.max_size {
            items.push(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
