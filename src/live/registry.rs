use std::{
    any::{Any, TypeId},
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;

use crate::{
    live::{
        pool::{Pool, Recycle},
        AnyView, ComponentId,
    },
    Error,
};

pub const DEFAULT_MAX_POOL_SIZE: usize = 64;

/// Process-wide directory of mounted views. Cloning shares the same map.
///
/// Every access goes through one lock; views are torn down after the lock is
/// released so component hooks never run under it.
#[derive(Clone)]
pub struct ComponentRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    entries: Mutex<HashMap<ComponentId, Arc<dyn AnyView>>>,
    pools: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    max_pool_size: usize,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POOL_SIZE)
    }
}

impl ComponentRegistry {
    pub fn new(max_pool_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                pools: Mutex::new(HashMap::new()),
                max_pool_size,
            }),
        }
    }

    /// Fails on an id that is already taken rather than orphaning the
    /// current owner.
    pub fn insert(&self, id: ComponentId, view: Arc<dyn AnyView>) -> crate::Result<()> {
        match self.inner.entries.lock().entry(id) {
            Entry::Occupied(occupied) => Err(Error::Duplicate(occupied.key().clone())),
            Entry::Vacant(vacant) => {
                vacant.insert(view);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<dyn AnyView>> {
        self.inner.entries.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.entries.lock().contains_key(id)
    }

    pub fn remove(&self, id: &str) -> Option<Arc<dyn AnyView>> {
        self.inner.entries.lock().remove(id)
    }

    /// Removes `id` and runs its unmount hook. Absent ids are ignored.
    pub fn unmount(&self, id: &str) {
        if let Some(view) = self.remove(id) {
            view.release();
        }
    }

    pub fn size(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Unmounts every disconnected view idle for longer than `threshold`.
    /// Views whose socket is gone count as disconnected.
    pub fn sweep(&self, threshold: Duration) -> usize {
        let mut expired = Vec::new();

        self.inner.entries.lock().retain(|_, view| {
            let keep = view.is_connected() || view.idle() <= threshold;

            if !keep {
                expired.push(view.clone());
            }

            keep
        });

        for view in &expired {
            log::debug!("sweep;id={}", view.id());
            view.release();
        }

        expired.len()
    }

    /// The shared state pool for component type `C`.
    pub fn pool<C: Recycle>(&self) -> Arc<Pool<C>> {
        let pool = self
            .inner
            .pools
            .lock()
            .entry(TypeId::of::<C>())
            .or_insert_with(|| {
                Arc::new(Pool::<C>::new(self.inner.max_pool_size)) as Arc<dyn Any + Send + Sync>
            })
            .clone();

        match pool.downcast::<Pool<C>>() {
            Ok(pool) => pool,
            Err(_) => unreachable!("pools are keyed by their own type id"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::live::{Component, Context, Event, Socket, View};

    #[derive(Default)]
    struct Label {
        text: String,
    }

    impl Component for Label {
        fn content(&self) -> crate::Result<String> {
            Ok(self.text.clone())
        }

        fn on_event(&mut self, event: &Event, ctx: &mut Context<'_, Self>) -> crate::Result<()> {
            self.text = event.value()?;
            ctx.refresh();
            Ok(())
        }
    }

    impl Recycle for Label {}

    #[test]
    fn insert_rejects_duplicate_id() {
        let registry = ComponentRegistry::default();
        let first = View::new(Label::default());
        let second = View::new(Label::default());

        registry.insert(first.id().clone(), first.clone()).unwrap();
        let result = registry.insert(first.id().clone(), second);

        assert!(matches!(result, Err(Error::Duplicate(id)) if &id == first.id()));
        assert_eq!(registry.size(), 1);
    }

    #[test]
    fn lookup_and_remove() {
        let registry = ComponentRegistry::default();
        let view = View::new(Label::default());
        view.mount(&registry).unwrap();

        assert!(registry.lookup(view.id().as_str()).is_some());
        assert!(registry.lookup("missing").is_none());

        assert!(registry.remove(view.id().as_str()).is_some());
        assert!(registry.remove(view.id().as_str()).is_none());
        assert_eq!(registry.size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_idle_disconnected_views() {
        let registry = ComponentRegistry::default();
        let abandoned = View::new(Label::default());
        abandoned.mount(&registry).unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        let fresh = View::new(Label::default());
        fresh.mount(&registry).unwrap();

        assert_eq!(registry.sweep(Duration::from_secs(60)), 1);
        assert!(!registry.contains(abandoned.id().as_str()));
        assert!(!abandoned.is_mounted());
        assert!(registry.contains(fresh.id().as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_keeps_connected_views() {
        let registry = ComponentRegistry::default();
        let view = View::new(Label::default());
        view.mount(&registry).unwrap();
        let (socket, _outgoing) = Socket::pair();
        view.attach(&socket).unwrap();

        tokio::time::advance(Duration::from_secs(120)).await;

        assert_eq!(registry.sweep(Duration::from_secs(60)), 0);
        assert_eq!(registry.size(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_reclaims_views_of_vanished_connections() {
        let registry = ComponentRegistry::default();
        let view = View::new(Label::default());
        view.mount(&registry).unwrap();
        let (socket, outgoing) = Socket::pair();
        view.attach(&socket).unwrap();

        drop(socket);
        drop(outgoing);
        tokio::time::advance(Duration::from_secs(600)).await;

        assert_eq!(registry.sweep(Duration::from_secs(60)), 1);
        assert_eq!(registry.size(), 0);
        assert!(!view.is_connected());
    }

    #[test]
    fn pooled_state_is_reset_and_gets_fresh_id() {
        let registry = ComponentRegistry::new(4);
        let pool = registry.pool::<Label>();

        let view = View::pooled(&pool);
        let old_id = view.id().clone();
        view.refresh_with(|label| label.text = "stale".to_string())
            .unwrap();
        view.mount(&registry).unwrap();
        view.unmount(&registry);
        drop(view);

        assert_eq!(pool.len(), 1);

        let reused = View::pooled(&registry.pool::<Label>());
        assert_ne!(reused.id(), &old_id);
        assert_eq!(
            reused.render().unwrap(),
            format!(r#"<div data-spark-view="{}"></div>"#, reused.id())
        );
        assert!(pool.is_empty());
    }
}
