use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    live::{
        component::handler_fault,
        pool::{Pool, Recycle},
        wire::{self, Update},
        Component, ComponentId, ComponentRegistry, Context, Event, Socket,
    },
    Error,
};

/// Type-erased view as stored in the [`ComponentRegistry`].
pub trait AnyView: Send + Sync {
    fn id(&self) -> &ComponentId;

    fn is_mounted(&self) -> bool;

    fn is_connected(&self) -> bool;

    /// Time since creation or the last subscribe, event or refresh.
    fn idle(&self) -> Duration;

    fn is_bound_to(&self, socket: &Socket) -> bool;

    /// Binds the view to `socket` and runs the component's `on_connect` hook.
    /// Binding again to the socket it is already bound to only marks activity.
    fn attach(&self, socket: &Arc<Socket>) -> crate::Result<()>;

    fn dispatch(&self, event: &Event) -> crate::Result<()>;

    /// Lifecycle teardown after removal from the registry.
    fn release(&self);
}

type Recycler<C> = Box<dyn FnOnce(&mut C) + Send + Sync>;

pub struct View<C: Component> {
    id: ComponentId,
    me: Weak<View<C>>,

    mounted: AtomicBool,
    retired: AtomicBool,
    connected: AtomicBool,
    // Bumped on every bind and disconnect, periodic tasks stop once it moves.
    binding: AtomicU64,

    created_at: DateTime<Utc>,
    created: Instant,
    last_active: Mutex<Instant>,

    socket: Mutex<Option<Weak<Socket>>>,
    rendered: Mutex<String>,
    state: Mutex<C>,

    recycle: Option<Recycler<C>>,
}

impl<C: Component> View<C> {
    pub fn new(component: C) -> Arc<Self> {
        Self::build(component, None)
    }

    /// Builds a view around a recycled state from `pool`. The state goes back
    /// to the pool once the last reference to the view is dropped.
    pub fn pooled(pool: &Arc<Pool<C>>) -> Arc<Self>
    where
        C: Recycle,
    {
        let pool = pool.clone();
        let component = pool.checkout();
        let recycle: Recycler<C> = Box::new(move |c: &mut C| pool.checkin(std::mem::take(c)));

        Self::build(component, Some(recycle))
    }

    fn build(component: C, recycle: Option<Recycler<C>>) -> Arc<Self> {
        let now = Instant::now();

        Arc::new_cyclic(|me| Self {
            id: ComponentId::generate(),
            me: me.clone(),
            mounted: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            binding: AtomicU64::new(0),
            created_at: Utc::now(),
            created: now,
            last_active: Mutex::new(now),
            socket: Mutex::new(None),
            rendered: Mutex::new(String::new()),
            state: Mutex::new(component),
            recycle,
        })
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// True while a socket is bound and still alive. A connection that went
    /// away without closing reads as disconnected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
            && self
                .socket
                .lock()
                .as_ref()
                .map_or(false, |socket| socket.strong_count() > 0)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }

    pub fn idle(&self) -> Duration {
        self.last_active.lock().elapsed()
    }

    /// Last fragment produced by `content`, without the container element.
    pub fn rendered_html(&self) -> String {
        self.rendered.lock().clone()
    }

    /// Reads the component state without re-rendering.
    pub fn with_state<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.state.lock())
    }

    fn touch(&self) {
        *self.last_active.lock() = Instant::now();
    }

    /// Registers the view. Mounting twice is a no-op. A view that has been
    /// unmounted stays retired; build a new one to get a fresh id.
    pub fn mount(self: &Arc<Self>, registry: &ComponentRegistry) -> crate::Result<()> {
        if self.retired.load(Ordering::Acquire) {
            return Err(Error::Retired(self.id.clone()));
        }

        if self
            .mounted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        if let Err(err) = registry.insert(self.id.clone(), self.clone()) {
            self.mounted.store(false, Ordering::Release);
            return Err(err);
        }

        let mounted = {
            let mut state = self.state.lock();
            panic::catch_unwind(AssertUnwindSafe(|| state.on_mount()))
        };

        if let Err(payload) = mounted {
            registry.remove(self.id.as_str());
            self.mounted.store(false, Ordering::Release);

            return Err(handler_fault(
                &self.id,
                "mount",
                Error::panic_message(&*payload),
            ));
        }

        log::debug!("mount;id={}", self.id);

        Ok(())
    }

    pub fn unmount(&self, registry: &ComponentRegistry) {
        registry.unmount(self.id.as_str());
    }

    /// Full markup for an HTTP response, wrapped in the element the client
    /// subscribes from.
    pub fn render(&self) -> crate::Result<String> {
        let state = self.state.lock();
        let content = self.render_state(&state)?;

        Ok(format!(
            r#"<div data-spark-view="{}">{content}</div>"#,
            self.id
        ))
    }

    pub fn refresh(&self) -> crate::Result<()> {
        self.refresh_with(|_| ())
    }

    /// Runs `f` against the state and re-renders under the same lock.
    pub fn refresh_with<F>(&self, f: F) -> crate::Result<()>
    where
        F: FnOnce(&mut C),
    {
        let mut state = self.state.lock();

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *state))) {
            return Err(handler_fault(
                &self.id,
                "refresh",
                Error::panic_message(&*payload),
            ));
        }

        self.update(&state)
    }

    /// Spawns `task` every `period` for as long as the view stays bound to
    /// the socket it is bound to now. Re-binding or disconnecting stops it.
    /// The first run happens one period after the call.
    pub fn every<F>(&self, period: Duration, mut task: F) -> JoinHandle<()>
    where
        F: FnMut(&View<C>) + Send + 'static,
    {
        let view = self.me.clone();
        let id = self.id.clone();
        let binding = self.binding.load(Ordering::Acquire);

        tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let view = match view.upgrade() {
                    Some(view) => view,
                    None => break,
                };

                if view.binding.load(Ordering::Acquire) != binding || !view.is_connected() {
                    break;
                }

                task(&view);
            }

            log::debug!("every;stop;id={id}");
        })
    }

    fn render_state(&self, state: &C) -> crate::Result<String> {
        let html = match panic::catch_unwind(AssertUnwindSafe(|| state.content())) {
            Ok(Ok(html)) => html,
            Ok(Err(err)) => return Err(Error::Render(format!("id={};{err}", self.id))),
            Err(payload) => {
                return Err(Error::Render(format!(
                    "id={};{}",
                    self.id,
                    Error::panic_message(&*payload)
                )))
            }
        };

        self.rendered.lock().clone_from(&html);

        Ok(html)
    }

    fn update(&self, state: &C) -> crate::Result<()> {
        let content = self.render_state(state)?;

        self.touch();
        self.push(content)
    }

    fn push(&self, content: String) -> crate::Result<()> {
        if !self.is_connected() {
            return Ok(());
        }

        let socket = self.socket.lock().as_ref().and_then(Weak::upgrade);

        let socket = match socket {
            Some(socket) => socket,
            None => {
                self.disconnect();
                return Ok(());
            }
        };

        let frame = wire::encode(&Update {
            id: &self.id,
            content: &content,
        })?;

        if let Err(err) = socket.send_text(frame) {
            self.disconnect();
            return Err(err);
        }

        log::debug!("push;id={};socket={}", self.id, socket.id());

        Ok(())
    }

    fn disconnect(&self) {
        self.socket.lock().take();
        self.connected.store(false, Ordering::Release);
        self.binding.fetch_add(1, Ordering::AcqRel);
    }
}

impl<C: Component> AnyView for View<C> {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn is_mounted(&self) -> bool {
        View::is_mounted(self)
    }

    fn is_connected(&self) -> bool {
        View::is_connected(self)
    }

    fn idle(&self) -> Duration {
        View::idle(self)
    }

    fn is_bound_to(&self, socket: &Socket) -> bool {
        self.socket
            .lock()
            .as_ref()
            .map_or(false, |bound| std::ptr::eq(bound.as_ptr(), socket))
    }

    fn attach(&self, socket: &Arc<Socket>) -> crate::Result<()> {
        self.touch();

        {
            let mut bound = self.socket.lock();

            if self.connected.load(Ordering::Acquire)
                && bound
                    .as_ref()
                    .map_or(false, |bound| std::ptr::eq(bound.as_ptr(), &**socket))
            {
                return Ok(());
            }

            *bound = Some(Arc::downgrade(socket));
            self.binding.fetch_add(1, Ordering::AcqRel);
            self.connected.store(true, Ordering::Release);
        }

        let mut state = self.state.lock();
        let mut ctx = Context::new(self);

        if let Err(payload) =
            panic::catch_unwind(AssertUnwindSafe(|| state.on_connect(&mut ctx)))
        {
            return Err(handler_fault(
                &self.id,
                "connect",
                Error::panic_message(&*payload),
            ));
        }

        if ctx.wants_refresh() {
            self.update(&state)?;
        }

        Ok(())
    }

    fn dispatch(&self, event: &Event) -> crate::Result<()> {
        self.touch();

        let mut state = self.state.lock();
        let mut ctx = Context::new(self);

        match panic::catch_unwind(AssertUnwindSafe(|| state.on_event(event, &mut ctx))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(handler_fault(&self.id, &event.name, err)),
            Err(payload) => {
                return Err(handler_fault(
                    &self.id,
                    &event.name,
                    Error::panic_message(&*payload),
                ))
            }
        }

        if ctx.wants_refresh() {
            self.update(&state)?;
        }

        Ok(())
    }

    fn release(&self) {
        self.retired.store(true, Ordering::Release);
        self.disconnect();

        if self.mounted.swap(false, Ordering::AcqRel) {
            let mut state = self.state.lock();

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| state.on_unmount())) {
                log::error!(
                    "unmount;id={};{}",
                    self.id,
                    Error::panic_message(&*payload)
                );
            }

            log::debug!("unmount;id={}", self.id);
        }
    }
}

impl<C: Component> Drop for View<C> {
    fn drop(&mut self) {
        if let Some(recycle) = self.recycle.take() {
            recycle(self.state.get_mut());
        }
    }
}
