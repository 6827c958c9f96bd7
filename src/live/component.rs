use std::{borrow::Borrow, fmt, time::Duration};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{live::View, Error};

/// Identifier of a mounted view. The only reference to a component that ever
/// crosses the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ComponentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ComponentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A named event sent by the browser, `data` is the raw JSON-encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub data: String,
}

impl Event {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_str(&self.data)?)
    }

    /// The `value` field the client attaches for `live-change` / `live-input`.
    pub fn value<T: DeserializeOwned>(&self) -> crate::Result<T> {
        #[derive(Deserialize)]
        struct Payload<T> {
            value: T,
        }

        self.json::<Payload<T>>().map(|p| p.value)
    }
}

/// Server-held UI state.
///
/// Hooks run with the component's state locked; request a re-render through
/// [`Context::refresh`] instead of calling back into the view.
pub trait Component: Send + 'static + Sized {
    /// Builds the inner HTML fragment from the current state.
    fn content(&self) -> crate::Result<String>;

    /// Must not block.
    fn on_event(&mut self, event: &Event, ctx: &mut Context<'_, Self>) -> crate::Result<()>;

    fn on_mount(&mut self) {}

    fn on_unmount(&mut self) {}

    /// Called every time a socket subscribes to the view.
    fn on_connect(&mut self, _ctx: &mut Context<'_, Self>) {}
}

pub struct Context<'a, C: Component> {
    view: &'a View<C>,
    refresh: bool,
}

impl<'a, C: Component> Context<'a, C> {
    pub(crate) fn new(view: &'a View<C>) -> Self {
        Self {
            view,
            refresh: false,
        }
    }

    pub fn id(&self) -> &ComponentId {
        self.view.id()
    }

    pub fn is_connected(&self) -> bool {
        self.view.is_connected()
    }

    /// Re-render and push once the current hook returns.
    pub fn refresh(&mut self) {
        self.refresh = true;
    }

    pub(crate) fn wants_refresh(&self) -> bool {
        self.refresh
    }

    pub fn every<F>(&self, period: Duration, task: F) -> JoinHandle<()>
    where
        F: FnMut(&View<C>) + Send + 'static,
    {
        self.view.every(period, task)
    }
}

pub(crate) fn handler_fault(id: &ComponentId, event: &str, err: impl fmt::Display) -> Error {
    Error::Handler(format!("id={id};event={event};{err}"))
}
