//! Execution context observed while a record is handled.
//!
//! Topic resolution and exception reports depend on what the process was
//! doing when the record was emitted: serving a route, running a console
//! command, or processing a queued job. Rather than querying globals, the
//! handler asks a [`ContextProvider`] for an [`ExecutionContext`] snapshot.
//!
//! [`ScopedContext`] is the default provider. Hosts enter a context for the
//! duration of a request or job and the guard restores the previous one on
//! drop:
//!
//! ```rust
//! use tglog::context::{ContextProvider, ExecutionContext, RouteInfo, ScopedContext};
//!
//! let ctx = ExecutionContext::default()
//!     .with_route(RouteInfo::action("App\\Http\\Controllers\\UserController@store"));
//! {
//!     let _guard = ScopedContext::enter(ctx);
//!     assert!(ScopedContext.snapshot().route.is_some());
//! }
//! assert!(ScopedContext.snapshot().route.is_none());
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Reactive UI component invocation carried by the current request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComponentCall {
    /// Dotted component name, e.g. `admin.user-table`.
    pub component: Option<String>,
    /// First queued method call, e.g. `save`.
    pub method: Option<String>,
}

/// The route matched for the current request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteInfo {
    /// Declared action in `Class@method` form.
    pub action: Option<String>,
    /// Present when the request is a component invocation.
    pub component_call: Option<ComponentCall>,
}

impl RouteInfo {
    /// Route dispatching to `Class@method`.
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            component_call: None,
        }
    }

    /// Route serving a component invocation.
    #[must_use]
    pub fn with_component_call(
        mut self,
        component: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        self.component_call = Some(ComponentCall {
            component: Some(component.into()),
            method: Some(method.into()),
        });
        self
    }
}

/// Authenticated user of the current request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthenticatedUser {
    pub id: String,
    pub name: String,
}

/// Read-only view of the current HTTP request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestSnapshot {
    /// Full request URL, possibly percent-encoded.
    pub url: String,
    pub client_ip: Option<String>,
    /// HTTP method; empty when unknown.
    pub method: String,
    /// Set for XMLHttpRequest-style asynchronous requests.
    pub ajax: bool,
    /// Header names are stored lower-cased.
    pub headers: BTreeMap<String, String>,
    pub user: Option<AuthenticatedUser>,
    /// Decoded request inputs.
    pub inputs: Map<String, Value>,
}

impl RequestSnapshot {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    /// Header lookup, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    #[must_use]
    pub fn with_user(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.user = Some(AuthenticatedUser {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    #[must_use]
    pub fn ajax(mut self, ajax: bool) -> Self {
        self.ajax = ajax;
        self
    }
}

/// Snapshot of the ambient execution state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecutionContext {
    /// Active route, when serving a request.
    pub route: Option<RouteInfo>,
    /// Running as a non-interactive console process.
    pub running_in_console: bool,
    /// Bound to a queue worker.
    pub queue_worker: bool,
    /// Current request, when one is available.
    pub request: Option<RequestSnapshot>,
    /// Deployment label such as `production`.
    pub environment: String,
}

impl ExecutionContext {
    #[must_use]
    pub fn with_route(mut self, route: RouteInfo) -> Self {
        self.route = Some(route);
        self
    }

    #[must_use]
    pub fn with_request(mut self, request: RequestSnapshot) -> Self {
        self.request = Some(request);
        self
    }

    #[must_use]
    pub fn in_console(mut self) -> Self {
        self.running_in_console = true;
        self
    }

    #[must_use]
    pub fn in_queue_worker(mut self) -> Self {
        self.running_in_console = true;
        self.queue_worker = true;
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }
}

/// Source of [`ExecutionContext`] snapshots.
pub trait ContextProvider: Send + Sync {
    fn snapshot(&self) -> ExecutionContext;
}

/// A fixed context, handy for single-purpose processes and tests.
impl ContextProvider for ExecutionContext {
    fn snapshot(&self) -> ExecutionContext {
        self.clone()
    }
}

thread_local! {
    static SCOPED: RefCell<Vec<ExecutionContext>> = const { RefCell::new(Vec::new()) };
}

/// Thread-scoped provider: returns the innermost context entered on the
/// calling thread, or an empty context.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScopedContext;

impl ScopedContext {
    /// Make `ctx` current on this thread until the guard is dropped.
    pub fn enter(ctx: ExecutionContext) -> ContextGuard {
        SCOPED.with(|stack| stack.borrow_mut().push(ctx));
        ContextGuard { _private: () }
    }
}

impl ContextProvider for ScopedContext {
    fn snapshot(&self) -> ExecutionContext {
        SCOPED.with(|stack| stack.borrow().last().cloned().unwrap_or_default())
    }
}

/// Restores the previously entered context when dropped.
#[must_use = "the context is left as soon as the guard is dropped"]
pub struct ContextGuard {
    _private: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        SCOPED.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
