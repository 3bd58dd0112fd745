//! The front controller.
//!
//! One [`Dispatcher`] serves every request:
//!
//! ```text
//! GET /shop/CartController/Add.html?id=3
//!   → Route::extract        controller = CartController, action = Add
//!   → Registry lookup       prefix + controller → ControllerEntry → ActionEntry
//!   → auth::authorize       descriptor × principal → Permit / Deny
//!   → spawn_blocking        fresh controller, trace hook, action(&mut Context)
//!   → Context::into_response
//! ```
//!
//! Denials answer `403` with `"<action> is not authorized."`, whether the
//! action is missing, not an action, or guarded by roles the caller lacks.
//! Failed actions answer `500` with the error message. `HEAD` runs the `GET`
//! action and drops the body.

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use tracing::{debug, error, info};

use crate::action::{Controller, Registry, panic_message};
use crate::auth::{self, Anonymous, Decision, PrincipalSource};
use crate::config::{ExtraConfig, Settings, load_extra_config};
use crate::context::Context;
use crate::error::{ActionError, Error};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;
use crate::store::SharedStore;
use crate::view::{Renderer, renderer_named};

/// Routes requests to controller actions. Build once with
/// [`Dispatcher::builder`], share behind an `Arc`.
pub struct Dispatcher {
    registry: Registry,
    prefix: Option<String>,
    renderer: Arc<dyn Renderer>,
    store: SharedStore,
    extra: Arc<ExtraConfig>,
    principals: Box<dyn PrincipalSource>,
}

impl Dispatcher {
    pub fn builder(settings: Settings) -> DispatcherBuilder {
        DispatcherBuilder {
            settings,
            registry: Registry::default(),
            renderer: None,
            store: None,
            principals: Box::new(Anonymous),
        }
    }

    /// The store handed to every action.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Handles one HTTP request end to end. Never fails: every problem
    /// becomes an error response.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = req.into_parts();

        let head = parts.method == http::Method::HEAD;
        let method = if head {
            Method::Get
        } else {
            let Ok(method) = Method::try_from(&parts.method) else {
                debug!(method = %parts.method, "method not dispatchable");
                return Response::error(StatusCode::METHOD_NOT_ALLOWED, "only GET, HEAD and POST are dispatched")
                    .into_inner();
            };
            method
        };

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!("could not read request body: {e}");
                return Response::error(StatusCode::BAD_REQUEST, "could not read request body")
                    .into_inner();
            }
        };

        let request = Request::new(method, parts.uri, parts.headers, body);
        let mut res = self.dispatch(request).await.into_inner();
        if head {
            *res.body_mut() = Full::new(Bytes::new());
        }
        res
    }

    /// Routes, authorizes and invokes the action addressed by `request`.
    pub(crate) async fn dispatch(&self, request: Request) -> Response {
        let route = Route::extract(request.path());
        debug!(uri = %request.uri(), controller = ?route.controller, action = ?route.action, "routing");

        let action_label = route.action.as_deref().unwrap_or("");

        let (Some(controller_name), Some(action_name)) = (&route.controller, &route.action) else {
            info!(path = request.path(), "path does not name a controller and an action");
            return not_authorized(action_label);
        };

        let Some(controller) = self.registry.controller(self.prefix.as_deref(), controller_name) else {
            info!(controller = %controller_name, "no such controller");
            return Response::error(StatusCode::NOT_FOUND, &format!("{controller_name} not found."));
        };

        let principal = self.principals.principal(&request);
        let entry = controller.action(action_name);
        if let Decision::Deny(_) = auth::authorize(entry.map(|e| &e.descriptor), &principal) {
            return not_authorized(action_name);
        }
        let Some(action) = entry.and_then(|e| e.handler.clone()) else {
            return not_authorized(action_name);
        };

        let mut ctx = Context::new(
            request,
            principal,
            self.store.clone(),
            Arc::clone(&self.renderer),
            Arc::clone(&self.extra),
            controller.name,
            action_name.clone(),
        );

        let outcome = tokio::task::spawn_blocking(move || {
            let result = action(&mut ctx);
            (ctx, result)
        })
        .await;

        match outcome {
            Ok((ctx, Ok(()))) => ctx.into_response(),
            Ok((_, Err(e))) => failed(controller.name, action_name, &e),
            Err(join) => {
                let message = if join.is_panic() {
                    panic_message(join.into_panic().as_ref())
                } else {
                    join.to_string()
                };
                failed(controller.name, action_name, &ActionError::Message(message))
            }
        }
    }
}

fn not_authorized(action: &str) -> Response {
    Response::error(StatusCode::FORBIDDEN, &format!("{action} is not authorized."))
}

fn failed(controller: &str, action: &str, e: &ActionError) -> Response {
    error!(controller, action, error = ?e, "action failed: {e}");
    Response::error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Collects controllers and collaborators, then initialises everything in
/// [`build`](Self::build).
pub struct DispatcherBuilder {
    settings: Settings,
    registry: Registry,
    renderer: Option<Box<dyn Renderer>>,
    store: Option<SharedStore>,
    principals: Box<dyn PrincipalSource>,
}

impl DispatcherBuilder {
    /// Registers controller `C` and its actions.
    pub fn controller<C: Controller>(mut self) -> Self {
        self.registry.register::<C>();
        self
    }

    /// Uses `renderer` instead of the one named in the settings.
    pub fn renderer(mut self, renderer: impl Renderer) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Uses `store` instead of [`SharedStore::global`].
    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Where each request's roles come from. Defaults to [`Anonymous`].
    pub fn principals(mut self, source: impl PrincipalSource) -> Self {
        self.principals = Box::new(source);
        self
    }

    /// Validates the settings, initialises the renderer and loads the extra
    /// config. Any failure here means the application must not start.
    pub fn build(self) -> Result<Dispatcher, Error> {
        let Self { settings, registry, renderer, store, principals } = self;
        settings.validate()?;

        let mut renderer = match renderer {
            Some(r) => r,
            None => renderer_named(settings.view.renderer.trim())?,
        };
        renderer.init(&settings.view)?;
        info!(renderer = renderer.name(), controllers = registry.len(), "dispatcher ready");

        let extra = match &settings.extra_config {
            Some(path) => {
                let extra = load_extra_config(path)?;
                info!(path = %path.display(), keys = extra.len(), "loaded extra config");
                extra
            }
            None => ExtraConfig::default(),
        };

        Ok(Dispatcher {
            registry,
            prefix: settings.controller_prefix().map(str::to_owned),
            renderer: Arc::from(renderer),
            store: store.unwrap_or_else(|| SharedStore::global().clone()),
            extra: Arc::new(extra),
            principals,
        })
    }
}
