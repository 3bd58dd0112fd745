//! Request-scoped context handed to every action.
//!
//! A [`Context`] is built fresh for each dispatched request and dropped once
//! the response is sent. It carries the request, the caller's principal,
//! handles to the process-wide store, renderer and extra config, and the
//! response the action has produced so far.
//!
//! The response is buffered: nothing reaches the client until the action
//! returns `Ok`. An action that fails after calling [`Context::view`] still
//! produces a clean `500`.

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::Principal;
use crate::config::ExtraConfig;
use crate::error::{ActionError, RenderError};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::store::SharedStore;
use crate::view::Renderer;

pub struct Context {
    request: Request,
    principal: Principal,
    store: SharedStore,
    renderer: Arc<dyn Renderer>,
    extra: Arc<ExtraConfig>,
    controller: &'static str,
    action: String,
    response: Option<Response>,
}

impl Context {
    pub(crate) fn new(
        request: Request,
        principal: Principal,
        store: SharedStore,
        renderer: Arc<dyn Renderer>,
        extra: Arc<ExtraConfig>,
        controller: &'static str,
        action: String,
    ) -> Self {
        Self { request, principal, store, renderer, extra, controller, action, response: None }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn request(&self) -> &Request { &self.request }
    pub fn principal(&self) -> &Principal { &self.principal }
    pub fn store(&self) -> &SharedStore { &self.store }
    pub fn renderer(&self) -> &dyn Renderer { self.renderer.as_ref() }

    /// `NAME` of the controller handling this request.
    pub fn controller_name(&self) -> &'static str { self.controller }

    /// Name of the action currently executing.
    pub fn action_name(&self) -> &str { &self.action }

    /// Value of a key from the extra config file, if one was loaded.
    pub fn config_value(&self, key: &str) -> Option<&str> {
        self.extra.get(key)
    }

    // ── Request helpers ───────────────────────────────────────────────────────

    /// `true` when the client asked for JSON in its `Accept` header.
    pub fn accepts_json(&self) -> bool {
        self.request.accepts_json()
    }

    /// The request body as text.
    pub fn body_text(&self) -> Result<String, ActionError> {
        Ok(String::from_utf8(self.request.body().to_vec())?)
    }

    /// The request body deserialized from JSON.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, ActionError> {
        Ok(serde_json::from_slice(self.request.body())?)
    }

    pub fn query(&self, key: &str) -> Option<String> {
        self.request.query(key)
    }

    /// Query and form-body parameters bound to `T`. Body values win over
    /// query values for the same key.
    ///
    /// ```rust
    /// # use actio::{ActionResult, Context};
    /// #[derive(serde::Deserialize)]
    /// struct AddItem { sku: String, qty: u32 }
    ///
    /// fn add(ctx: &mut Context) -> ActionResult {
    ///     let AddItem { sku, qty } = ctx.params()?;
    ///     ctx.respond(format!("{qty} x {sku}"));
    ///     Ok(())
    /// }
    /// ```
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, ActionError> {
        let mut encoded = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.request.params() {
            encoded.append_pair(key, value);
        }
        Ok(serde_urlencoded::from_str(&encoded.finish())?)
    }

    // ── Views ─────────────────────────────────────────────────────────────────

    /// Renders the default view with no model.
    pub fn view(&mut self) -> Result<(), ActionError> {
        self.view_with(&Value::Null)
    }

    /// Renders the default view, `Views/<Controller>/<action>`, with `model`.
    pub fn view_with<M: Serialize + ?Sized>(&mut self, model: &M) -> Result<(), ActionError> {
        let name = self.default_view_name();
        self.view_named(&name, model)
    }

    /// Renders the view `name` with `model` and makes it the response.
    pub fn view_named<M: Serialize + ?Sized>(&mut self, name: &str, model: &M) -> Result<(), ActionError> {
        let markup = self.populate_template(name, model)?;
        self.respond(Response::html(markup));
        Ok(())
    }

    /// Renders the view `name` with `model` without touching the response.
    pub fn populate_template<M: Serialize + ?Sized>(&self, name: &str, model: &M) -> Result<String, ActionError> {
        let model = serde_json::to_value(model).map_err(RenderError::Model)?;
        Ok(self.renderer.render(name, &model)?)
    }

    /// `Views/<Controller>/<action>` for the action currently executing.
    pub fn default_view_name(&self) -> String {
        format!("Views/{}/{}", self.controller, self.action)
    }

    // ── Raw responses ─────────────────────────────────────────────────────────

    /// Sends `body` verbatim as `application/json`.
    pub fn json(&mut self, body: impl Into<Bytes>) {
        self.respond(Response::json(body));
    }

    /// Sends `body` verbatim as `text/javascript`.
    pub fn json_script(&mut self, body: impl Into<Bytes>) {
        self.respond(Response::json_script(body));
    }

    /// Sends a JSON error payload with `status`.
    pub fn json_error(&mut self, status: StatusCode, message: &str) {
        self.respond(Response::error(status, message));
    }

    /// Replaces whatever response the action produced so far.
    pub fn respond(&mut self, response: impl IntoResponse) {
        self.response = Some(response.into_response());
    }

    /// The buffered response; `200` with an empty body if the action sent none.
    pub(crate) fn into_response(self) -> Response {
        self.response.unwrap_or_else(|| Response::status(StatusCode::OK))
    }
}
