//! Controllers, actions and their registration.
//!
//! # How actions are stored
//!
//! The registry holds actions of *different* controller types in one map, so
//! each action is erased to the same shape before it is stored:
//!
//! ```text
//! fn show(&mut self, ctx: &mut Context) -> ActionResult   ← user writes this
//!        ↓ actions.action("Show", Self::show)
//! Arc::new(move |ctx| { let mut c = C::default(); … show(&mut c, ctx) })
//!        ↓ stored as BoxedAction = Arc<dyn Fn(&mut Context) -> ActionResult>
//! action(&mut ctx)  at request time                        ← one vtable call
//! ```
//!
//! The controller instance is created inside the erased closure, so every
//! invocation gets a fresh one and nothing leaks between requests.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::auth::WILDCARD;
use crate::context::Context;
use crate::error::ActionError;

/// What every action returns.
pub type ActionResult = Result<(), ActionError>;

/// A type-erased action shared across concurrent requests.
pub(crate) type BoxedAction = Arc<dyn Fn(&mut Context) -> ActionResult + Send + Sync + 'static>;

/// Authorization metadata of a registered name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActionDescriptor {
    pub name: String,
    /// `false` for names registered with [`Actions::helper`].
    pub is_action: bool,
    /// `None` means no authorization marker: the action is open.
    pub required_roles: Option<BTreeSet<String>>,
}

// ── Controller ────────────────────────────────────────────────────────────────

/// A group of actions addressed as `/<NAME>/<action>`.
///
/// A controller is stateless: a new value is built with `Default` for every
/// request and dropped afterwards. Per-request data lives in the
/// [`Context`]; process-wide data in its [`SharedStore`](crate::SharedStore).
///
/// ```rust
/// use actio::{ActionResult, Actions, Context, Controller};
///
/// #[derive(Default)]
/// struct UserController;
///
/// impl Controller for UserController {
///     const NAME: &'static str = "UserController";
///
///     fn register(actions: &mut Actions<Self>) {
///         actions.action("List", Self::list);
///         actions.action("Delete", Self::delete).authorize(["admin"]);
///     }
/// }
///
/// impl UserController {
///     fn list(&mut self, ctx: &mut Context) -> ActionResult {
///         ctx.view_with(&["alice", "bob"])
///     }
///
///     fn delete(&mut self, ctx: &mut Context) -> ActionResult {
///         ctx.json(r#"{"deleted":true}"#);
///         Ok(())
///     }
/// }
/// ```
pub trait Controller: Default + Send + 'static {
    /// Name matched against the controller segment of the path.
    const NAME: &'static str;

    /// Module the controller lives in. Joined with [`NAME`](Self::NAME) by a
    /// `.`; the dispatcher prepends its configured controller prefix the same
    /// way before looking a controller up.
    const MODULE: &'static str = "";

    /// Declares the controller's actions.
    fn register(actions: &mut Actions<Self>);

    /// Called on the fresh instance before the action runs. Failures and
    /// panics are logged and ignored; they never abort the request.
    fn trace(&mut self, _ctx: &Context) -> ActionResult {
        Ok(())
    }
}

// ── Registration ──────────────────────────────────────────────────────────────

pub(crate) struct ActionEntry {
    pub(crate) descriptor: ActionDescriptor,
    pub(crate) handler: Option<BoxedAction>,
}

/// Collects the actions of controller `C`. Handed to [`Controller::register`].
pub struct Actions<C> {
    entries: HashMap<String, ActionEntry>,
    _controller: PhantomData<fn() -> C>,
}

impl<C: Controller> Actions<C> {
    fn new() -> Self {
        Self { entries: HashMap::new(), _controller: PhantomData }
    }

    /// Registers `f` as the action `name`. Returns a handle for attaching a
    /// role requirement; without one the action is open to everyone.
    pub fn action<F>(&mut self, name: &str, f: F) -> Authorize<'_>
    where
        F: Fn(&mut C, &mut Context) -> ActionResult + Send + Sync + 'static,
    {
        let handler: BoxedAction = Arc::new(move |ctx: &mut Context| {
            let mut controller = C::default();
            match panic::catch_unwind(AssertUnwindSafe(|| controller.trace(ctx))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(controller = C::NAME, error = %e, "trace hook failed, continuing"),
                Err(payload) => warn!(
                    controller = C::NAME,
                    panic = %panic_message(payload.as_ref()),
                    "trace hook panicked, continuing"
                ),
            }
            f(&mut controller, ctx)
        });
        self.insert(name, true, Some(handler))
    }

    /// Declares `name` as a method that exists on the controller but is not an
    /// action. Requests for it are denied like unknown names, and logged as
    /// such.
    pub fn helper(&mut self, name: &str) {
        self.insert(name, false, None);
    }

    fn insert(&mut self, name: &str, is_action: bool, handler: Option<BoxedAction>) -> Authorize<'_> {
        let entry = ActionEntry {
            descriptor: ActionDescriptor {
                name: name.to_owned(),
                is_action,
                required_roles: None,
            },
            handler,
        };
        let slot = match self.entries.entry(name.to_owned()) {
            Entry::Occupied(mut o) => {
                warn!(controller = C::NAME, action = name, "action registered twice, keeping the last");
                o.insert(entry);
                o.into_mut()
            }
            Entry::Vacant(v) => v.insert(entry),
        };
        Authorize { descriptor: &mut slot.descriptor }
    }
}

/// Attaches a role requirement to a freshly registered action.
pub struct Authorize<'a> {
    descriptor: &'a mut ActionDescriptor,
}

impl Authorize<'_> {
    /// Only callers holding at least one of `roles` may invoke the action.
    /// An empty list admits nobody; `"*"` admits everybody.
    pub fn authorize<I, S>(self, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descriptor.required_roles = Some(roles.into_iter().map(Into::into).collect());
    }

    /// Marks the action as authorized for any caller (`"*"`).
    pub fn authorize_any(self) {
        self.authorize([WILDCARD]);
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

pub(crate) struct ControllerEntry {
    pub(crate) name: &'static str,
    pub(crate) actions: HashMap<String, ActionEntry>,
}

/// All registered controllers, keyed by qualified name.
#[derive(Default)]
pub(crate) struct Registry {
    controllers: HashMap<String, ControllerEntry>,
}

impl Registry {
    pub(crate) fn register<C: Controller>(&mut self) {
        let mut actions = Actions::<C>::new();
        C::register(&mut actions);
        let key = qualify(C::MODULE, C::NAME);
        debug!(controller = %key, actions = actions.entries.len(), "registered controller");
        self.controllers.insert(key, ControllerEntry { name: C::NAME, actions: actions.entries });
    }

    pub(crate) fn controller(&self, prefix: Option<&str>, name: &str) -> Option<&ControllerEntry> {
        self.controllers.get(&qualify(prefix.unwrap_or(""), name))
    }

    pub(crate) fn len(&self) -> usize {
        self.controllers.len()
    }
}

/// `module.name`, or just `name` when the module is blank.
fn qualify(module: &str, name: &str) -> String {
    let module = module.trim().trim_end_matches('.');
    if module.is_empty() {
        name.to_owned()
    } else {
        format!("{module}.{name}")
    }
}

/// Text of a panic payload raised with a string message.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "action panicked".to_owned()
    }
}

impl ControllerEntry {
    pub(crate) fn action(&self, name: &str) -> Option<&ActionEntry> {
        self.actions.get(name)
    }
}
