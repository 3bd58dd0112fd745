//! Controller/action extraction from a request path.
//!
//! The last two path segments name the controller and the action:
//!
//! ```text
//! /MyApp/SomeController/FooBarAction.do?p1=v1
//!        ^^^^^^^^^^^^^^ ^^^^^^^^^^^^
//!        controller     action (extension dropped)
//! ```
//!
//! Extraction is best effort. A path too short to carry both names yields
//! `None` for the missing one; the dispatcher turns that into a denial.

/// Controller and action names taken from a request path.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Route {
    pub controller: Option<String>,
    pub action: Option<String>,
}

impl Route {
    /// Extracts the route from a path or a path-and-query.
    ///
    /// ```rust
    /// use actio::Route;
    ///
    /// let route = Route::extract("/app/UserController/Show.html?id=4");
    /// assert_eq!(route.controller.as_deref(), Some("UserController"));
    /// assert_eq!(route.action.as_deref(), Some("Show"));
    /// ```
    pub fn extract(path: &str) -> Self {
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        let path = path.strip_prefix('/').unwrap_or(path);

        let mut segments = path.split('/').filter(|s| !s.is_empty()).rev();
        let action = segments
            .next()
            .map(strip_extension)
            .filter(|a| !a.is_empty())
            .map(str::to_owned);
        let controller = segments.next().map(str::to_owned);

        Self { controller, action }
    }
}

/// Keeps everything before the first `.`; a segment without one is kept whole.
fn strip_extension(segment: &str) -> &str {
    segment.split_once('.').map_or(segment, |(name, _)| name)
}
