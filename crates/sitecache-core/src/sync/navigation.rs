//! Site routes and the navigation trigger.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use tracing::trace;

/// A page of the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    ChangePassword,
    Projects,
    Resume,
    Todo,
}

impl Route {
    pub const ALL: [Route; 6] = [
        Route::Home,
        Route::Login,
        Route::ChangePassword,
        Route::Projects,
        Route::Resume,
        Route::Todo,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::ChangePassword => "/change-password",
            Route::Projects => "/projects",
            Route::Resume => "/resume",
            Route::Todo => "/todo",
        }
    }

    pub fn is_login(&self) -> bool {
        matches!(self, Route::Login)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Route {
    type Err = String;

    /// Accepts a path (`/todo`), a bare name (`todo`), and ignores any query
    /// string, fragment or trailing slash.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.split(['?', '#']).next().unwrap_or_default();
        let path = path.trim().trim_matches('/');
        match path.to_ascii_lowercase().as_str() {
            "" | "home" => Ok(Route::Home),
            "login" => Ok(Route::Login),
            "change-password" => Ok(Route::ChangePassword),
            "projects" => Ok(Route::Projects),
            "resume" => Ok(Route::Resume),
            "todo" | "todos" => Ok(Route::Todo),
            _ => Err(format!("Unknown route: {}", s)),
        }
    }
}

/// Whether a transition should schedule reconciliation.
///
/// The first navigation after boot has no prior route and is skipped, as is
/// any transition into the login page.
pub fn should_reconcile(from: Option<Route>, to: Route) -> bool {
    from.is_some() && !to.is_login()
}

/// Tracks the current route.
#[derive(Debug, Default)]
pub struct Navigator {
    current: Mutex<Option<Route>>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Route> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `to`, returning whether reconciliation should be scheduled.
    pub fn navigate(&self, to: Route) -> bool {
        let from = self.current.lock().unwrap_or_else(PoisonError::into_inner).replace(to);
        let reconcile = should_reconcile(from, to);
        trace!(from = ?from, to = %to, reconcile, "Navigation");
        reconcile
    }
}

// ============================================================================
// Tests
// ============================================================================
