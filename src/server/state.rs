use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::core::config::Config;
use crate::core::error::PortalResult;
use crate::core::identity::EntityId;
use crate::core::portal::Portal;
use crate::core::project::Project;

/// Shared server state. Holds configuration and the project location only;
/// each request opens its own database connection.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

/// Checks between sweeps of idle limiter keys
const PRUNE_EVERY: u64 = 256;

struct Inner {
    project: Project,
    config: Config,
    limiter: DefaultKeyedRateLimiter<String>,
    checks: AtomicU64,
}

impl AppState {
    pub fn new(project: Project, config: Config) -> Self {
        let per_minute = NonZeroU32::new(config.server.rate_limit_per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::keyed(Quota::per_minute(per_minute));
        Self {
            inner: Arc::new(Inner {
                project,
                config,
                limiter,
                checks: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn project(&self) -> &Project {
        &self.inner.project
    }

    /// Open a portal on a fresh connection. Blocking; call from `spawn_blocking`.
    pub fn open_portal(&self) -> PortalResult<Portal> {
        Portal::open(&self.inner.project, self.inner.config.clone())
    }

    /// Take one mutating request from the user's budget. Keyed on the user
    /// id, so every spelling of a username shares one budget.
    pub fn check_rate(&self, user: &EntityId) -> bool {
        let limiter = &self.inner.limiter;
        if self.inner.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
        limiter.check_key(&user.to_string()).is_ok()
    }
}
