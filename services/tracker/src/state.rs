//! Application state shared across handlers

use crate::aggregator::ProjectAggregator;
use crate::credentials::CredentialStore;
use crate::guard::AccessGuard;
use crate::rate_limiter::LoginThrottle;
use crate::repositories::Repositories;
use crate::session::SessionManager;
use crate::settings::Settings;
use crate::task_view::TaskViewBuilder;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub repositories: Repositories,
    pub sessions: SessionManager,
    pub credentials: CredentialStore,
    pub guard: AccessGuard,
    pub aggregator: ProjectAggregator,
    pub task_views: TaskViewBuilder,
    pub login_throttle: LoginThrottle,
    pub settings: Settings,
}

impl AppState {
    /// Wire every component onto one set of repositories
    pub fn new(repositories: Repositories, settings: Settings) -> Self {
        let timeout = settings.fetch_timeout();
        let guard = AccessGuard::new(
            repositories.projects.clone(),
            repositories.tasks.clone(),
            timeout,
        );
        let task_views =
            TaskViewBuilder::new(guard.clone(), repositories.dependencies.clone(), timeout);
        let aggregator = ProjectAggregator::new(
            guard.clone(),
            repositories.projects.clone(),
            repositories.tasks.clone(),
            task_views.clone(),
            timeout,
        );

        Self {
            sessions: SessionManager::new(repositories.sessions.clone(), settings.session_ttl()),
            credentials: CredentialStore::new(repositories.users.clone()),
            login_throttle: LoginThrottle::new(settings.throttle()),
            guard,
            aggregator,
            task_views,
            repositories,
            settings,
        }
    }
}
