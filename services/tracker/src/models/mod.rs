//! Tracker domain models

pub mod project;
pub mod session;
pub mod task;
pub mod user;
pub mod view;

// Re-export for convenience
pub use project::{ExcludedTimePeriod, NewProject, NewTimePeriod, Project, UpdateProject};
pub use session::Session;
pub use task::{Dependency, NewTask, Task, UpdateTask};
pub use user::{NewUser, UpdateUser, User, UserProfile};
pub use view::{DurationEstimate, ProjectSummary, ProjectView, TaskView, TimePeriodView};
