//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Helpers that must share a
//! caller's transaction take `&mut PgConnection` instead.

pub mod action_binding_repo;
pub mod action_repo;
pub mod event_repo;
pub mod history_repo;
pub mod node_repo;
pub mod project_repo;
pub mod story_graph_repo;

pub use action_binding_repo::ActionBindingRepo;
pub use action_repo::ActionRepo;
pub use event_repo::EventRepo;
pub use history_repo::HistoryRepo;
pub use node_repo::NodeRepo;
pub use project_repo::ProjectRepo;
pub use story_graph_repo::StoryGraphRepo;
