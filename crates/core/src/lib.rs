pub mod catalog;
pub mod economy;
pub mod error;
pub mod ids;
pub mod leveling;
pub mod model;
pub mod slots;
pub mod state;
pub mod streak;
pub mod summary;

pub use catalog::Catalog;
pub use economy::Purchase;
pub use error::CoreError;
pub use ids::*;
pub use leveling::{LevelTable, XpRules};
pub use model::*;
pub use slots::{Completion, Penalty};
pub use state::{DeletedTask, GameState};
pub use streak::StreakCheck;
pub use summary::{LevelInfo, Stats};
