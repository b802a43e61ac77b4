//! Core of the plant-care game: environment counters and mood, timed tasks
//! with a grace window, and the points shop. Display layers drive it through
//! [`Game`] and read back a [`MoodReport`].

pub mod config;
pub mod economy;
pub mod environment;
pub mod error;
pub mod game;
pub mod model;
pub mod store;
pub mod tasks;

pub use economy::{Receipt, ShopCategory, ShopItem};
pub use environment::{EnvironmentState, MoodReport};
pub use error::{GameError, GameResult};
pub use game::Game;
pub use model::{Bulb, Mood, PotKind, SoilKind};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use tasks::{Completion, Task, TaskEvent, TaskPhase};
