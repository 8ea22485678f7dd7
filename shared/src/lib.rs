//! Simulation core shared by the browser client and the room server.

pub mod ball;
pub mod bot;
pub mod config;
pub mod match_state;
pub mod online;
pub mod paddle;
pub mod physics;
pub mod power_shot;
pub mod protocol;
pub mod rally;
pub mod simulation;
pub mod timer;
pub mod types;
pub mod vec3;

pub use config::GameConfig;
pub use simulation::{MatchSimulation, SimEvent};
pub use types::{GameMode, Role, Scores, Side};
