pub mod controller;
pub mod driver;

pub use controller::{ControllerState, TurnController, TurnHandle};
pub use driver::drive_turn;
