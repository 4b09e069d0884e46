pub mod common;
pub mod controller;
pub mod registry;
pub mod render;

pub use controller::{Delivery, TaskListController, UiInput};
pub use registry::{SimulatedRegistry, TaskRegistry};
pub use render::{RenderSurface, TerminalSurface};
