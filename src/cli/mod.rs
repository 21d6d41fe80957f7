pub mod commands;
pub mod progress;
pub mod ui;

pub use progress::ConsoleSpinner;
pub use ui::{ConsoleOperator, Output};
