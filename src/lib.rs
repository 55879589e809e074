pub mod console;
pub mod error;
pub mod models;
pub mod services;

pub use console::InspectionConsole;
pub use error::AppError;
