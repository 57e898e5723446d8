pub mod data;
pub mod derive;
pub mod error;
pub mod loader;
pub mod logging;
pub mod refresh;
pub mod state;
pub mod view;
