pub mod models;
pub mod registry;
pub mod sensor;
pub mod settings;
