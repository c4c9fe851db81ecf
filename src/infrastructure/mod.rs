pub mod bridge;
pub mod logging;
