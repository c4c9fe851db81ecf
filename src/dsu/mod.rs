pub mod packet;
pub mod server;
