pub mod config_base;
pub mod connection;
pub mod output;

pub use config_base::Config;
pub use connection::Connection;
pub use output::Output;
