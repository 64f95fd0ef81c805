mod server;

pub use server::{ExposureConfig, RegistryConfig, ServerConfig};
