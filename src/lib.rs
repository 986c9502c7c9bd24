pub mod assets;
pub mod config;
pub mod deploy;
pub mod error;
pub mod stacks;
pub mod template;

pub use config::SiteConfig;
pub use error::{Error, Result};
