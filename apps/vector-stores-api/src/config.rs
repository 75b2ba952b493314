//! Configuration for the Vector Stores API

use core_config::{app_info, server::ServerConfig, AppInfo, FromEnv};
use domain_vector_stores::{QdrantConfig, UpstageConfig};

pub use core_config::Environment;

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub server: ServerConfig,
    pub environment: Environment,
    pub qdrant: QdrantConfig,
    pub upstage: UpstageConfig,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?;
        let qdrant = QdrantConfig::from_env()?;
        let upstage = UpstageConfig::from_env()?;

        Ok(Self {
            app: app_info!(),
            server,
            environment,
            qdrant,
            upstage,
        })
    }
}
