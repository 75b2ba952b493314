mod provider;
mod upstage;

pub use provider::EmbeddingProvider;
pub use upstage::{UpstageConfig, UpstageProvider};

#[cfg(test)]
pub use provider::MockEmbeddingProvider;
