use crate::provider::PortraitProvider;

pub mod config;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod normalize;
pub mod payload;
pub mod provider;
pub mod proxy;
pub mod retry;

pub use dispatch::PortraitService;
pub use error::{AdapterError, ProviderError};
pub use payload::{Generated, GenerationRequest, ImagePayload, Outcome};

pub type ProviderBox = Box<dyn PortraitProvider + Send + Sync>;
