pub mod overview;
pub mod provider;
pub mod types;

pub use overview::MarketOverview;
pub use provider::{HttpJsonMarketData, MarketDataProvider, StaticMarketData};
