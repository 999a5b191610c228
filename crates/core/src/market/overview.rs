use crate::domain::market::{seed_market_items, MarketItem};
use crate::market::provider::MarketDataProvider;

/// Market table state with its refresh gate.
#[derive(Debug, Clone)]
pub struct MarketOverview {
    items: Vec<MarketItem>,
    is_loading: bool,
}

impl Default for MarketOverview {
    fn default() -> Self {
        Self::new(seed_market_items())
    }
}

impl MarketOverview {
    pub fn new(items: Vec<MarketItem>) -> Self {
        Self {
            items,
            is_loading: false,
        }
    }

    pub fn items(&self) -> &[MarketItem] {
        &self.items
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Returns `false` if a refresh is already in flight.
    pub fn begin_refresh(&mut self) -> bool {
        if self.is_loading {
            return false;
        }
        self.is_loading = true;
        true
    }

    /// Applies a refresh outcome. Failed refreshes keep the previous rows.
    pub fn finish_refresh(&mut self, outcome: anyhow::Result<Vec<MarketItem>>) {
        self.is_loading = false;
        match outcome {
            Ok(items) => self.items = items,
            Err(err) => {
                tracing::error!(
                    error = %format!("{err:#}"),
                    "market refresh failed; keeping previous rows"
                );
            }
        }
    }

    /// Returns whether a refresh actually ran.
    pub async fn refresh(&mut self, provider: &dyn MarketDataProvider) -> bool {
        if !self.begin_refresh() {
            return false;
        }
        let outcome = provider.fetch_market().await;
        self.finish_refresh(outcome);
        true
    }
}
