use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::market::MarketItem;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOverviewResponse {
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
    pub items: Vec<MarketItem>,
}
