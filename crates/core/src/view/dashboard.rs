use serde::Serialize;

use crate::domain::market::{AnalysisRecord, MarketItem};
use crate::market::MarketOverview;
use crate::subscription::{Subscription, User};
use crate::view::format::{change_pct, grouped, short_date, usd, whole_percent};
use crate::view::report::action_tone;
use crate::view::Tone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Zero counts as down.
    pub fn of(change: f64) -> Self {
        if change > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    pub fn tone(self) -> Tone {
        match self {
            Direction::Up => Tone::Success,
            Direction::Down => Tone::Danger,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeView {
    pub label: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatCard {
    pub title: &'static str,
    pub value: String,
    pub change: Option<ChangeView>,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureItem {
    pub label: String,
    pub checked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionCard {
    pub tier: &'static str,
    pub tier_label: &'static str,
    pub usage_label: String,
    /// Progress bar width, clamped to `[0, 100]`.
    pub usage_pct: f64,
    pub features: Vec<FeatureItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketRow {
    pub symbol: String,
    pub name: String,
    pub price: String,
    pub change: String,
    pub direction: Direction,
    pub tone: Tone,
    pub volume: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketOverviewView {
    pub rows: Vec<MarketRow>,
    pub is_loading: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentAnalysisRow {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub title: String,
    pub date: String,
    pub recommendation: String,
    pub tone: Tone,
    pub confidence: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub user: String,
    pub stats: Vec<StatCard>,
    pub subscription: SubscriptionCard,
    pub market: MarketOverviewView,
    pub recent: Vec<RecentAnalysisRow>,
}

impl DashboardView {
    pub fn build(
        user: &User,
        subscription: &Subscription,
        market: &MarketOverview,
        recent: &[AnalysisRecord],
    ) -> Self {
        Self {
            user: user.display_name.clone(),
            stats: stat_cards(subscription),
            subscription: subscription_card(subscription),
            market: MarketOverviewView {
                rows: market_rows(market.items()),
                is_loading: market.is_loading(),
            },
            recent: recent_rows(recent),
        }
    }
}

pub fn stat_cards(subscription: &Subscription) -> Vec<StatCard> {
    vec![
        StatCard {
            title: "Remaining Analyses",
            value: subscription.remaining_analysis.to_string(),
            change: None,
            color: "blue",
        },
        StatCard {
            title: "Completed Analyses",
            value: subscription.completed_analysis().to_string(),
            change: None,
            color: "green",
        },
        StatCard {
            title: "S&P 500",
            value: grouped(4587.64, 2),
            change: Some(ChangeView {
                label: change_pct(0.87),
                direction: Direction::Up,
            }),
            color: "green",
        },
        StatCard {
            title: "Bitcoin",
            value: usd(28456.32),
            change: Some(ChangeView {
                label: change_pct(1.23),
                direction: Direction::Down,
            }),
            color: "red",
        },
    ]
}

pub fn subscription_card(subscription: &Subscription) -> SubscriptionCard {
    let features = &subscription.features;
    let used = subscription.completed_analysis();
    let limit = features.analysis_per_month;
    let usage_pct = if limit > 0 {
        (used as f64 / limit as f64 * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let feature = |label: String, checked: bool| FeatureItem { label, checked };

    SubscriptionCard {
        tier: subscription.tier.as_str(),
        tier_label: subscription.tier.label(),
        usage_label: format!("{used} / {limit}"),
        usage_pct,
        features: vec![
            feature(format!("{limit} analyses per month"), true),
            feature("Advanced technical analysis".into(), features.advanced_analysis),
            feature("Priority support".into(), features.priority_support),
            feature("Batch analysis".into(), features.batch_analysis),
            feature("API access".into(), features.api_access),
        ],
    }
}

pub fn market_rows(items: &[MarketItem]) -> Vec<MarketRow> {
    items
        .iter()
        .map(|item| {
            let direction = Direction::of(item.change);
            MarketRow {
                symbol: item.symbol.clone(),
                name: item.name.clone(),
                price: usd(item.price),
                change: change_pct(item.change),
                direction,
                tone: direction.tone(),
                volume: item.volume.clone(),
            }
        })
        .collect()
}

pub fn recent_rows(records: &[AnalysisRecord]) -> Vec<RecentAnalysisRow> {
    records
        .iter()
        .map(|r| RecentAnalysisRow {
            id: r.id.clone(),
            kind: r.kind.as_str(),
            title: r.title.clone(),
            date: short_date(r.date),
            recommendation: r.recommendation.as_str().to_uppercase(),
            tone: action_tone(r.recommendation),
            confidence: format!("{}%", whole_percent(r.confidence)),
        })
        .collect()
}
