//! Read-only views of the subscription and auth collaborators.
//!
//! The form and dashboard receive these values by argument; nothing in the
//! core mutates them except [`Subscription::record_analysis`] and
//! [`Subscription::refund_analysis`], which the owning collaborator calls
//! around an analysis.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Basic,
    Pro,
    Enterprise,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Pro => "pro",
            Tier::Enterprise => "enterprise",
        }
    }

    /// Badge text, e.g. `Pro`.
    pub fn label(self) -> &'static str {
        match self {
            Tier::Free => "Free",
            Tier::Basic => "Basic",
            Tier::Pro => "Pro",
            Tier::Enterprise => "Enterprise",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "basic" => Ok(Tier::Basic),
            "pro" => Ok(Tier::Pro),
            "enterprise" => Ok(Tier::Enterprise),
            other => anyhow::bail!("unknown subscription tier: {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    pub analysis_per_month: i64,
    pub advanced_analysis: bool,
    pub priority_support: bool,
    pub batch_analysis: bool,
    pub api_access: bool,
}

impl Features {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self {
                analysis_per_month: 5,
                advanced_analysis: false,
                priority_support: false,
                batch_analysis: false,
                api_access: false,
            },
            Tier::Basic => Self {
                analysis_per_month: 50,
                advanced_analysis: true,
                priority_support: false,
                batch_analysis: false,
                api_access: false,
            },
            Tier::Pro => Self {
                analysis_per_month: 200,
                advanced_analysis: true,
                priority_support: true,
                batch_analysis: true,
                api_access: false,
            },
            Tier::Enterprise => Self {
                analysis_per_month: 1000,
                advanced_analysis: true,
                priority_support: true,
                batch_analysis: true,
                api_access: true,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub tier: Tier,
    pub remaining_analysis: i64,
    pub features: Features,
}

impl Subscription {
    /// Fresh allowance for `tier`.
    pub fn for_tier(tier: Tier) -> Self {
        let features = Features::for_tier(tier);
        Self {
            tier,
            remaining_analysis: features.analysis_per_month,
            features,
        }
    }

    pub fn has_quota(&self) -> bool {
        self.remaining_analysis > 0
    }

    /// Analyses used this month. May exceed the allowance if the
    /// collaborator reports a negative counter.
    pub fn completed_analysis(&self) -> i64 {
        self.features.analysis_per_month - self.remaining_analysis
    }

    pub fn record_analysis(&mut self) {
        self.remaining_analysis -= 1;
    }

    /// Gives back an analysis recorded for a request that then failed.
    pub fn refund_analysis(&mut self) {
        self.remaining_analysis += 1;
    }
}

/// Signed-in user as seen by the dashboard. Only presence matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub display_name: String,
}

impl User {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
        }
    }
}
