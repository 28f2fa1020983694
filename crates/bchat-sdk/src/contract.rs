//! Contract records: task postings (chat-room creation, moderation, ...)
//! with a reward, terms, and optional acceptance / submission records.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::ContractStatus;

// ── Classification ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    #[default]
    ChatCreation,
    Moderation,
    CommunityBuilding,
    ContentCreation,
    Technical,
}

impl ContractType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChatCreation => "chat_creation",
            Self::Moderation => "moderation",
            Self::CommunityBuilding => "community_building",
            Self::ContentCreation => "content_creation",
            Self::Technical => "technical",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared lowest first so that `Critical` compares greatest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Bsv,
    Bchat,
}

impl Currency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bsv => "BSV",
            Self::Bchat => "BCHAT",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeResolution {
    #[default]
    Arbitration,
    CommunityVote,
    PlatformDecision,
}

// ── Records ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub amount: f64,
    pub currency: Currency,
    pub display_text: String,
}

impl Reward {
    /// Reward with a derived display string, e.g. `0.05 BSV` or `15,000 $BCHAT`.
    pub fn new(amount: f64, currency: Currency) -> Self {
        Self {
            amount,
            currency,
            display_text: display_amount(amount, currency),
        }
    }

    pub fn with_display(mut self, display_text: impl Into<String>) -> Self {
        self.display_text = display_text.into();
        self
    }
}

fn display_amount(amount: f64, currency: Currency) -> String {
    match currency {
        Currency::Bsv => format!("{amount} BSV"),
        Currency::Bchat => {
            // Round once so a carry reaches the integer part.
            let rounded = if amount.fract().abs() > f64::EPSILON {
                format!("{:.2}", amount.abs())
            } else {
                format!("{:.0}", amount.abs())
            };
            let (mut digits, frac) = match rounded.split_once('.') {
                Some((whole, frac)) => (whole.to_string(), format!(".{frac}")),
                None => (rounded, String::new()),
            };
            let mut grouped = String::new();
            while digits.len() > 3 {
                let tail = digits.split_off(digits.len() - 3);
                grouped = format!(",{tail}{grouped}");
            }
            let sign = if amount < 0.0 { "-" } else { "" };
            format!("{sign}{digits}{grouped}{frac} $BCHAT")
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms_owned: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acceptance {
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_handle: Option<String>,
    pub claimed_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub estimated_completion_days: u32,
}

impl Acceptance {
    pub fn new(
        handle: String,
        external_handle: Option<String>,
        claimed_at: DateTime<Utc>,
        estimated_days: u32,
    ) -> Result<Self> {
        let deadline = Duration::try_days(i64::from(estimated_days))
            .and_then(|days| claimed_at.checked_add_signed(days))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "estimated completion of {estimated_days} days is out of range"
                ))
            })?;
        Ok(Self {
            handle,
            external_handle,
            claimed_at,
            deadline,
            estimated_completion_days: estimated_days,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_ref: Option<String>,
    pub description: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractTerms {
    pub escrow_required: bool,
    pub dispute_resolution: DisputeResolution,
    #[serde(default)]
    pub quality_standards: Vec<String>,
    #[serde(default)]
    pub success_metrics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(rename = "contractId")]
    pub id: String,
    #[serde(rename = "type")]
    pub contract_type: ContractType,
    pub title: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub deliverables: Vec<String>,
    pub reward: Reward,
    pub estimated_hours: u32,
    /// Days.
    pub duration: u32,
    pub priority: Priority,
    pub status: ContractStatus,
    pub skills: Vec<String>,
    pub category: String,
    pub created_by: Creator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_by: Option<Acceptance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_work: Option<Submission>,
    pub contract_terms: ContractTerms,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Contract {
    /// Whole days from claim to submission, rounded up.
    /// `None` unless both records are present.
    pub fn completion_days(&self) -> Option<i64> {
        let accepted = self.accepted_by.as_ref()?;
        let submitted = self.submitted_work.as_ref()?;
        let millis = (submitted.submitted_at - accepted.claimed_at).num_milliseconds();
        Some((millis as f64 / 86_400_000.0).ceil() as i64)
    }

    /// Past its deadline while still being worked on.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            ContractStatus::Claimed | ContractStatus::InProgress
        ) && self.accepted_by.as_ref().is_some_and(|a| a.deadline < now)
    }
}

/// Caller-supplied fields for a new posting.
///
/// `reward` is optional only so that a missing reward can be reported as a
/// validation error instead of being unrepresentable at the call site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewContract {
    pub contract_type: ContractType,
    pub title: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub deliverables: Vec<String>,
    pub reward: Option<Reward>,
    pub estimated_hours: u32,
    pub duration: u32,
    pub priority: Priority,
    pub skills: Vec<String>,
    pub category: String,
    pub created_by: Creator,
    pub contract_terms: ContractTerms,
}

impl NewContract {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("title is required".into()));
        }
        if self.description.trim().is_empty() {
            return Err(Error::Validation("description is required".into()));
        }
        let Some(reward) = &self.reward else {
            return Err(Error::Validation("reward is required".into()));
        };
        if !reward.amount.is_finite() || reward.amount < 0.0 {
            return Err(Error::Validation(format!(
                "reward amount must be a non-negative number (got {})",
                reward.amount
            )));
        }
        Ok(())
    }

    /// Build the stored record. Fails with [`Error::Validation`] when a
    /// required field is missing.
    pub fn into_contract(self, id: String, now: DateTime<Utc>) -> Result<Contract> {
        self.validate()?;
        let mut reward = self
            .reward
            .ok_or_else(|| Error::Validation("reward is required".into()))?;
        if reward.display_text.trim().is_empty() {
            reward.display_text = display_amount(reward.amount, reward.currency);
        }
        Ok(Contract {
            id,
            contract_type: self.contract_type,
            title: self.title,
            description: self.description,
            requirements: self.requirements,
            deliverables: self.deliverables,
            reward,
            estimated_hours: self.estimated_hours,
            duration: self.duration,
            priority: self.priority,
            status: ContractStatus::Available,
            skills: self.skills,
            category: self.category,
            created_by: self.created_by,
            accepted_by: None,
            submitted_work: None,
            contract_terms: self.contract_terms,
            created_at: now,
            last_updated: now,
        })
    }
}
