//! Core duty log types.
//!
//! This module defines the records an officer produces over a shift: the
//! duty itself, the post it is tied to, and the incidents attached to it.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A named security post an officer can be assigned to.
///
/// The set is closed; anything else is rejected when a duty starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Post {
    /// Security Account Manager.
    #[serde(rename = "Security Account Manager")]
    SecurityAccountManager,
    /// CAL1 badge check.
    #[serde(rename = "CAL1-Badge Check")]
    Cal1BadgeCheck,
    /// CAL1 bag check.
    #[serde(rename = "CAL1-Bag Check")]
    Cal1BagCheck,
    /// CAL1 rear entrance.
    #[serde(rename = "CAL1-Rear Entrance")]
    Cal1RearEntrance,
    /// CAL1 receiving at the east gate.
    #[serde(rename = "CAL1-Receiving(East Gate)")]
    Cal1ReceivingEastGate,
    /// CAL1 shipping at the west gate.
    #[serde(rename = "CAL1-Shipping(West Gate)")]
    Cal1ShippingWestGate,
    /// CAL1 supervisor.
    #[serde(rename = "CAL1-Supervisor")]
    Cal1Supervisor,
    /// CAL2 badge check.
    #[serde(rename = "CAL2-Badge Check")]
    Cal2BadgeCheck,
    /// CAL2 bag check.
    #[serde(rename = "CAL2-Bag Check")]
    Cal2BagCheck,
    /// CAL2 supervisor.
    #[serde(rename = "CAL2-Supervisor")]
    Cal2Supervisor,
    /// CAL2 receiving at the north gate.
    #[serde(rename = "CAL2-Receiving(North Gate)")]
    Cal2ReceivingNorthGate,
    /// CAL2 shipping at the south gate.
    #[serde(rename = "CAL2-Shipping(South Gate)")]
    Cal2ShippingSouthGate,
}

impl Post {
    /// Every post, in display order.
    pub const ALL: [Post; 12] = [
        Self::SecurityAccountManager,
        Self::Cal1BadgeCheck,
        Self::Cal1BagCheck,
        Self::Cal1RearEntrance,
        Self::Cal1ReceivingEastGate,
        Self::Cal1ShippingWestGate,
        Self::Cal1Supervisor,
        Self::Cal2BadgeCheck,
        Self::Cal2BagCheck,
        Self::Cal2Supervisor,
        Self::Cal2ReceivingNorthGate,
        Self::Cal2ShippingSouthGate,
    ];

    /// The post's display name, as stored and sent over the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecurityAccountManager => "Security Account Manager",
            Self::Cal1BadgeCheck => "CAL1-Badge Check",
            Self::Cal1BagCheck => "CAL1-Bag Check",
            Self::Cal1RearEntrance => "CAL1-Rear Entrance",
            Self::Cal1ReceivingEastGate => "CAL1-Receiving(East Gate)",
            Self::Cal1ShippingWestGate => "CAL1-Shipping(West Gate)",
            Self::Cal1Supervisor => "CAL1-Supervisor",
            Self::Cal2BadgeCheck => "CAL2-Badge Check",
            Self::Cal2BagCheck => "CAL2-Bag Check",
            Self::Cal2Supervisor => "CAL2-Supervisor",
            Self::Cal2ReceivingNorthGate => "CAL2-Receiving(North Gate)",
            Self::Cal2ShippingSouthGate => "CAL2-Shipping(South Gate)",
        }
    }
}

impl std::fmt::Display for Post {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Returned when a string names no known post.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown post: {0}")]
pub struct UnknownPost(pub String);

impl FromStr for Post {
    type Err = UnknownPost;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|post| post.as_str() == s)
            .ok_or_else(|| UnknownPost(s.to_string()))
    }
}

/// Where a duty is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DutyStatus {
    /// The officer is on shift; incidents may be added or removed.
    Active,
    /// The shift has ended. Terminal.
    Completed,
}

impl DutyStatus {
    /// The status as stored in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for DutyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for DutyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown duty status: {other}")),
        }
    }
}

/// An incident reported during a duty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    /// Caller-generated identifier, unique within its duty.
    pub id: String,
    /// What happened.
    pub description: String,
    /// When it happened, as entered by the officer (local time, free-form).
    pub time: String,
    /// Where it happened.
    pub location: String,
    /// What the officer did about it.
    pub action: String,
}

/// One officer's shift at a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DutyLog {
    /// Identifier assigned by the store.
    pub id: i64,
    /// Officer name. Identifies the officer for active-duty lookups.
    pub name: String,
    /// Free-text badge number.
    pub badge_number: String,
    /// The post being manned.
    pub post: Post,
    /// When the duty started.
    pub start_time: DateTime<Utc>,
    /// When the duty ended; `None` while active.
    pub end_time: Option<DateTime<Utc>>,
    /// Lifecycle state.
    pub status: DutyStatus,
    /// Incidents in the order they were reported.
    pub incidents: Vec<Incident>,
}

impl DutyLog {
    /// Whether the duty is still open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == DutyStatus::Active
    }

    /// How long the duty lasted, or `None` if it is still in progress.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Human-readable duration, e.g. `8h 15m`.
    #[must_use]
    pub fn duration_label(&self) -> String {
        match self.duration() {
            Some(d) => format!("{}h {}m", d.num_hours(), d.num_minutes() % 60),
            None => "In progress".to_string(),
        }
    }
}

/// The fields needed to open a duty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDuty {
    /// Officer name.
    pub name: String,
    /// Badge number.
    pub badge_number: String,
    /// Validated post.
    pub post: Post,
    /// Start time.
    pub start_time: DateTime<Utc>,
}
