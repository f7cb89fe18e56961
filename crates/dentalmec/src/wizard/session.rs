use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::order::{OrderDetails, ProcessType};

/// The four pages of the order form, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WizardStep {
    #[default]
    ProcessType,
    Files,
    Details,
    Confirmation,
}

impl WizardStep {
    pub fn number(self) -> u8 {
        match self {
            WizardStep::ProcessType => 1,
            WizardStep::Files => 2,
            WizardStep::Details => 3,
            WizardStep::Confirmation => 4,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(WizardStep::ProcessType),
            2 => Some(WizardStep::Files),
            3 => Some(WizardStep::Details),
            4 => Some(WizardStep::Confirmation),
            _ => None,
        }
    }

    /// The following step; the last step has none.
    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    /// The preceding step, staying on the first.
    pub fn previous(self) -> Self {
        Self::from_number(self.number().saturating_sub(1)).unwrap_or(WizardStep::ProcessType)
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl TryFrom<u8> for WizardStep {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::from_number(n).ok_or_else(|| format!("wizard step out of range: {}", n))
    }
}

impl From<WizardStep> for u8 {
    fn from(step: WizardStep) -> Self {
        step.number()
    }
}

/// Progress through the order form for one client.
///
/// Once files are uploaded the session points at a draft order
/// (`draft_order_id`), which stays in status `new` until confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSession {
    pub step: WizardStep,
    pub process_type: Option<ProcessType>,
    pub draft_order_id: Option<i64>,
    /// Ids of the file rows attached to the draft.
    #[serde(default)]
    pub file_ids: Vec<i64>,
    #[serde(default)]
    pub details: OrderDetails,
}

/// Opaque handle a client presents to resume its wizard session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(Uuid);

impl SessionKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ValidationError::InvalidIdentifier(s.to_string()))
    }
}
