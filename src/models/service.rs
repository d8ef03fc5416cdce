use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub service_rate: Option<ServiceRate>,
}

impl Service {
    pub fn rate_id(&self) -> Option<&str> {
        self.service_rate.as_ref().map(|r| r.id.as_str())
    }

    pub fn rate_amount(&self) -> Option<f64> {
        self.amount
            .or_else(|| self.service_rate.as_ref().and_then(|r| r.amount))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceRate {
    pub id: String,
    #[serde(default)]
    pub amount: Option<f64>,
}

/// A service matched and validated for this conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchedService {
    pub service_id: String,
    pub service_name: String,
    pub rate_id: String,
    pub rate: Option<f64>,
    /// Normalized phrase the match was made for.
    pub request: String,
}
