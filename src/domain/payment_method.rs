use serde::{Deserialize, Serialize};

// Payment methods a branch can be configured to accept. The branch row
// stores these as strings; requests are validated against that list.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Ideal,
    Bancontact,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Ideal => "ideal",
            PaymentMethod::Bancontact => "bancontact",
        }
    }

    pub fn parse(value: &str) -> Result<PaymentMethod, String> {
        match value {
            "card" => Ok(PaymentMethod::Card),
            "ideal" => Ok(PaymentMethod::Ideal),
            "bancontact" => Ok(PaymentMethod::Bancontact),
            other => Err(format!("{} is not a supported payment method", other)),
        }
    }
}
