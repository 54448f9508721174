use serde::{Deserialize, Serialize};

use super::MinorUnits;

pub type AccountNumber = String;

/// A customer account. Balances are held in minor units of `currency`.
///
/// `available_balance` is the figure transfers are admitted against. Without holds it always
/// equals `balance`; both columns are moved by the same statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub branch: String,
    #[serde(rename = "number")]
    pub account_number: AccountNumber,
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(rename = "name")]
    pub account_name: String,
    #[serde(rename = "currentBalance")]
    pub balance: MinorUnits,
    #[serde(rename = "availableBalance")]
    pub available_balance: MinorUnits,
    pub currency: String,
}

impl Account {
    /// Open an account with an initial balance. Both balance figures start equal.
    pub fn new(
        account_number: impl Into<String>,
        account_name: impl Into<String>,
        currency: impl Into<String>,
        opening_balance: MinorUnits,
    ) -> Self {
        Self {
            branch: String::new(),
            account_number: account_number.into(),
            account_type: "Savings".to_string(),
            account_name: account_name.into(),
            balance: opening_balance,
            available_balance: opening_balance,
            currency: currency.into(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_type(mut self, account_type: impl Into<String>) -> Self {
        self.account_type = account_type.into();
        self
    }

    /// Whether a debit of `amount` would be admitted against the available balance.
    pub fn can_debit(&self, amount: MinorUnits) -> bool {
        self.available_balance >= amount
    }
}
