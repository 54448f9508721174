use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountNumber, MinorUnits};

pub type TransactionId = String;

/// Which side of a transfer a ledger row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegType {
    #[serde(rename = "Transfer out")]
    TransferOut,
    #[serde(rename = "Transfer in")]
    TransferIn,
}

impl LegType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegType::TransferOut => "Transfer out",
            LegType::TransferIn => "Transfer in",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Transfer out" => Some(LegType::TransferOut),
            "Transfer in" => Some(LegType::TransferIn),
            _ => None,
        }
    }
}

impl std::fmt::Display for LegType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One leg of a transfer as it appears on `account_number`'s statement.
/// Entries are append-only; corrections are new transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Store-assigned insertion order, used to break timestamp ties
    #[serde(skip)]
    pub sequence: i64,
    pub transaction_id: TransactionId,
    pub account_number: AccountNumber,
    pub from_account: AccountNumber,
    pub to_account: AccountNumber,
    pub to_account_name: String,
    pub to_bank: String,
    #[serde(rename = "type")]
    pub leg_type: LegType,
    /// Negative on the debit leg, positive on the credit leg
    pub amount: MinorUnits,
    pub currency: String,
    pub note: String,
    pub transferred_at: DateTime<Utc>,
}

/// Everything needed to write both legs of one transfer.
#[derive(Debug, Clone)]
pub struct LegPair<'a> {
    pub transaction_id: &'a str,
    pub from_account: &'a str,
    pub to_account: &'a str,
    pub to_account_name: &'a str,
    pub to_bank: &'a str,
    pub amount: MinorUnits,
    pub currency: &'a str,
    pub note: &'a str,
    pub transferred_at: DateTime<Utc>,
}

impl LegPair<'_> {
    /// The debit and credit entries, in that order. Sequence numbers are assigned by the store.
    pub fn entries(&self) -> [LedgerEntry; 2] {
        let leg = |account: &str, leg_type: LegType, amount: MinorUnits| LedgerEntry {
            sequence: 0,
            transaction_id: self.transaction_id.to_string(),
            account_number: account.to_string(),
            from_account: self.from_account.to_string(),
            to_account: self.to_account.to_string(),
            to_account_name: self.to_account_name.to_string(),
            to_bank: self.to_bank.to_string(),
            leg_type,
            amount,
            currency: self.currency.to_string(),
            note: self.note.to_string(),
            transferred_at: self.transferred_at,
        };
        [
            leg(self.from_account, LegType::TransferOut, -self.amount),
            leg(self.to_account, LegType::TransferIn, self.amount),
        ]
    }
}

/// A transaction id whose legs break the double-entry invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PairViolation {
    WrongLegCount { transaction_id: TransactionId, legs: usize },
    NonZeroSum { transaction_id: TransactionId, sum: i128 },
    CurrencyMismatch { transaction_id: TransactionId },
    MisplacedLeg { transaction_id: TransactionId },
}

impl std::fmt::Display for PairViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairViolation::WrongLegCount {
                transaction_id,
                legs,
            } => write!(f, "{transaction_id}: expected 2 legs, found {legs}"),
            PairViolation::NonZeroSum {
                transaction_id,
                sum,
            } => write!(f, "{transaction_id}: legs sum to {sum}, expected 0"),
            PairViolation::CurrencyMismatch { transaction_id } => {
                write!(f, "{transaction_id}: legs are in different currencies")
            }
            PairViolation::MisplacedLeg { transaction_id } => write!(
                f,
                "{transaction_id}: legs are not a debit on the payer and a credit on the payee"
            ),
        }
    }
}

/// Check every transaction id in `entries` for the pairing invariant: exactly one
/// `Transfer out` leg on the payer with a negative amount, one `Transfer in` leg on the payee
/// with the opposite amount, same currency.
pub fn check_ledger_pairs(entries: &[LedgerEntry]) -> Vec<PairViolation> {
    let mut by_id: BTreeMap<&str, Vec<&LedgerEntry>> = BTreeMap::new();
    for entry in entries {
        by_id.entry(&entry.transaction_id).or_default().push(entry);
    }

    let mut violations = Vec::new();
    for (id, legs) in by_id {
        let transaction_id = id.to_string();
        if legs.len() != 2 {
            violations.push(PairViolation::WrongLegCount {
                transaction_id,
                legs: legs.len(),
            });
            continue;
        }

        let sum: i128 = legs.iter().map(|l| i128::from(l.amount)).sum();
        if sum != 0 {
            violations.push(PairViolation::NonZeroSum {
                transaction_id: transaction_id.clone(),
                sum,
            });
        }
        if legs[0].currency != legs[1].currency {
            violations.push(PairViolation::CurrencyMismatch {
                transaction_id: transaction_id.clone(),
            });
        }

        let debit = legs.iter().find(|l| l.leg_type == LegType::TransferOut);
        let credit = legs.iter().find(|l| l.leg_type == LegType::TransferIn);
        let well_formed = match (debit, credit) {
            (Some(d), Some(c)) => {
                d.amount < 0
                    && c.amount > 0
                    && d.account_number == d.from_account
                    && c.account_number == c.to_account
            }
            _ => false,
        };
        if !well_formed {
            violations.push(PairViolation::MisplacedLeg { transaction_id });
        }
    }
    violations
}

/// Net movement per account implied by the ledger, summed in `i128` so long ledgers cannot
/// overflow.
pub fn net_movements(entries: &[LedgerEntry]) -> HashMap<AccountNumber, i128> {
    let mut movements: HashMap<AccountNumber, i128> = HashMap::new();
    for entry in entries {
        *movements.entry(entry.account_number.clone()).or_insert(0) += i128::from(entry.amount);
    }
    movements
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn pair(id: &str, from: &str, to: &str, amount: MinorUnits) -> [LedgerEntry; 2] {
        LegPair {
            transaction_id: id,
            from_account: from,
            to_account: to,
            to_account_name: "Jane Doe",
            to_bank: "Bank B",
            amount,
            currency: "USD",
            note: "",
            transferred_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
        }
        .entries()
    }

    #[test]
    fn test_leg_pair_shape() {
        let [debit, credit] = pair("TXN1", "12345", "54321", 200);

        assert_eq!(debit.account_number, "12345");
        assert_eq!(debit.leg_type, LegType::TransferOut);
        assert_eq!(debit.amount, -200);
        assert_eq!(credit.account_number, "54321");
        assert_eq!(credit.leg_type, LegType::TransferIn);
        assert_eq!(credit.amount, 200);
        assert_eq!(debit.amount + credit.amount, 0);
    }

    #[test]
    fn test_well_formed_pairs_pass() {
        let mut entries = pair("TXN1", "a", "b", 100).to_vec();
        entries.extend(pair("TXN2", "b", "c", 40));
        assert!(check_ledger_pairs(&entries).is_empty());
    }

    #[test]
    fn test_missing_leg_detected() {
        let [debit, _] = pair("TXN1", "a", "b", 100);
        let violations = check_ledger_pairs(&[debit]);
        assert_eq!(
            violations,
            vec![PairViolation::WrongLegCount {
                transaction_id: "TXN1".into(),
                legs: 1
            }]
        );
    }

    #[test]
    fn test_unbalanced_pair_detected() {
        let [debit, mut credit] = pair("TXN1", "a", "b", 100);
        credit.amount = 90;
        let violations = check_ledger_pairs(&[debit, credit]);
        assert!(violations.contains(&PairViolation::NonZeroSum {
            transaction_id: "TXN1".into(),
            sum: -10
        }));
    }

    #[test]
    fn test_currency_mismatch_detected() {
        let [debit, mut credit] = pair("TXN1", "a", "b", 100);
        credit.currency = "THB".into();
        let violations = check_ledger_pairs(&[debit, credit]);
        assert_eq!(
            violations,
            vec![PairViolation::CurrencyMismatch {
                transaction_id: "TXN1".into()
            }]
        );
    }

    #[test]
    fn test_swapped_signs_detected() {
        // Seed data in the wild has had "Transfer in" rows with negative amounts.
        let [mut debit, mut credit] = pair("TXN1", "a", "b", 100);
        debit.amount = 100;
        credit.amount = -100;
        let violations = check_ledger_pairs(&[debit, credit]);
        assert_eq!(
            violations,
            vec![PairViolation::MisplacedLeg {
                transaction_id: "TXN1".into()
            }]
        );
    }

    #[test]
    fn test_net_movements_sum_to_zero() {
        let mut entries = pair("TXN1", "a", "b", 1000).to_vec();
        entries.extend(pair("TXN2", "b", "c", 500));
        entries.extend(pair("TXN3", "c", "a", 200));

        let movements = net_movements(&entries);
        assert_eq!(movements["a"], -800);
        assert_eq!(movements["b"], 500);
        assert_eq!(movements["c"], 300);
        assert_eq!(movements.values().sum::<i128>(), 0);
    }

    #[test]
    fn test_leg_type_serializes_as_label() {
        let json = serde_json::to_string(&LegType::TransferOut).unwrap();
        assert_eq!(json, "\"Transfer out\"");
        assert_eq!(LegType::from_str("Transfer in"), Some(LegType::TransferIn));
        assert_eq!(LegType::from_str("transfer in"), None);
    }
}
