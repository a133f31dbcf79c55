use serde::{Deserialize, Serialize};

/// The three mutation kinds a client may request. Doubles as the reason tag
/// stamped on both ledger entries of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Topup,
    Bonus,
    Spend,
}

/// Which side of the user/treasury pair receives the positive delta.
///
/// This is the one branch on `TransactionType` the engine performs; the
/// wallet mutator and ledger writer downstream are direction-agnostic and
/// only ever see signed deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    CreditUser,
    DebitUser,
}

impl TransactionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "TOPUP" => Some(Self::Topup),
            "BONUS" => Some(Self::Bonus),
            "SPEND" => Some(Self::Spend),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Topup => "TOPUP",
            Self::Bonus => "BONUS",
            Self::Spend => "SPEND",
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Self::Topup | Self::Bonus => Direction::CreditUser,
            Self::Spend => Direction::DebitUser,
        }
    }

    /// `(user_delta, treasury_delta)` for a mutation of magnitude `amount`.
    ///
    /// `amount` must already be validated positive by the request boundary.
    pub fn deltas(self, amount: i64) -> (i64, i64) {
        match self.direction() {
            Direction::CreditUser => (amount, -amount),
            Direction::DebitUser => (-amount, amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topup_and_bonus_credit_the_user() {
        assert_eq!(TransactionType::Topup.deltas(50), (50, -50));
        assert_eq!(TransactionType::Bonus.deltas(50), (50, -50));
    }

    #[test]
    fn spend_debits_the_user() {
        assert_eq!(TransactionType::Spend.deltas(50), (-50, 50));
    }

    #[test]
    fn round_trips_through_the_wire_strings() {
        for t in [TransactionType::Topup, TransactionType::Bonus, TransactionType::Spend] {
            assert_eq!(TransactionType::parse(t.as_str()), Some(t));
        }
        assert_eq!(TransactionType::parse("REFUND"), None);
    }
}
