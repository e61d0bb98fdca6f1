//! Transaction types
//!
//! Transactions are built through dedicated constructors, one per
//! [`TransactionKind`]. Fee and stake transactions never carry inputs and
//! always pay a single output.

use crate::{Address, TxId, random_id};
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// The shape of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Wallet transaction spending prior outputs
    Regular,
    /// Fee collection for the transactions in a block
    Fee,
    /// Mining reward paid to the block producer
    #[serde(alias = "reward")]
    Stake,
}

impl TransactionKind {
    /// Lowercase name, as used on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Fee => "fee",
            Self::Stake => "stake",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to an output of a prior transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    /// Transaction that created the output
    pub transaction: TxId,
    /// Position of the output in that transaction
    pub index: u32,
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Id of the transaction whose output is spent
    pub transaction: TxId,
    /// Output position within that transaction
    pub index: u32,
}

impl TxInput {
    /// Create an input spending `transaction`'s output at `index`.
    pub const fn new(transaction: TxId, index: u32) -> Self {
        Self { transaction, index }
    }

    /// The output this input spends.
    pub const fn out_point(&self) -> OutPoint {
        OutPoint {
            transaction: self.transaction,
            index: self.index,
        }
    }
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Amount in the smallest currency unit
    pub amount: u64,
    /// Destination
    pub address: Address,
}

impl TxOutput {
    /// Create an output paying `amount` to `address`.
    pub const fn new(amount: u64, address: Address) -> Self {
        Self { amount, address }
    }
}

/// Inputs and outputs of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
}

/// A transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: TxId,
    hash: Option<B256>,
    #[serde(rename = "type")]
    kind: TransactionKind,
    data: TransactionData,
}

impl Transaction {
    /// Create a regular transaction.
    pub fn regular(id: TxId, inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            id,
            hash: None,
            kind: TransactionKind::Regular,
            data: TransactionData { inputs, outputs },
        }
    }

    /// Create a fee transaction paying `amount` to `address`.
    pub fn fee(address: Address, amount: u64) -> Self {
        Self::single_output(TransactionKind::Fee, address, amount)
    }

    /// Create a stake (mining reward) transaction paying `amount` to `address`.
    pub fn stake(address: Address, amount: u64) -> Self {
        Self::single_output(TransactionKind::Stake, address, amount)
    }

    fn single_output(kind: TransactionKind, address: Address, amount: u64) -> Self {
        Self {
            id: random_id(),
            hash: None,
            kind,
            data: TransactionData {
                inputs: Vec::new(),
                outputs: vec![TxOutput::new(amount, address)],
            },
        }
    }

    /// Attach the transaction hash.
    pub fn with_hash(mut self, hash: B256) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Transaction id
    pub const fn id(&self) -> TxId {
        self.id
    }

    /// Transaction hash, if one was attached
    pub const fn hash(&self) -> Option<B256> {
        self.hash
    }

    /// Transaction kind
    pub const fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// Inputs, in order
    pub fn inputs(&self) -> &[TxInput] {
        &self.data.inputs
    }

    /// Outputs, in order
    pub fn outputs(&self) -> &[TxOutput] {
        &self.data.outputs
    }

    /// Sum of all output amounts.
    pub fn total_output(&self) -> u64 {
        self.data.outputs.iter().map(|output| output.amount).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_and_stake_shape() {
        let address = B256::repeat_byte(7);

        let fee = Transaction::fee(address, 2);
        assert_eq!(fee.kind(), TransactionKind::Fee);
        assert!(fee.inputs().is_empty());
        assert_eq!(fee.outputs(), &[TxOutput::new(2, address)]);
        assert_eq!(fee.hash(), None);

        let stake = Transaction::stake(address, 1_000);
        assert_eq!(stake.kind(), TransactionKind::Stake);
        assert!(stake.inputs().is_empty());
        assert_eq!(stake.total_output(), 1_000);
        assert_ne!(fee.id(), stake.id());
    }

    #[test]
    fn test_json_shape() {
        let tx = Transaction::regular(
            B256::repeat_byte(1),
            vec![TxInput::new(B256::repeat_byte(2), 0)],
            vec![TxOutput::new(10, B256::repeat_byte(3))],
        );
        let json = serde_json::to_value(&tx).unwrap();

        assert_eq!(json["type"], "regular");
        assert!(json["hash"].is_null());
        assert_eq!(json["data"]["inputs"][0]["index"], 0);
        assert_eq!(json["data"]["outputs"][0]["amount"], 10);
    }

    #[test]
    fn test_reward_alias() {
        let kind: TransactionKind = serde_json::from_str("\"reward\"").unwrap();
        assert_eq!(kind, TransactionKind::Stake);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"stake\"");
    }
}
