//! Shared value types of the device contract.
//!
//! Mode, backend and protocol tags, the account model the contract needs
//! from the wallet side, and the small carrier structs for transaction
//! construction. Secret-bearing types never derive `Serialize`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use serde::{Deserialize, Serialize};
use vault_primitives::{EcPoint, EcScalar, PublicKey, SecretKey};

/// Operating mode of a device.
///
/// A device is in exactly one mode at a time; every fresh device starts
/// in [`DeviceMode::Idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceMode {
    /// No transaction work in progress.
    #[default]
    Idle,
    /// Signing a real transaction that will be broadcast.
    TransactionReal,
    /// Producing a fake/mock signature (fee estimation, dry runs).
    TransactionFake,
    /// Parsing an existing transaction.
    TransactionParse,
}

/// The backend family of a device. Immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    /// In-process software implementation.
    Software,
    /// Ledger hardware family.
    Ledger,
    /// Trezor hardware family.
    Trezor,
}

/// How a backend exchanges transaction data with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceProtocol {
    /// Everything computed in place.
    #[default]
    Default,
    /// Host proxies bulk work, device holds secrets.
    Proxy,
    /// Offline cold-signing exchange.
    ColdSign,
}

/// The network a wallet's addresses belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetworkType {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network.
    Testnet,
    /// Staging network.
    Stagenet,
}

/// Transaction format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxVersion {
    /// Legacy cleartext-amount format.
    V1,
    /// Confidential-amount format.
    V2,
}

/// Semantic type of a transaction being signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TxType {
    /// An ordinary transfer.
    #[default]
    Standard,
    /// A staking transaction.
    Stake,
    /// A key-image unlock transaction.
    KeyImageUnlock,
}

/// Progress report for a long-running device operation.
///
/// Transient: delivered to the callback and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Completion in `[0.0, 1.0]`; meaningless when `indeterminate`.
    pub progress: f64,
    /// The operation cannot estimate completion.
    pub indeterminate: bool,
}

/// The two public keys of an account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountPublicAddress {
    /// Public spend key.
    pub spend_public_key: PublicKey,
    /// Public view key.
    pub view_public_key: PublicKey,
}

/// Full account keys held by the wallet side of the contract.
#[derive(Clone, Debug)]
pub struct AccountKeys {
    /// Public address of the account.
    pub address: AccountPublicAddress,
    /// Secret spend key (zeroized on drop).
    pub spend_secret_key: SecretKey,
    /// Secret view key (zeroized on drop).
    pub view_secret_key: SecretKey,
}

/// A subaddress coordinate: account (major) and address-in-account
/// (minor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SubaddressIndex {
    /// Account index.
    pub major: u32,
    /// Address index within the account.
    pub minor: u32,
}

impl SubaddressIndex {
    /// `(0, 0)` addresses the main account address, not a subaddress.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.major == 0 && self.minor == 0
    }
}

/// One output destination of a transaction under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxDestinationEntry {
    /// Amount sent to this destination, in atomic units.
    pub amount: u64,
    /// Destination address.
    pub addr: AccountPublicAddress,
    /// Whether `addr` is a subaddress.
    pub is_subaddress: bool,
}

/// A confidential output key pair: destination key and amount
/// commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtKey {
    /// One-time destination key.
    pub dest: EcPoint,
    /// Pedersen commitment to the amount.
    pub mask: EcPoint,
}

/// Masked or unmasked amount data travelling with a confidential
/// output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdhTuple {
    /// Commitment blinding factor.
    pub mask: EcScalar,
    /// Amount, encoded as a scalar.
    pub amount: EcScalar,
}
