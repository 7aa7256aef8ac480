//! The device contract: every transaction-signing backend implements
//! [`Device`].
//!
//! All methods take `&self` and implementations are `Send + Sync`;
//! backends use interior mutability so a single instance can be shared
//! process-wide through the registry. Operations that return key
//! material return owned values; the caller never sees backend
//! internals.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use std::sync::Weak;

use zeroize::Zeroizing;

use vault_primitives::{
    EcPoint, EcScalar, Hash, Hash8, KeyDerivation, KeyImage, KeyPair, PublicKey, SecretKey,
    Signature,
};

use crate::callback::DeviceCallback;
use crate::error::{DeviceError, Result};
use crate::types::{
    AccountKeys, AccountPublicAddress, CtKey, DeviceMode, DeviceProtocol, DeviceType, EcdhTuple,
    NetworkType, SubaddressIndex, TxDestinationEntry, TxType, TxVersion,
};

/// Inputs for deriving one output's ephemeral keys.
///
/// Borrowed view over the wallet's transaction-construction state; the
/// secrets stay owned by the caller.
pub struct OutputKeyParams<'a> {
    /// The sender's account keys.
    pub sender_account_keys: &'a AccountKeys,
    /// Public transaction key (`tx_secret_key * G`, or the subaddress
    /// variant).
    pub tx_public_key: PublicKey,
    /// Secret transaction key of the open session.
    pub tx_secret_key: &'a SecretKey,
    /// The destination this output pays.
    pub destination: &'a TxDestinationEntry,
    /// The sender's change destination, if the transaction has one.
    pub change_address: Option<&'a TxDestinationEntry>,
    /// Index of this output within the transaction.
    pub output_index: u64,
    /// Whether per-output additional transaction keys are in use
    /// (required when any destination is a subaddress).
    pub need_additional_tx_keys: bool,
    /// Additional per-output secret keys, indexed by output.
    pub additional_tx_secret_keys: &'a [SecretKey],
}

/// One output's derived ephemeral keys.
#[derive(Debug, Clone)]
pub struct OutputEphemeralKeys {
    /// The one-time ("stealth") destination public key.
    pub one_time_public_key: PublicKey,
    /// Scalar the amount encryption is keyed from.
    pub amount_key: EcScalar,
    /// Public half of the additional transaction key, when one was
    /// required for this output.
    pub additional_tx_public_key: Option<PublicKey>,
    /// Whether this output returns change to the sender.
    pub is_change: bool,
}

/// Blinding material for one legacy ring-signature round.
#[derive(Debug, Clone)]
pub struct MlsagPrepared {
    /// Random blinding scalar (zeroized on drop).
    pub alpha: SecretKey,
    /// `alpha * G`.
    pub alpha_g: EcPoint,
    /// `alpha * Hp`, present only for the full (real-input) form.
    pub alpha_hp: Option<EcPoint>,
    /// `xx * Hp`, the ring key image row, full form only.
    pub key_image: Option<KeyImage>,
}

/// Blinding material for one CLSAG round.
#[derive(Debug, Clone)]
pub struct ClsagPrepared {
    /// Random blinding scalar (zeroized on drop).
    pub alpha: SecretKey,
    /// `alpha * G`.
    pub alpha_g: EcPoint,
    /// `alpha * H`.
    pub alpha_h: EcPoint,
    /// Key image `p * H`.
    pub key_image: KeyImage,
    /// Commitment key image `z * H`.
    pub commitment_image: EcPoint,
}

/// The transaction-signing device contract.
///
/// Backends hold long-lived secrets and expose derivation, signing and
/// session operations over them. One backend instance serves the whole
/// process; see [`crate::registry`].
///
/// Locking is cooperative and mandatory around multi-call protocols:
/// callers bracket `open_tx`..`close_tx` sequences with
/// [`Device::lock`] / [`Device::unlock`]. Locks are not reentrant.
pub trait Device: Send + Sync {
    // --- lifecycle -----------------------------------------------------

    /// Renames the device (affects logging and registry diagnostics).
    fn set_name(&self, name: &str) -> Result<()>;

    /// The device's current name.
    fn name(&self) -> String;

    /// Initializes backend state. Called once after construction;
    /// repeatable.
    fn init(&self) -> Result<()>;

    /// Releases backend resources. The device may be re-`init`ed later.
    fn release(&self) -> Result<()>;

    /// Establishes the transport session. Repeatable.
    fn connect(&self) -> Result<()>;

    /// Tears down the transport session. Repeatable.
    fn disconnect(&self) -> Result<()>;

    /// The backend family tag. Immutable.
    fn device_type(&self) -> DeviceType;

    /// How this backend exchanges transaction data with the host.
    fn device_protocol(&self) -> DeviceProtocol {
        DeviceProtocol::Default
    }

    /// Registers the interaction callback. The reference is non-owning;
    /// the caller keeps the callback alive.
    fn set_callback(&self, callback: Weak<dyn DeviceCallback>);

    /// Sets the BIP-32 style derivation path for backends that use one.
    fn set_derivation_path(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    /// Supplies a PIN ahead of time so the device does not prompt.
    fn set_pin(&self, _pin: Zeroizing<String>) -> Result<()> {
        Ok(())
    }

    /// Supplies a passphrase ahead of time so the device does not
    /// prompt.
    fn set_passphrase(&self, _passphrase: Zeroizing<String>) -> Result<()> {
        Ok(())
    }

    /// Tells the backend which network addresses belong to.
    fn set_network_type(&self, _network: NetworkType) -> Result<()> {
        Ok(())
    }

    // --- locking -------------------------------------------------------

    /// Acquires the device's exclusive lock, blocking until available.
    ///
    /// Not reentrant: a second `lock` from the holding thread deadlocks.
    fn lock(&self);

    /// Releases the exclusive lock.
    fn unlock(&self);

    /// Attempts to acquire the lock without blocking.
    fn try_lock(&self) -> bool;

    // --- mode ----------------------------------------------------------

    /// Switches the device's operating mode.
    ///
    /// # Errors
    /// Backends may refuse transitions that their hardware state cannot
    /// honor.
    fn set_mode(&self, mode: DeviceMode) -> Result<()>;

    /// The current operating mode.
    fn mode(&self) -> DeviceMode;

    // --- wallet & address ----------------------------------------------

    /// The account address held on the device.
    ///
    /// # Errors
    /// [`DeviceError::Unsupported`] unless the backend stores account
    /// keys.
    fn get_public_address(&self) -> Result<AccountPublicAddress> {
        Err(DeviceError::Unsupported { operation: "get_public_address" })
    }

    /// Exports the view and spend secret keys.
    ///
    /// # Errors
    /// [`DeviceError::Unsupported`]: hardware backends never export
    /// their spend secret.
    fn get_secret_keys(&self) -> Result<(SecretKey, SecretKey)> {
        Err(DeviceError::Unsupported { operation: "get_secret_keys" })
    }

    // --- subaddresses --------------------------------------------------

    /// Recovers the subaddress spend key an output was sent to.
    ///
    /// # Errors
    /// Fails on malformed keys.
    fn derive_subaddress_public_key(
        &self,
        out_key: &PublicKey,
        derivation: &KeyDerivation,
        output_index: u64,
    ) -> Result<PublicKey>;

    /// Spend public key of subaddress `index`.
    ///
    /// # Errors
    /// Fails on malformed keys.
    fn get_subaddress_spend_public_key(
        &self,
        keys: &AccountKeys,
        index: &SubaddressIndex,
    ) -> Result<PublicKey>;

    /// Spend public keys for the minor range `[begin, end)` of
    /// `account`.
    ///
    /// # Errors
    /// Fails when `begin > end` or on malformed keys.
    fn get_subaddress_spend_public_keys(
        &self,
        keys: &AccountKeys,
        account: u32,
        begin: u32,
        end: u32,
    ) -> Result<Vec<PublicKey>>;

    /// Full public address of subaddress `index`.
    ///
    /// The spend component always equals
    /// [`Device::get_subaddress_spend_public_key`] for the same index.
    ///
    /// # Errors
    /// Fails on malformed keys.
    fn get_subaddress(
        &self,
        keys: &AccountKeys,
        index: &SubaddressIndex,
    ) -> Result<AccountPublicAddress>;

    /// Additive secret for subaddress `index`, derived from the view
    /// secret.
    ///
    /// # Errors
    /// Fails on malformed keys.
    fn get_subaddress_secret_key(
        &self,
        sec: &SecretKey,
        index: &SubaddressIndex,
    ) -> Result<SecretKey>;

    // --- derivation & keys ---------------------------------------------

    /// Checks that `sec` is the secret key of `public`.
    ///
    /// # Errors
    /// Fails on malformed keys.
    fn verify_keys(&self, sec: &SecretKey, public: &PublicKey) -> Result<bool>;

    /// Computes `a * P`.
    ///
    /// # Errors
    /// Fails on malformed inputs.
    fn scalarmult_key(&self, p: &EcPoint, a: &EcScalar) -> Result<EcPoint>;

    /// Computes `a * G`.
    ///
    /// # Errors
    /// Fails on malformed inputs.
    fn scalarmult_base(&self, a: &EcScalar) -> Result<EcPoint>;

    /// Adds two secret scalars.
    ///
    /// # Errors
    /// Fails on malformed inputs.
    fn sc_secret_add(&self, a: &SecretKey, b: &SecretKey) -> Result<SecretKey>;

    /// Generates a keypair, deterministically when `recovery` is given.
    ///
    /// # Errors
    /// Fails on a malformed recovery seed.
    fn generate_keys(&self, recovery: Option<&SecretKey>) -> Result<KeyPair>;

    /// Computes the shared-secret derivation `8 * (sec * pub)`.
    ///
    /// # Errors
    /// Fails on malformed keys.
    fn generate_key_derivation(&self, public: &PublicKey, sec: &SecretKey)
        -> Result<KeyDerivation>;

    /// Re-validates (and for hardware, re-encrypts) a derivation before
    /// it leaves the signing path.
    ///
    /// The derivation must be the main derivation for `tx_pub_key` or
    /// one of the additional derivations for its paired additional
    /// transaction key.
    ///
    /// # Errors
    /// [`vault_primitives::Error::DerivationMismatch`] when the
    /// derivation matches neither.
    fn conceal_derivation(
        &self,
        derivation: &KeyDerivation,
        tx_pub_key: &PublicKey,
        additional_tx_pub_keys: &[PublicKey],
        main_derivation: &KeyDerivation,
        additional_derivations: &[KeyDerivation],
    ) -> Result<KeyDerivation>;

    /// Hashes a derivation and output index to a scalar.
    ///
    /// # Errors
    /// Fails on malformed inputs.
    fn derivation_to_scalar(
        &self,
        derivation: &KeyDerivation,
        output_index: u64,
    ) -> Result<EcScalar>;

    /// Derives the per-output secret key.
    ///
    /// # Errors
    /// Fails on malformed keys.
    fn derive_secret_key(
        &self,
        derivation: &KeyDerivation,
        output_index: u64,
        sec: &SecretKey,
    ) -> Result<SecretKey>;

    /// Derives the per-output public key.
    ///
    /// # Errors
    /// Fails on malformed keys.
    fn derive_public_key(
        &self,
        derivation: &KeyDerivation,
        output_index: u64,
        public: &PublicKey,
    ) -> Result<PublicKey>;

    /// Computes the public key of a secret key.
    ///
    /// # Errors
    /// Fails on a malformed secret.
    fn secret_key_to_public_key(&self, sec: &SecretKey) -> Result<PublicKey>;

    /// Computes the key image `sec * Hp(pub)`.
    ///
    /// # Errors
    /// Fails on malformed keys.
    fn generate_key_image(&self, public: &PublicKey, sec: &SecretKey) -> Result<KeyImage>;

    /// Proves ownership of a key image.
    ///
    /// # Errors
    /// Fails on malformed keys.
    fn generate_key_image_signature(
        &self,
        image: &KeyImage,
        public: &PublicKey,
        sec: &SecretKey,
    ) -> Result<Signature>;

    /// Produces a proof of key possession for unlock flows.
    ///
    /// # Errors
    /// Fails on malformed keys.
    fn generate_unlock_signature(&self, public: &PublicKey, sec: &SecretKey) -> Result<Signature>;

    // --- transactions --------------------------------------------------

    /// Opens a transaction session and returns its fresh secret key.
    ///
    /// Exactly one matching [`Device::close_tx`] ends the session. A
    /// failed `open_tx` obligates nothing.
    ///
    /// # Errors
    /// [`DeviceError::TransactionInProgress`] when a session is already
    /// open.
    fn open_tx(&self, version: TxVersion, tx_type: TxType) -> Result<SecretKey>;

    /// Closes the open transaction session and scrubs its state.
    ///
    /// # Errors
    /// [`DeviceError::NoOpenTransaction`] when no session is open.
    fn close_tx(&self) -> Result<()>;

    /// Proves that `d_pub` is the shared secret between `r_sec` and
    /// `a_pub`, bound to `prefix_hash`. `b_pub` is the destination
    /// spend key for subaddress proofs.
    ///
    /// # Errors
    /// Fails on malformed keys.
    fn generate_tx_proof(
        &self,
        prefix_hash: &Hash,
        r_pub: &PublicKey,
        a_pub: &PublicKey,
        b_pub: Option<&PublicKey>,
        d_pub: &PublicKey,
        r_sec: &SecretKey,
    ) -> Result<Signature>;

    /// Encrypts a short payment ID against the recipient's view key.
    ///
    /// # Errors
    /// Fails on malformed keys.
    fn encrypt_payment_id(
        &self,
        payment_id: Hash8,
        public_key: &PublicKey,
        secret_key: &SecretKey,
    ) -> Result<Hash8>;

    /// Decrypts a short payment ID.
    ///
    /// Encryption is an XOR pad, so decryption is the same operation.
    ///
    /// # Errors
    /// Fails on malformed keys.
    fn decrypt_payment_id(
        &self,
        payment_id: Hash8,
        public_key: &PublicKey,
        secret_key: &SecretKey,
    ) -> Result<Hash8> {
        self.encrypt_payment_id(payment_id, public_key, secret_key)
    }

    /// Derives the deterministic commitment blinding factor for an
    /// output.
    ///
    /// # Errors
    /// Fails on malformed inputs.
    fn gen_commitment_mask(&self, amount_key: &SecretKey) -> Result<EcScalar>;

    /// Masks an ECDH tuple in place with the shared secret.
    ///
    /// # Errors
    /// Fails on malformed inputs.
    fn ecdh_encode(
        &self,
        unmasked: &mut EcdhTuple,
        shared_secret: &SecretKey,
        short_amount: bool,
    ) -> Result<()>;

    /// Unmasks an ECDH tuple in place with the shared secret.
    ///
    /// # Errors
    /// Fails on malformed inputs.
    fn ecdh_decode(
        &self,
        masked: &mut EcdhTuple,
        shared_secret: &SecretKey,
        short_amount: bool,
    ) -> Result<()>;

    /// Derives one output's one-time destination key and amount key.
    ///
    /// Must be called once per output inside an open session.
    ///
    /// # Errors
    /// [`DeviceError::NoOpenTransaction`] outside a session;
    /// [`DeviceError::InvalidInput`] when an additional key is required
    /// but missing for `output_index`.
    fn generate_output_ephemeral_keys(
        &self,
        params: &OutputKeyParams<'_>,
    ) -> Result<OutputEphemeralKeys>;

    // --- legacy ring signatures (MLSAG) --------------------------------

    /// Commits to the message and output set being signed.
    ///
    /// # Errors
    /// [`DeviceError::InvalidInput`] when the element counts disagree.
    fn mlsag_prehash(
        &self,
        blob: &[u8],
        inputs_size: usize,
        outputs_size: usize,
        hashes: &[Hash],
        out_pk: &[CtKey],
    ) -> Result<Hash>;

    /// Draws blinding material for a decoy round (`alpha`, `alpha * G`
    /// only).
    ///
    /// # Errors
    /// Fails when the backend cannot draw randomness.
    fn mlsag_prepare(&self) -> Result<MlsagPrepared>;

    /// Draws blinding material for the real-input round, including the
    /// key-image row for ring key `xx` over hash point `h`.
    ///
    /// # Errors
    /// Fails on malformed inputs.
    fn mlsag_prepare_ring(&self, h: &EcPoint, xx: &SecretKey) -> Result<MlsagPrepared>;

    /// Hashes one round's transcript to the next challenge.
    ///
    /// # Errors
    /// Fails when the transcript is empty.
    fn mlsag_hash(&self, transcript: &[[u8; 32]]) -> Result<EcScalar>;

    /// Finalizes the response scalars `ss[j] = alpha[j] - c * xx[j]`.
    ///
    /// # Errors
    /// [`DeviceError::InvalidInput`] when the row counts disagree.
    fn mlsag_sign(
        &self,
        c: &EcScalar,
        xx: &[SecretKey],
        alpha: &[SecretKey],
        rows: usize,
        ds_rows: usize,
    ) -> Result<Vec<EcScalar>>;

    // --- CLSAG ---------------------------------------------------------

    /// Commits to the message and output set being signed.
    ///
    /// # Errors
    /// [`DeviceError::InvalidInput`] when the element counts disagree.
    fn clsag_prehash(
        &self,
        blob: &[u8],
        inputs_size: usize,
        outputs_size: usize,
        hashes: &[Hash],
        out_pk: &[CtKey],
    ) -> Result<Hash>;

    /// Derives the key images and blinding material for one CLSAG
    /// signature over hash point `h`, spend secret `p` and commitment
    /// offset `z`.
    ///
    /// # Errors
    /// Fails on malformed inputs.
    fn clsag_prepare(&self, p: &SecretKey, z: &SecretKey, h: &EcPoint) -> Result<ClsagPrepared>;

    /// Hashes one round's transcript to the next challenge.
    ///
    /// # Errors
    /// Fails when the transcript is empty.
    fn clsag_hash(&self, transcript: &[[u8; 32]]) -> Result<EcScalar>;

    /// Finalizes the response `s = alpha - c * (mu_p * p + mu_c * z)`.
    ///
    /// # Errors
    /// Fails on malformed inputs.
    fn clsag_sign(
        &self,
        c: &EcScalar,
        alpha: &SecretKey,
        p: &SecretKey,
        z: &SecretKey,
        mu_p: &EcScalar,
        mu_c: &EcScalar,
    ) -> Result<EcScalar>;

    // --- cold signing & key image sync ---------------------------------

    /// Whether the backend supports offline key-image export.
    fn has_ki_cold_sync(&self) -> bool {
        false
    }

    /// Whether the backend supports offline transaction signing.
    fn has_tx_cold_sign(&self) -> bool {
        false
    }

    /// Whether key images can be recomputed live during refresh.
    fn has_ki_live_refresh(&self) -> bool {
        true
    }

    /// Recomputes the ephemeral keypair and key image for a received
    /// output during live refresh.
    ///
    /// Returns `Ok(None)` when the backend does not handle this and the
    /// caller must fall back to its own derivation path.
    ///
    /// # Errors
    /// [`vault_primitives::Error::DerivationMismatch`] when the derived
    /// public key does not reproduce `out_key`.
    fn compute_key_image(
        &self,
        _keys: &AccountKeys,
        _out_key: &PublicKey,
        _recv_derivation: &KeyDerivation,
        _real_output_index: u64,
        _received_index: &SubaddressIndex,
    ) -> Result<Option<(KeyPair, KeyImage)>> {
        Ok(None)
    }

    /// Advisory: a key-image computation batch is starting or ending.
    fn computing_key_images(&self, _computing: bool) {}

    /// Shows an address on the device's own display.
    ///
    /// # Errors
    /// Backends with a display may report transport failures.
    fn display_address(
        &self,
        _index: &SubaddressIndex,
        _payment_id: Option<&Hash8>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Scoped mode switch: acquires a mode on creation and resets the
/// device to [`DeviceMode::Idle`] on drop, on every exit path.
pub struct ModeGuard<'a> {
    device: &'a dyn Device,
}

impl<'a> ModeGuard<'a> {
    /// Switches `device` into `mode` for the guard's lifetime.
    ///
    /// # Errors
    /// Propagates the backend's refusal; no guard is created and the
    /// mode is untouched.
    pub fn new(device: &'a dyn Device, mode: DeviceMode) -> Result<Self> {
        device.set_mode(mode)?;
        Ok(Self { device })
    }
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.device.set_mode(DeviceMode::Idle) {
            tracing::warn!(device = %self.device.name(), %err, "failed to reset device mode");
        }
    }
}
