//! The in-process software backend.
//!
//! [`SoftwareDevice`] implements the full [`Device`] contract with
//! `vault-primitives`, keeps its transaction session state behind a
//! mutex, and is the backend the default registry exposes as
//! `"default"`. It holds no account keys of its own; wallet keys arrive
//! as operation inputs.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use std::sync::{Condvar, Mutex, MutexGuard, Weak};

use vault_primitives::{
    hash_to_scalar, keccak256, ops, EcPoint, EcScalar, Error as PrimError, Hash, Hash8,
    KeyDerivation, KeyImage, KeyPair, PublicKey, SecretKey, Signature,
};

use crate::callback::DeviceCallback;
use crate::device::{
    ClsagPrepared, Device, MlsagPrepared, OutputEphemeralKeys, OutputKeyParams,
};
use crate::error::{DeviceError, Result};
use crate::types::{
    AccountKeys, AccountPublicAddress, CtKey, DeviceMode, DeviceType, EcdhTuple, NetworkType,
    SubaddressIndex, TxType, TxVersion,
};

/// Domain prefix of the amount-encryption pad.
const AMOUNT_TAG: &[u8] = b"amount";
/// Domain prefix of the deterministic commitment mask.
const COMMITMENT_MASK_TAG: &[u8] = b"commitment_mask";
/// Byte appended to a derivation before hashing it into the payment-ID
/// pad.
const PAYMENT_ID_TAIL: u8 = 0x8d;

/// Exclusive device lock built from a mutex and condvar.
///
/// Genuine mutual exclusion rather than an advisory flag: `acquire`
/// blocks until the holder releases. Not reentrant.
struct DeviceLock {
    held: Mutex<bool>,
    released: Condvar,
}

impl DeviceLock {
    const fn new() -> Self {
        Self { held: Mutex::new(false), released: Condvar::new() }
    }

    fn guard(&self) -> MutexGuard<'_, bool> {
        self.held.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("device lock mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn acquire(&self) {
        let mut held = self.guard();
        while *held {
            held = self.released.wait(held).unwrap_or_else(|poisoned| {
                tracing::warn!("device lock mutex poisoned during wait, recovering");
                poisoned.into_inner()
            });
        }
        *held = true;
    }

    fn try_acquire(&self) -> bool {
        let mut held = self.guard();
        if *held {
            false
        } else {
            *held = true;
            true
        }
    }

    fn release(&self) {
        let mut held = self.guard();
        *held = false;
        drop(held);
        self.released.notify_one();
    }
}

/// A transaction session opened by `open_tx` and ended by `close_tx`.
struct TxSession {
    version: TxVersion,
    tx_type: TxType,
    tx_key: SecretKey,
}

/// Mutable state of a software device.
struct DeviceState {
    name: String,
    mode: DeviceMode,
    network: NetworkType,
    session: Option<TxSession>,
}

/// The canonical in-process signing backend.
pub struct SoftwareDevice {
    state: Mutex<DeviceState>,
    lock: DeviceLock,
    callback: Mutex<Option<Weak<dyn DeviceCallback>>>,
}

impl SoftwareDevice {
    /// Creates a fresh device in [`DeviceMode::Idle`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DeviceState {
                name: "default".to_owned(),
                mode: DeviceMode::Idle,
                network: NetworkType::Mainnet,
                session: None,
            }),
            lock: DeviceLock::new(),
            callback: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("device state mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// XORs the low 8 bytes of an amount scalar with the pad derived
    /// from the shared secret. The amount occupies the low 8 bytes, so
    /// the result stays a canonical scalar.
    fn xor8_amount(amount: &EcScalar, shared_secret: &SecretKey) -> EcScalar {
        let mut buf = Vec::with_capacity(AMOUNT_TAG.len() + 32);
        buf.extend_from_slice(AMOUNT_TAG);
        buf.extend_from_slice(shared_secret.as_bytes());
        let pad = keccak256(&buf);
        let mut bytes = amount.to_bytes();
        for (b, p) in bytes.iter_mut().take(8).zip(pad.as_bytes()) {
            *b ^= p;
        }
        EcScalar::from_bytes(bytes)
    }

    fn commitment_mask(amount_key: &SecretKey) -> EcScalar {
        let mut buf = Vec::with_capacity(COMMITMENT_MASK_TAG.len() + 32);
        buf.extend_from_slice(COMMITMENT_MASK_TAG);
        buf.extend_from_slice(amount_key.as_bytes());
        hash_to_scalar(&buf)
    }

    fn ring_transcript_scalar(transcript: &[[u8; 32]]) -> Result<EcScalar> {
        if transcript.is_empty() {
            return Err(DeviceError::InvalidInput("empty round transcript".to_owned()));
        }
        let mut buf = Vec::with_capacity(transcript.len() * 32);
        for element in transcript {
            buf.extend_from_slice(element);
        }
        Ok(hash_to_scalar(&buf))
    }

    fn prehash(
        outputs_size: usize,
        hashes: &[Hash],
        out_pk: &[CtKey],
    ) -> Result<Hash> {
        if out_pk.len() != outputs_size {
            return Err(DeviceError::InvalidInput(format!(
                "output key count {} does not match declared outputs {}",
                out_pk.len(),
                outputs_size
            )));
        }
        if hashes.is_empty() {
            return Err(DeviceError::InvalidInput("empty prehash element list".to_owned()));
        }
        let mut buf = Vec::with_capacity(hashes.len() * 32);
        for h in hashes {
            buf.extend_from_slice(h.as_bytes());
        }
        Ok(keccak256(&buf))
    }
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for SoftwareDevice {
    fn set_name(&self, name: &str) -> Result<()> {
        self.state().name = name.to_owned();
        Ok(())
    }

    fn name(&self) -> String {
        self.state().name.clone()
    }

    fn init(&self) -> Result<()> {
        let mut state = self.state();
        state.mode = DeviceMode::Idle;
        state.session = None;
        tracing::debug!(device = %state.name, "software device initialized");
        Ok(())
    }

    fn release(&self) -> Result<()> {
        let mut state = self.state();
        state.session = None;
        state.mode = DeviceMode::Idle;
        tracing::debug!(device = %state.name, "software device released");
        Ok(())
    }

    // In-process keys need no transport; connect and disconnect only
    // leave a trace of the lifecycle.
    fn connect(&self) -> Result<()> {
        tracing::debug!(device = %self.state().name, "software device connected");
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        tracing::debug!(device = %self.state().name, "software device disconnected");
        Ok(())
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::Software
    }

    fn set_callback(&self, callback: Weak<dyn DeviceCallback>) {
        let mut slot = self.callback.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("callback mutex poisoned, recovering");
            poisoned.into_inner()
        });
        *slot = Some(callback);
    }

    fn set_network_type(&self, network: NetworkType) -> Result<()> {
        self.state().network = network;
        Ok(())
    }

    fn lock(&self) {
        self.lock.acquire();
    }

    fn unlock(&self) {
        self.lock.release();
    }

    fn try_lock(&self) -> bool {
        self.lock.try_acquire()
    }

    fn set_mode(&self, mode: DeviceMode) -> Result<()> {
        let mut state = self.state();
        tracing::trace!(device = %state.name, ?mode, "mode switch");
        state.mode = mode;
        Ok(())
    }

    fn mode(&self) -> DeviceMode {
        self.state().mode
    }

    // The software backend holds no account keys, so the wallet/address
    // surface stays at the trait's typed-unsupported defaults.

    fn derive_subaddress_public_key(
        &self,
        out_key: &PublicKey,
        derivation: &KeyDerivation,
        output_index: u64,
    ) -> Result<PublicKey> {
        Ok(ops::derive_subaddress_public_key(out_key, derivation, output_index)?)
    }

    fn get_subaddress_spend_public_key(
        &self,
        keys: &AccountKeys,
        index: &SubaddressIndex,
    ) -> Result<PublicKey> {
        if index.is_zero() {
            return Ok(keys.address.spend_public_key);
        }
        let m = ops::subaddress_secret_key(&keys.view_secret_key, index.major, index.minor);
        let m_g = ops::secret_key_to_public_key(&m)?;
        let sum = ops::add_keys(
            &EcPoint::from_bytes(keys.address.spend_public_key.to_bytes()),
            &EcPoint::from_bytes(m_g.to_bytes()),
        )?;
        Ok(PublicKey::from_bytes(sum.to_bytes()))
    }

    fn get_subaddress_spend_public_keys(
        &self,
        keys: &AccountKeys,
        account: u32,
        begin: u32,
        end: u32,
    ) -> Result<Vec<PublicKey>> {
        if begin > end {
            return Err(DeviceError::InvalidInput(format!(
                "invalid subaddress range {begin}..{end}"
            )));
        }
        (begin..end)
            .map(|minor| {
                self.get_subaddress_spend_public_key(
                    keys,
                    &SubaddressIndex { major: account, minor },
                )
            })
            .collect()
    }

    fn get_subaddress(
        &self,
        keys: &AccountKeys,
        index: &SubaddressIndex,
    ) -> Result<AccountPublicAddress> {
        if index.is_zero() {
            return Ok(keys.address);
        }
        let spend = self.get_subaddress_spend_public_key(keys, index)?;
        // The subaddress view key is the view secret applied to the
        // subaddress spend key.
        let view = ops::scalarmult_key(
            &EcPoint::from_bytes(spend.to_bytes()),
            &EcScalar::from_bytes(*keys.view_secret_key.as_bytes()),
        )?;
        Ok(AccountPublicAddress {
            spend_public_key: spend,
            view_public_key: PublicKey::from_bytes(view.to_bytes()),
        })
    }

    fn get_subaddress_secret_key(
        &self,
        sec: &SecretKey,
        index: &SubaddressIndex,
    ) -> Result<SecretKey> {
        Ok(ops::subaddress_secret_key(sec, index.major, index.minor))
    }

    fn verify_keys(&self, sec: &SecretKey, public: &PublicKey) -> Result<bool> {
        Ok(ops::verify_keys(sec, public)?)
    }

    fn scalarmult_key(&self, p: &EcPoint, a: &EcScalar) -> Result<EcPoint> {
        Ok(ops::scalarmult_key(p, a)?)
    }

    fn scalarmult_base(&self, a: &EcScalar) -> Result<EcPoint> {
        Ok(ops::scalarmult_base(a)?)
    }

    fn sc_secret_add(&self, a: &SecretKey, b: &SecretKey) -> Result<SecretKey> {
        Ok(ops::sc_secret_add(a, b)?)
    }

    fn generate_keys(&self, recovery: Option<&SecretKey>) -> Result<KeyPair> {
        Ok(ops::generate_keys(recovery)?)
    }

    fn generate_key_derivation(
        &self,
        public: &PublicKey,
        sec: &SecretKey,
    ) -> Result<KeyDerivation> {
        Ok(ops::generate_key_derivation(public, sec)?)
    }

    fn conceal_derivation(
        &self,
        derivation: &KeyDerivation,
        _tx_pub_key: &PublicKey,
        additional_tx_pub_keys: &[PublicKey],
        main_derivation: &KeyDerivation,
        additional_derivations: &[KeyDerivation],
    ) -> Result<KeyDerivation> {
        if additional_tx_pub_keys.len() != additional_derivations.len() {
            return Err(DeviceError::InvalidInput(
                "additional key and derivation lists differ in length".to_owned(),
            ));
        }
        if derivation == main_derivation || additional_derivations.contains(derivation) {
            return Ok(*derivation);
        }
        Err(PrimError::DerivationMismatch(
            "derivation matches neither the main nor an additional transaction key".to_owned(),
        )
        .into())
    }

    fn derivation_to_scalar(
        &self,
        derivation: &KeyDerivation,
        output_index: u64,
    ) -> Result<EcScalar> {
        Ok(ops::derivation_to_scalar(derivation, output_index))
    }

    fn derive_secret_key(
        &self,
        derivation: &KeyDerivation,
        output_index: u64,
        sec: &SecretKey,
    ) -> Result<SecretKey> {
        Ok(ops::derive_secret_key(derivation, output_index, sec)?)
    }

    fn derive_public_key(
        &self,
        derivation: &KeyDerivation,
        output_index: u64,
        public: &PublicKey,
    ) -> Result<PublicKey> {
        Ok(ops::derive_public_key(derivation, output_index, public)?)
    }

    fn secret_key_to_public_key(&self, sec: &SecretKey) -> Result<PublicKey> {
        Ok(ops::secret_key_to_public_key(sec)?)
    }

    fn generate_key_image(&self, public: &PublicKey, sec: &SecretKey) -> Result<KeyImage> {
        Ok(ops::generate_key_image(public, sec)?)
    }

    fn generate_key_image_signature(
        &self,
        image: &KeyImage,
        public: &PublicKey,
        sec: &SecretKey,
    ) -> Result<Signature> {
        Ok(ops::generate_key_image_signature(image, public, sec)?)
    }

    fn generate_unlock_signature(
        &self,
        public: &PublicKey,
        sec: &SecretKey,
    ) -> Result<Signature> {
        Ok(ops::generate_unlock_signature(public, sec)?)
    }

    fn open_tx(&self, version: TxVersion, tx_type: TxType) -> Result<SecretKey> {
        let mut state = self.state();
        if state.session.is_some() {
            return Err(DeviceError::TransactionInProgress);
        }
        let tx_key = ops::random_scalar();
        state.session = Some(TxSession { version, tx_type, tx_key: tx_key.clone() });
        tracing::debug!(device = %state.name, ?version, ?tx_type, "transaction session opened");
        Ok(tx_key)
    }

    fn close_tx(&self) -> Result<()> {
        let mut state = self.state();
        match state.session.take() {
            // Dropping the session zeroizes the transaction key.
            Some(session) => {
                tracing::debug!(
                    device = %state.name,
                    version = ?session.version,
                    tx_type = ?session.tx_type,
                    "transaction session closed"
                );
                Ok(())
            }
            None => Err(DeviceError::NoOpenTransaction),
        }
    }

    fn generate_tx_proof(
        &self,
        prefix_hash: &Hash,
        r_pub: &PublicKey,
        a_pub: &PublicKey,
        b_pub: Option<&PublicKey>,
        d_pub: &PublicKey,
        r_sec: &SecretKey,
    ) -> Result<Signature> {
        Ok(ops::generate_tx_proof(prefix_hash, r_pub, a_pub, b_pub, d_pub, r_sec)?)
    }

    fn encrypt_payment_id(
        &self,
        payment_id: Hash8,
        public_key: &PublicKey,
        secret_key: &SecretKey,
    ) -> Result<Hash8> {
        let derivation = ops::generate_key_derivation(public_key, secret_key)?;
        let mut buf = Vec::with_capacity(33);
        buf.extend_from_slice(derivation.as_bytes());
        buf.push(PAYMENT_ID_TAIL);
        let pad = keccak256(&buf);
        let mut encrypted = payment_id;
        encrypted.xor_with(&pad.as_bytes()[..8]);
        Ok(encrypted)
    }

    fn gen_commitment_mask(&self, amount_key: &SecretKey) -> Result<EcScalar> {
        Ok(Self::commitment_mask(amount_key))
    }

    fn ecdh_encode(
        &self,
        unmasked: &mut EcdhTuple,
        shared_secret: &SecretKey,
        short_amount: bool,
    ) -> Result<()> {
        if short_amount {
            // The mask is implied (deterministic from the shared secret)
            // and does not travel with the output.
            unmasked.mask = EcScalar::default();
            unmasked.amount = Self::xor8_amount(&unmasked.amount, shared_secret);
            return Ok(());
        }
        let shared1 = hash_to_scalar(shared_secret.as_bytes());
        let shared2 = hash_to_scalar(shared1.as_bytes());
        unmasked.mask = ops::sc_add(&unmasked.mask, &shared1)?;
        unmasked.amount = ops::sc_add(&unmasked.amount, &shared2)?;
        Ok(())
    }

    fn ecdh_decode(
        &self,
        masked: &mut EcdhTuple,
        shared_secret: &SecretKey,
        short_amount: bool,
    ) -> Result<()> {
        if short_amount {
            masked.mask = Self::commitment_mask(shared_secret);
            masked.amount = Self::xor8_amount(&masked.amount, shared_secret);
            return Ok(());
        }
        let shared1 = hash_to_scalar(shared_secret.as_bytes());
        let shared2 = hash_to_scalar(shared1.as_bytes());
        masked.mask = ops::sc_sub(&masked.mask, &shared1)?;
        masked.amount = ops::sc_sub(&masked.amount, &shared2)?;
        Ok(())
    }

    fn generate_output_ephemeral_keys(
        &self,
        params: &OutputKeyParams<'_>,
    ) -> Result<OutputEphemeralKeys> {
        if self.state().session.is_none() {
            return Err(DeviceError::NoOpenTransaction);
        }

        let dst = params.destination;
        let sender = params.sender_account_keys;
        let is_change = params.change_address.is_some_and(|change| change.addr == dst.addr);

        // When the transaction carries per-output keys, every output
        // contributes one additional public key, change included: the
        // wallet indexes the vector by output position.
        let mut additional_tx_public_key = None;
        let mut additional_key = None;
        if params.need_additional_tx_keys {
            let key = params
                .additional_tx_secret_keys
                .get(usize::try_from(params.output_index).map_err(|_| {
                    DeviceError::InvalidInput("output index out of range".to_owned())
                })?)
                .ok_or_else(|| {
                    DeviceError::InvalidInput(format!(
                        "no additional transaction key for output {}",
                        params.output_index
                    ))
                })?;
            additional_tx_public_key = Some(if dst.is_subaddress {
                let point = ops::scalarmult_key(
                    &EcPoint::from_bytes(dst.addr.spend_public_key.to_bytes()),
                    &EcScalar::from_bytes(*key.as_bytes()),
                )?;
                PublicKey::from_bytes(point.to_bytes())
            } else {
                ops::secret_key_to_public_key(key)?
            });
            additional_key = Some(key);
        }

        let derivation = if is_change {
            // Change returns to the sender; derive against our own view
            // secret so the wallet scans it like any incoming output.
            ops::generate_key_derivation(&params.tx_public_key, &sender.view_secret_key)?
        } else {
            let tx_key = match additional_key {
                Some(key) if dst.is_subaddress => key,
                _ => params.tx_secret_key,
            };
            ops::generate_key_derivation(&dst.addr.view_public_key, tx_key)?
        };

        let amount_key = ops::derivation_to_scalar(&derivation, params.output_index);
        let one_time_public_key =
            ops::derive_public_key(&derivation, params.output_index, &dst.addr.spend_public_key)?;

        Ok(OutputEphemeralKeys {
            one_time_public_key,
            amount_key,
            additional_tx_public_key,
            is_change,
        })
    }

    fn mlsag_prehash(
        &self,
        _blob: &[u8],
        _inputs_size: usize,
        outputs_size: usize,
        hashes: &[Hash],
        out_pk: &[CtKey],
    ) -> Result<Hash> {
        Self::prehash(outputs_size, hashes, out_pk)
    }

    fn mlsag_prepare(&self) -> Result<MlsagPrepared> {
        let alpha = ops::random_scalar();
        let alpha_g = ops::scalarmult_base(&EcScalar::from_bytes(*alpha.as_bytes()))?;
        Ok(MlsagPrepared { alpha, alpha_g, alpha_hp: None, key_image: None })
    }

    fn mlsag_prepare_ring(&self, h: &EcPoint, xx: &SecretKey) -> Result<MlsagPrepared> {
        let alpha = ops::random_scalar();
        let alpha_scalar = EcScalar::from_bytes(*alpha.as_bytes());
        let alpha_g = ops::scalarmult_base(&alpha_scalar)?;
        let alpha_hp = ops::scalarmult_key(h, &alpha_scalar)?;
        let image = ops::scalarmult_key(h, &EcScalar::from_bytes(*xx.as_bytes()))?;
        Ok(MlsagPrepared {
            alpha,
            alpha_g,
            alpha_hp: Some(alpha_hp),
            key_image: Some(KeyImage::from_bytes(image.to_bytes())),
        })
    }

    fn mlsag_hash(&self, transcript: &[[u8; 32]]) -> Result<EcScalar> {
        Self::ring_transcript_scalar(transcript)
    }

    fn mlsag_sign(
        &self,
        c: &EcScalar,
        xx: &[SecretKey],
        alpha: &[SecretKey],
        rows: usize,
        ds_rows: usize,
    ) -> Result<Vec<EcScalar>> {
        if rows == 0 || xx.len() != rows || alpha.len() != rows || ds_rows > rows {
            return Err(DeviceError::InvalidInput(format!(
                "inconsistent ring rows: rows={rows} ds_rows={ds_rows} xx={} alpha={}",
                xx.len(),
                alpha.len()
            )));
        }
        xx.iter()
            .zip(alpha.iter())
            .map(|(x, a)| {
                let cx = ops::sc_mul(c, &EcScalar::from_bytes(*x.as_bytes()))?;
                Ok(ops::sc_sub(&EcScalar::from_bytes(*a.as_bytes()), &cx)?)
            })
            .collect()
    }

    fn clsag_prehash(
        &self,
        _blob: &[u8],
        _inputs_size: usize,
        outputs_size: usize,
        hashes: &[Hash],
        out_pk: &[CtKey],
    ) -> Result<Hash> {
        Self::prehash(outputs_size, hashes, out_pk)
    }

    fn clsag_prepare(&self, p: &SecretKey, z: &SecretKey, h: &EcPoint) -> Result<ClsagPrepared> {
        let alpha = ops::random_scalar();
        let alpha_scalar = EcScalar::from_bytes(*alpha.as_bytes());
        let alpha_g = ops::scalarmult_base(&alpha_scalar)?;
        let alpha_h = ops::scalarmult_key(h, &alpha_scalar)?;
        let image = ops::scalarmult_key(h, &EcScalar::from_bytes(*p.as_bytes()))?;
        let commitment_image = ops::scalarmult_key(h, &EcScalar::from_bytes(*z.as_bytes()))?;
        Ok(ClsagPrepared {
            alpha,
            alpha_g,
            alpha_h,
            key_image: KeyImage::from_bytes(image.to_bytes()),
            commitment_image,
        })
    }

    fn clsag_hash(&self, transcript: &[[u8; 32]]) -> Result<EcScalar> {
        Self::ring_transcript_scalar(transcript)
    }

    fn clsag_sign(
        &self,
        c: &EcScalar,
        alpha: &SecretKey,
        p: &SecretKey,
        z: &SecretKey,
        mu_p: &EcScalar,
        mu_c: &EcScalar,
    ) -> Result<EcScalar> {
        let weighted_p = ops::sc_mul(mu_p, &EcScalar::from_bytes(*p.as_bytes()))?;
        let weighted_z = ops::sc_mul(mu_c, &EcScalar::from_bytes(*z.as_bytes()))?;
        let combined = ops::sc_add(&weighted_p, &weighted_z)?;
        let c_combined = ops::sc_mul(c, &combined)?;
        Ok(ops::sc_sub(&EcScalar::from_bytes(*alpha.as_bytes()), &c_combined)?)
    }

    fn compute_key_image(
        &self,
        keys: &AccountKeys,
        out_key: &PublicKey,
        recv_derivation: &KeyDerivation,
        real_output_index: u64,
        received_index: &SubaddressIndex,
    ) -> Result<Option<(KeyPair, KeyImage)>> {
        let derived =
            ops::derive_secret_key(recv_derivation, real_output_index, &keys.spend_secret_key)?;
        let sec = if received_index.is_zero() {
            derived
        } else {
            let sub = ops::subaddress_secret_key(
                &keys.view_secret_key,
                received_index.major,
                received_index.minor,
            );
            ops::sc_secret_add(&derived, &sub)?
        };
        let public = ops::secret_key_to_public_key(&sec)?;
        if public != *out_key {
            return Err(PrimError::DerivationMismatch(
                "derived ephemeral public key does not match the output key".to_owned(),
            )
            .into());
        }
        let image = ops::generate_key_image(&public, &sec)?;
        Ok(Some((KeyPair { public, secret: sec }, image)))
    }
}
