//! End-to-end transaction flow against the `"default"` software backend.
//!
//! Drives the full session protocol the way wallet code does: resolve
//! from the registry, lock, switch mode, open a session, derive output
//! keys, conceal amounts, close, unlock. Every derived value is
//! cross-checked independently through the primitives layer.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::redundant_clone
)]

use std::sync::Arc;

use vault_device::{
    get_device, AccountKeys, AccountPublicAddress, DeviceError, DeviceMode, EcdhTuple,
    ModeGuard, OutputKeyParams, SubaddressIndex, TxDestinationEntry, TxType, TxVersion,
};
use vault_primitives::{hash_to_scalar, ops, EcScalar, Hash8};

fn account() -> AccountKeys {
    let spend = ops::generate_keys(None).unwrap();
    let view = ops::generate_keys(None).unwrap();
    AccountKeys {
        address: AccountPublicAddress {
            spend_public_key: spend.public,
            view_public_key: view.public,
        },
        spend_secret_key: spend.secret,
        view_secret_key: view.secret,
    }
}

#[test]
fn full_transaction_flow_with_default_backend() {
    vault_device::init().expect("self-check passes");

    // Resolution is idempotent: both handles are the same instance.
    let device = get_device("default").expect("software backend is pre-registered");
    let again = get_device("default").unwrap();
    assert!(Arc::ptr_eq(&device, &again));

    let sender = account();
    let recipient = account();

    // The tests in this file share the one canonical instance, so state
    // resets happen under the device lock.
    device.lock();
    device.init().unwrap();
    device.connect().unwrap();
    let guard = ModeGuard::new(device.as_ref(), DeviceMode::TransactionReal).unwrap();
    assert_eq!(device.mode(), DeviceMode::TransactionReal);

    let tx_key = device.open_tx(TxVersion::V2, TxType::Standard).unwrap();
    let tx_pub = device.secret_key_to_public_key(&tx_key).unwrap();

    // One plain destination, no change output.
    let destination = TxDestinationEntry {
        amount: 2_500_000,
        addr: recipient.address,
        is_subaddress: false,
    };
    let params = OutputKeyParams {
        sender_account_keys: &sender,
        tx_public_key: tx_pub,
        tx_secret_key: &tx_key,
        destination: &destination,
        change_address: None,
        output_index: 0,
        need_additional_tx_keys: false,
        additional_tx_secret_keys: &[],
    };
    let output = device.generate_output_ephemeral_keys(&params).unwrap();
    assert!(!output.is_change);
    assert!(output.additional_tx_public_key.is_none());

    // Receiver-side cross-check: the one-time key must equal the base
    // point multiplied by the derived spend scalar.
    let recv_derivation =
        device.generate_key_derivation(&tx_pub, &recipient.view_secret_key).unwrap();
    let derived_sec = device
        .derive_secret_key(&recv_derivation, 0, &recipient.spend_secret_key)
        .unwrap();
    assert_eq!(
        device.secret_key_to_public_key(&derived_sec).unwrap(),
        output.one_time_public_key
    );

    // The amount key matches the receiver's derivation scalar.
    assert_eq!(output.amount_key, ops::derivation_to_scalar(&recv_derivation, 0));

    // Amount concealment round-trips through the shared secret.
    let shared = vault_primitives::SecretKey::from_bytes(output.amount_key.to_bytes());
    let mut amount_bytes = [0u8; 32];
    amount_bytes[..8].copy_from_slice(&destination.amount.to_le_bytes());
    let mut tuple = EcdhTuple {
        mask: hash_to_scalar(b"pre-mask"),
        amount: EcScalar::from_bytes(amount_bytes),
    };
    device.ecdh_encode(&mut tuple, &shared, true).unwrap();
    device.ecdh_decode(&mut tuple, &shared, true).unwrap();
    assert_eq!(tuple.amount, EcScalar::from_bytes(amount_bytes));
    assert_eq!(tuple.mask, device.gen_commitment_mask(&shared).unwrap());

    // Payment-ID involution under the real transaction key.
    let payment_id = Hash8::from_bytes(*b"invoice1");
    let encrypted = device
        .encrypt_payment_id(payment_id, &recipient.address.view_public_key, &tx_key)
        .unwrap();
    let decrypted = device
        .decrypt_payment_id(encrypted, &recipient.address.view_public_key, &tx_key)
        .unwrap();
    assert_eq!(decrypted, payment_id);

    device.close_tx().unwrap();
    assert!(matches!(device.close_tx(), Err(DeviceError::NoOpenTransaction)));

    drop(guard);
    assert_eq!(device.mode(), DeviceMode::Idle);
    device.unlock();
}

#[test]
fn change_output_derives_against_sender_view_key() {
    let device = get_device("default:e2e").unwrap();
    let sender = account();

    device.lock();
    let tx_key = device.open_tx(TxVersion::V2, TxType::Standard).unwrap();
    let tx_pub = device.secret_key_to_public_key(&tx_key).unwrap();

    let change = TxDestinationEntry {
        amount: 700,
        addr: sender.address,
        is_subaddress: false,
    };
    let params = OutputKeyParams {
        sender_account_keys: &sender,
        tx_public_key: tx_pub,
        tx_secret_key: &tx_key,
        destination: &change,
        change_address: Some(&change),
        output_index: 1,
        need_additional_tx_keys: false,
        additional_tx_secret_keys: &[],
    };
    let output = device.generate_output_ephemeral_keys(&params).unwrap();
    assert!(output.is_change);

    // The sender can spend it: derive with the own view secret, then
    // the own spend secret.
    let derivation =
        device.generate_key_derivation(&tx_pub, &sender.view_secret_key).unwrap();
    let derived_sec =
        device.derive_secret_key(&derivation, 1, &sender.spend_secret_key).unwrap();
    assert_eq!(
        device.secret_key_to_public_key(&derived_sec).unwrap(),
        output.one_time_public_key
    );

    device.close_tx().unwrap();
    device.unlock();
}

#[test]
fn subaddress_destination_uses_additional_keys() {
    let device = get_device("default:e2e-sub").unwrap();
    let sender = account();
    let recipient = account();
    let index = SubaddressIndex { major: 0, minor: 7 };
    let sub_spend = device.get_subaddress_spend_public_key(&recipient, &index).unwrap();
    let sub_full = device.get_subaddress(&recipient, &index).unwrap();
    assert_eq!(sub_full.spend_public_key, sub_spend);

    device.lock();
    let tx_key = device.open_tx(TxVersion::V2, TxType::Standard).unwrap();
    let tx_pub = device.secret_key_to_public_key(&tx_key).unwrap();
    let additional = vec![ops::random_scalar()];

    let destination = TxDestinationEntry {
        amount: 9_000,
        addr: sub_full,
        is_subaddress: true,
    };
    let params = OutputKeyParams {
        sender_account_keys: &sender,
        tx_public_key: tx_pub,
        tx_secret_key: &tx_key,
        destination: &destination,
        change_address: None,
        output_index: 0,
        need_additional_tx_keys: true,
        additional_tx_secret_keys: &additional,
    };
    let output = device.generate_output_ephemeral_keys(&params).unwrap();
    let additional_pub =
        output.additional_tx_public_key.expect("subaddress outputs carry an additional key");

    // Receiver-side scan: derive against the additional public key and
    // recover the subaddress spend key from the one-time key.
    let recv_derivation = device
        .generate_key_derivation(&additional_pub, &recipient.view_secret_key)
        .unwrap();
    let recovered = device
        .derive_subaddress_public_key(&output.one_time_public_key, &recv_derivation, 0)
        .unwrap();
    assert_eq!(recovered, sub_full.spend_public_key);

    device.close_tx().unwrap();
    device.unlock();
}
