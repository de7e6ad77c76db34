//! End-to-end vault scenarios and the wrong-password rejection property.

use market_wallet::core::vault::WalletVault;
use market_wallet::core::WalletError;
use market_wallet::crypto::cipher::KeyCipher;
use market_wallet::crypto::keys::PrivateKey;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tempfile::tempdir;

// Full-strength PBKDF2 is deliberately slow; tests dial it down.
const TEST_ITERATIONS: u32 = 1_000;

fn test_vault() -> WalletVault {
    WalletVault::new(KeyCipher::new(TEST_ITERATIONS))
}

#[test]
fn save_then_load_recovers_the_exact_key() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("w.wlt");
    let vault = test_vault();

    let key = PrivateKey::from_hex(
        "0000000000000000000000000000000000000000000000000000000000001234",
    )
    .unwrap();
    vault.save(&key, "correct", &path).unwrap();

    let loaded = vault.load(&path, "correct").unwrap();
    assert_eq!(loaded.as_bytes(), key.as_bytes());

    match vault.load(&path, "wrong") {
        Err(WalletError::Integrity(_)) => {}
        other => panic!("expected Integrity error, got {:?}", other),
    }
}

#[test]
fn listing_reports_every_saved_wallet_without_passwords() {
    let dir = tempdir().unwrap();
    let vault = test_vault();

    let mut expected = Vec::new();
    for name in ["a.wlt", "b.wlt", "c.wlt"] {
        let key = PrivateKey::generate();
        let address = vault.save(&key, "pw", &dir.path().join(name)).unwrap();
        expected.push(address);
    }

    let listed: Vec<_> = WalletVault::list_records(dir.path())
        .unwrap()
        .into_iter()
        .map(|(_, address)| address)
        .collect();
    assert_eq!(listed, expected);
}

#[test]
fn missing_file_is_an_io_error_not_integrity() {
    let dir = tempdir().unwrap();
    let vault = test_vault();
    let err = vault
        .load(&dir.path().join("absent.wlt"), "pw")
        .unwrap_err();
    assert!(matches!(err, WalletError::Io(_)));
    assert!(!err.is_recoverable());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    // Disjoint alphabets guarantee the two passwords differ.
    #[test]
    fn wrong_password_never_silently_recovers_the_key(
        correct in "[a-z]{4,12}",
        wrong in "[A-Z]{4,12}",
    ) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("w.wlt");
        let vault = test_vault();
        let key = PrivateKey::generate();
        vault.save(&key, &correct, &path).unwrap();

        let outcome = vault.load(&path, &wrong);
        prop_assert!(outcome.is_err());
        prop_assert!(outcome.unwrap_err().is_recoverable());
    }

    #[test]
    fn cipher_roundtrips_arbitrary_payloads(payload in proptest::collection::vec(any::<u8>(), 0..128)) {
        let cipher = KeyCipher::new(TEST_ITERATIONS);
        let key = [77u8; 32];
        let blob = cipher.encrypt(&payload, &key);
        let recovered = cipher.decrypt(&blob, &key).unwrap();
        prop_assert_eq!(recovered.as_slice(), payload.as_slice());
    }
}
