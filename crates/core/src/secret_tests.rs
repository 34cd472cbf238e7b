// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn secret(name: &str, pairs: &[(&str, &str)]) -> Secret {
    Secret {
        meta: Metadata::new("default", name),
        data: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        encrypt_data: HashMap::new(),
    }
}

#[test]
fn encrypt_then_decrypt_is_identity_on_data() {
    let mut s = secret("token", &[("user", "ink"), ("pass", "hunter2")]);
    let original = s.data.clone();

    s.encrypt();
    assert!(s.data.is_empty());
    assert_eq!(s.encrypt_data.len(), 2);

    s.decrypt().unwrap();
    assert_eq!(s.data, original);
}

#[test]
fn encrypted_values_are_not_plaintext() {
    let mut s = secret("token", &[("pass", "hunter2")]);
    s.encrypt();
    assert_ne!(s.encrypt_data["pass"], "hunter2");
}

#[test]
fn decrypt_rejects_invalid_base64() {
    let mut s = secret("token", &[]);
    s.encrypt_data.insert("pass".to_string(), "not-base64!!!".to_string());
    assert!(s.decrypt().is_err());
}

#[test]
fn find_key_decrypts_the_named_secret() {
    let mut s = secret("token", &[("pass", "hunter2")]);
    s.encrypt();
    let secrets = vec![secret("other", &[]), s];

    assert_eq!(Secret::find_key(&secrets, "token", "pass").as_deref(), Some("hunter2"));
    assert_eq!(Secret::find_key(&secrets, "token", "missing"), None);
    assert_eq!(Secret::find_key(&secrets, "absent", "pass"), None);
}
