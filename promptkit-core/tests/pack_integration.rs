use promptkit_core::pack::{
    classify, export_pack, import_pack, ImportError, PackCodec, PackError, PackHeader, PackKind,
    PackPayload, PackPrompt, FORMAT_VERSION, SCHEMA_VERSION,
};
use promptkit_core::pack::crypto::{AesGcmCipher, FlateGzip, Pbkdf2Kdf, Sha256Hasher};
use sha2::{Digest, Sha256};

fn sample() -> PackPayload {
    let mut prompt = PackPrompt::new("Summarize this thread in three bullets");
    prompt.url = Some("https://chat.example.com/c/42".to_string());
    prompt.created_at = Some(1_714_557_600_000);
    PackPayload::new(
        "claude",
        Some("Daily".to_string()),
        vec![prompt, PackPrompt::new("Translate to French")],
    )
}

#[test]
fn test_pack_file_roundtrip_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("daily.pmtpk");

    let bytes = export_pack(&sample(), Some("Daily2024")).expect("export");
    std::fs::write(&path, &bytes).expect("write pack");

    let read = std::fs::read(&path).expect("read pack");
    let payload = import_pack(&read, || Some("Daily2024".to_string())).expect("import");
    assert_eq!(payload.schema_version, SCHEMA_VERSION);
    assert_eq!(payload.prompts, sample().prompts);
    assert_eq!(payload.title.as_deref(), Some("Daily"));
}

#[test]
fn test_header_exposes_plaintext_hash() {
    let payload = sample();
    let json = serde_json::to_vec(&payload).expect("json");
    let bytes = export_pack(&payload, None).expect("export");

    let header = PackHeader::parse(&bytes).expect("header");
    assert_eq!(header.kind, PackKind::Obfuscated);
    assert_eq!(header.version, FORMAT_VERSION);
    assert_eq!(header.hash.as_slice(), Sha256::digest(&json).as_slice());
    assert_eq!(header.hash_hex().len(), 64);
    assert!(header.salt.is_none());
}

#[test]
fn test_encrypted_header_carries_salt_and_nonce() {
    let codec = PackCodec::new(
        Sha256Hasher,
        Pbkdf2Kdf::with_iterations(32),
        AesGcmCipher,
        FlateGzip,
    );
    let bytes = codec.export_pack(&sample(), Some("pw")).expect("export");
    let header = PackHeader::parse(&bytes).expect("header");
    assert_eq!(header.kind, PackKind::Encrypted);
    assert!(header.salt.is_some());
    assert!(header.nonce.is_some());
}

#[test]
fn test_encrypted_pack_rejects_other_codec_iterations() {
    let weak = PackCodec::new(
        Sha256Hasher,
        Pbkdf2Kdf::with_iterations(32),
        AesGcmCipher,
        FlateGzip,
    );
    let bytes = weak.export_pack(&sample(), Some("pw")).expect("export");
    // Same password, different key derivation parameters.
    let result = import_pack(&bytes, || Some("pw".to_string()));
    assert!(matches!(
        result,
        Err(ImportError::Pack(PackError::WrongPassword))
    ));
}

#[test]
fn test_truncated_file_is_rejected() {
    let bytes = export_pack(&sample(), None).expect("export");
    assert!(matches!(
        import_pack(&bytes[..20], || None),
        Err(ImportError::Pack(PackError::InvalidFormat(_)))
    ));

    let mut damaged = bytes;
    let last = damaged.len() - 1;
    damaged[last] ^= 0xFF;
    assert!(matches!(
        import_pack(&damaged, || None),
        Err(ImportError::Pack(PackError::Corrupted(_)))
    ));
}

#[test]
fn test_legacy_json_with_numeric_timestamp() {
    let legacy = br#"{"version":"1.0","exportedAt":1714557600000,"prompts":[{"text":"hi","createdAt":1}]}"#;
    assert_eq!(classify(legacy), PackKind::Unknown);

    let payload = import_pack(legacy, || None).expect("legacy import");
    assert_eq!(payload.source, "chatgpt");
    assert_eq!(payload.exported_at.timestamp_millis(), 1_714_557_600_000);
    assert_eq!(payload.prompts[0].created_at, Some(1));
}
