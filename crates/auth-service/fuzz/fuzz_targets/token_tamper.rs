#![no_main]

use auth_service::crypto::codec::TokenCodec;
use auth_service::models::TokenKind;
use common::secret::SecretBox;
use libfuzzer_sys::fuzz_target;
use std::sync::OnceLock;
use std::time::Duration;
use uuid::Uuid;

fn codec() -> &'static TokenCodec {
    static CODEC: OnceLock<TokenCodec> = OnceLock::new();
    CODEC.get_or_init(|| TokenCodec::new(&SecretBox::new(Box::new(vec![0x5a; 32]))))
}

// Flip bytes of a genuine token: the result either fails to verify or
// still names the original subject and kind.
fuzz_target!(|data: &[u8]| {
    let subject = Uuid::from_u128(0x1234);
    let Ok(token) = codec().issue_at(subject, TokenKind::Refresh, Duration::from_secs(60), 1_000)
    else {
        return;
    };

    let mut bytes = token.into_bytes();
    for (i, b) in data.iter().enumerate() {
        let len = bytes.len();
        if let Some(slot) = bytes.get_mut(i % len) {
            *slot ^= b;
        }
    }

    if let Ok(tampered) = String::from_utf8(bytes) {
        if let Ok(verified) = codec().verify_at(&tampered, 1_000) {
            assert_eq!(verified.subject, subject);
            assert_eq!(verified.kind, TokenKind::Refresh);
        }
    }
});
