//! Opaque Token Codec
//!
//! Seals upstream continuation cursors and media URLs so they can be handed to
//! untrusted clients. A token is `base64url(nonce || ciphertext || tag)` under
//! XChaCha20-Poly1305; the random 24-byte nonce travels with the token, so
//! opening needs no server-side state.
//!
//! Every token is bound to a [`TokenPurpose`] through the AEAD associated
//! data. A continuation cursor cannot be opened as a media path, nor the
//! other way round.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};

use crate::error::TokenError;

/// Secret key length in bytes.
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

// == Token Purpose ==
/// What a sealed value is handed out for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenPurpose {
    /// Upstream continuation cursor, handed out as `next_token`/`previous_token`
    Cursor,
    /// Message media URL behind an `/images/` path
    Media,
    /// Call recording URL behind an `/audio/` path
    Recording,
}

impl TokenPurpose {
    fn associated_data(self) -> &'static [u8] {
        match self {
            TokenPurpose::Cursor => b"logview/cursor",
            TokenPurpose::Media => b"logview/media",
            TokenPurpose::Recording => b"logview/recording",
        }
    }
}

// == Token Codec ==
/// Authenticated encryption of opaque strings under a process-wide key.
///
/// Cheap to clone and safe to share between tasks.
#[derive(Clone)]
pub struct TokenCodec {
    cipher: XChaCha20Poly1305,
}

impl TokenCodec {
    /// Creates a codec for the given key.
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(&key)),
        }
    }

    /// Creates a codec with a freshly generated key.
    pub fn generate() -> Self {
        Self::new(Self::random_key())
    }

    /// Generates a random key from the OS RNG.
    pub fn random_key() -> [u8; KEY_LEN] {
        let generated = XChaCha20Poly1305::generate_key(&mut OsRng);
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(generated.as_slice());
        key
    }

    // == Seal ==
    /// Encrypts `cleartext` for `purpose` under a fresh nonce and returns a
    /// URL-safe token.
    pub fn seal(&self, purpose: TokenPurpose, cleartext: &str) -> Result<String, TokenError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let payload = Payload {
            msg: cleartext.as_bytes(),
            aad: purpose.associated_data(),
        };
        let ciphertext = self
            .cipher
            .encrypt(&nonce, payload)
            .map_err(|_| TokenError::Seal)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    // == Open ==
    /// Recovers the cleartext of a token produced by [`TokenCodec::seal`].
    ///
    /// Malformed input, a wrong key, tampering and a token sealed for another
    /// purpose all yield the same [`TokenError::Invalid`].
    pub fn open(&self, purpose: TokenPurpose, token: &str) -> Result<String, TokenError> {
        let sealed = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(|_| TokenError::Invalid)?;
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(TokenError::Invalid);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let cleartext = self
            .cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: purpose.associated_data(),
                },
            )
            .map_err(|_| TokenError::Invalid)?;
        String::from_utf8(cleartext).map_err(|_| TokenError::Invalid)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CURSOR: TokenPurpose = TokenPurpose::Cursor;

    const NEXT_PAGE: &str =
        "https://api.example.com/2010-04-01/Accounts/AC123/Messages.json?PageSize=50&Page=1&PageToken=PASM456";

    #[test]
    fn test_seal_and_open() {
        let codec = TokenCodec::generate();
        let token = codec.seal(CURSOR, NEXT_PAGE).unwrap();

        assert_ne!(token, NEXT_PAGE);
        assert!(!token.contains("api.example.com"));
        assert_eq!(codec.open(CURSOR, &token).unwrap(), NEXT_PAGE);
    }

    #[test]
    fn test_token_is_url_safe() {
        let codec = TokenCodec::generate();
        let token = codec.seal(CURSOR, NEXT_PAGE).unwrap();

        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let codec = TokenCodec::generate();
        let first = codec.seal(CURSOR, NEXT_PAGE).unwrap();
        let second = codec.seal(CURSOR, NEXT_PAGE).unwrap();

        assert_ne!(first, second);
        assert_eq!(codec.open(CURSOR, &first).unwrap(), codec.open(CURSOR, &second).unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealer = TokenCodec::new([1u8; KEY_LEN]);
        let opener = TokenCodec::new([2u8; KEY_LEN]);
        let token = sealer.seal(CURSOR, NEXT_PAGE).unwrap();

        assert_eq!(opener.open(CURSOR, &token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_malformed_tokens_fail() {
        let codec = TokenCodec::generate();

        assert_eq!(codec.open(CURSOR, ""), Err(TokenError::Invalid));
        assert_eq!(codec.open(CURSOR, "not+base64/url"), Err(TokenError::Invalid));
        assert_eq!(codec.open(CURSOR, "c2hvcnQ"), Err(TokenError::Invalid));
    }

    #[test]
    fn test_swapped_nonce_fails() {
        let codec = TokenCodec::generate();
        let first = URL_SAFE_NO_PAD.decode(codec.seal(CURSOR, NEXT_PAGE).unwrap()).unwrap();
        let second = URL_SAFE_NO_PAD.decode(codec.seal(CURSOR, NEXT_PAGE).unwrap()).unwrap();

        let mut spliced = second[..NONCE_LEN].to_vec();
        spliced.extend_from_slice(&first[NONCE_LEN..]);

        assert_eq!(
            codec.open(CURSOR, &URL_SAFE_NO_PAD.encode(spliced)),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_token_only_opens_for_its_purpose() {
        let codec = TokenCodec::generate();
        let cursor = codec.seal(TokenPurpose::Cursor, NEXT_PAGE).unwrap();
        let media = codec
            .seal(TokenPurpose::Media, "https://media.example.com/ME1")
            .unwrap();

        assert_eq!(codec.open(TokenPurpose::Media, &cursor), Err(TokenError::Invalid));
        assert_eq!(codec.open(TokenPurpose::Recording, &cursor), Err(TokenError::Invalid));
        assert_eq!(codec.open(TokenPurpose::Cursor, &media), Err(TokenError::Invalid));
        assert_eq!(
            codec.open(TokenPurpose::Media, &media).unwrap(),
            "https://media.example.com/ME1"
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let codec = TokenCodec::new([9u8; KEY_LEN]);
        assert_eq!(format!("{:?}", codec), "TokenCodec { .. }");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_open_inverts_seal(cleartext in ".*") {
            let codec = TokenCodec::new([3u8; KEY_LEN]);
            let token = codec.seal(CURSOR, &cleartext).unwrap();
            prop_assert_eq!(codec.open(CURSOR, &token).unwrap(), cleartext);
        }

        #[test]
        fn prop_flipped_byte_is_rejected(
            cleartext in "[ -~]{0,200}",
            position in any::<prop::sample::Index>(),
            mask in 1u8..=255,
        ) {
            let codec = TokenCodec::new([4u8; KEY_LEN]);
            let mut sealed = URL_SAFE_NO_PAD.decode(codec.seal(CURSOR, &cleartext).unwrap()).unwrap();
            let index = position.index(sealed.len());
            sealed[index] ^= mask;

            prop_assert_eq!(
                codec.open(CURSOR, &URL_SAFE_NO_PAD.encode(&sealed)),
                Err(TokenError::Invalid)
            );
        }

        #[test]
        fn prop_mutated_character_is_rejected(
            position in any::<prop::sample::Index>(),
            replacement in "[A-Za-z0-9_-]",
        ) {
            let codec = TokenCodec::new([5u8; KEY_LEN]);
            let token = codec.seal(CURSOR, NEXT_PAGE).unwrap();
            let index = position.index(token.len());
            prop_assume!(token[index..index + 1] != replacement);

            let mut mutated = token.clone();
            mutated.replace_range(index..index + 1, &replacement);

            prop_assert_eq!(codec.open(CURSOR, &mutated), Err(TokenError::Invalid));
        }
    }
}
