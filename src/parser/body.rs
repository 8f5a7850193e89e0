//! Transport decoding for Gmail payloads: base64url and text charsets.

use base64::alphabet::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::Result;

/// Gmail emits base64url both with and without `=` padding.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a base64url payload into raw bytes.
///
/// ASCII whitespace is ignored, since some proxies wrap long payloads.
pub fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    if data.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        return Ok(BASE64URL.decode(compact)?);
    }
    Ok(BASE64URL.decode(data)?)
}

/// Decode an inline text body.
///
/// Returns `None` when the base64url layer is malformed or the bytes are not
/// valid in the declared charset (UTF-8 when none is declared or the label is
/// unknown).
pub fn decode_text(data: &str, charset: Option<&str>) -> Option<String> {
    let bytes = match decode_base64url(data) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to decode inline body");
            return None;
        }
    };

    let encoding = charset
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);

    match encoding.decode_without_bom_handling_and_without_replacement(&bytes) {
        Some(text) => Some(text.into_owned()),
        None => {
            tracing::debug!(charset = encoding.name(), "Inline body is not valid text");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_unpadded_and_padded() {
        // "Hi!?" encodes to "SGkhPw" / "SGkhPw==".
        assert_eq!(decode_base64url("SGkhPw").unwrap(), b"Hi!?");
        assert_eq!(decode_base64url("SGkhPw==").unwrap(), b"Hi!?");
    }

    #[test]
    fn test_decode_url_safe_alphabet() {
        // 0xfb 0xff encodes to "-_8" in the URL-safe alphabet.
        assert_eq!(decode_base64url("-_8").unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn test_decode_ignores_whitespace() {
        assert_eq!(decode_base64url("SGVs\nbG8=").unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_invalid_is_error() {
        assert!(decode_base64url("!!!invalid!!!").is_err());
    }

    #[test]
    fn test_decode_text_utf8() {
        // "Café"
        assert_eq!(decode_text("Q2Fmw6k", None).as_deref(), Some("Café"));
    }

    #[test]
    fn test_decode_text_latin1_charset() {
        // "Café" in ISO-8859-1 is 43 61 66 E9.
        assert_eq!(
            decode_text("Q2Fm6Q", Some("iso-8859-1")).as_deref(),
            Some("Café")
        );
    }

    #[test]
    fn test_decode_text_invalid_utf8_is_none() {
        // 0xC3 0x28 is an invalid UTF-8 sequence.
        assert_eq!(decode_text("wyg", None), None);
    }

    #[test]
    fn test_decode_text_bad_base64_is_none() {
        assert_eq!(decode_text("%%%", None), None);
    }
}
