use base64::alphabet::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Serializer;

/// URL-safe alphabet, no padding on output, padding optional on input.
const ENGINE: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn encode(data: impl AsRef<[u8]>) -> String {
    ENGINE.encode(data)
}

pub fn decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    ENGINE.decode(data)
}

pub(crate) fn serialize<T, S>(data: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: Serializer,
{
    serializer.serialize_str(&encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_strips_padding() {
        assert_eq!(encode("test"), "dGVzdA");
    }

    #[test]
    fn test_encode_uses_url_alphabet() {
        assert_eq!(encode([0xfb, 0xff, 0xbf]), "-_-_");
    }

    #[test]
    fn test_decode_accepts_padded_and_unpadded() {
        assert_eq!(decode("dGVzdA").unwrap(), b"test");
        assert_eq!(decode("dGVzdA==").unwrap(), b"test");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("not base64!").is_err());
    }
}
