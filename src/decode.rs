use encoding_rs::{EUC_KR, UTF_8};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// The exported files come out of the inspection stations as CP949; files
/// re-saved by hand tend to be UTF-8. Try the legacy encoding first and
/// fall back once. BOM sniffing is handled by the decoder itself.
pub fn decode_payload(bytes: &[u8]) -> Result<String> {
    let (text, encoding, had_errors) = EUC_KR.decode(bytes);
    if !had_errors {
        debug!(encoding = encoding.name(), "decoded upload");
        return Ok(text.into_owned());
    }

    debug!("upload is not valid CP949, retrying as UTF-8");
    let (text, encoding, had_errors) = UTF_8.decode(bytes);
    if !had_errors {
        debug!(encoding = encoding.name(), "decoded upload");
        return Ok(text.into_owned());
    }

    Err(PipelineError::Decode {
        primary: "CP949",
        fallback: "UTF-8",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_cp949_payload() {
        let text = "지표,250908\n총 테스트 수,4157\n";
        let (bytes, _, _) = EUC_KR.encode(text);
        assert_eq!(decode_payload(&bytes).unwrap(), text);
    }

    #[test]
    fn falls_back_to_utf8() {
        let text = "지표,250908\nPASS,3944\n";
        assert_eq!(decode_payload(text.as_bytes()).unwrap(), text);
    }

    #[test]
    fn plain_ascii_decodes_either_way() {
        let text = "metric,250908\nPASS,3944\n";
        assert_eq!(decode_payload(text.as_bytes()).unwrap(), text);
    }

    #[test]
    fn undecodable_bytes_are_reported() {
        let err = decode_payload(&[0xff, 0xfe, 0xff]).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }
}
