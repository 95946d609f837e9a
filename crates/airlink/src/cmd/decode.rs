use airlink_frame::{CTRL_CHANNEL, DELIMITER};
use airlink_proto::reply;

use crate::cmd::DecodeArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS};

/// Decode a hex dump captured off the wire.
///
/// A byte string wrapped in delimiters is treated as a complete frame; bare
/// bytes are treated as a control envelope.
pub fn run(args: DecodeArgs) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;

    if bytes.first() == Some(&DELIMITER) {
        decode_frame(&bytes)?;
    } else {
        decode_envelope(&bytes)?;
    }
    Ok(SUCCESS)
}

fn decode_frame(bytes: &[u8]) -> CliResult<()> {
    if bytes.len() < 4 || bytes.last() != Some(&DELIMITER) {
        return Err(CliError::new(DATA_INVALID, "incomplete frame"));
    }
    let ch = bytes[1] >> 4;
    let len = usize::from(bytes[1] & 0x0F) << 8 | usize::from(bytes[2]);
    let payload = &bytes[3..bytes.len() - 1];
    if payload.len() != len {
        return Err(CliError::new(
            DATA_INVALID,
            format!("length field says {len}, frame carries {}", payload.len()),
        ));
    }

    println!("frame: channel {ch}, {len} payload byte(s)");
    if ch == CTRL_CHANNEL {
        decode_envelope(payload)?;
    } else {
        println!("payload: {}", to_hex(payload));
    }
    Ok(())
}

fn decode_envelope(bytes: &[u8]) -> CliResult<()> {
    let (op, payload) =
        reply::header(bytes).map_err(|err| CliError::new(DATA_INVALID, err.to_string()))?;
    println!("envelope: {op:?} ({}), {} payload byte(s)", op.code(), payload.len());
    if !payload.is_empty() {
        println!("payload: {}", to_hex(payload));
    }
    Ok(())
}

fn parse_hex(text: &str) -> CliResult<Vec<u8>> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let cleaned = cleaned.strip_prefix("0x").unwrap_or(&cleaned);
    if cleaned.len() % 2 != 0 {
        return Err(CliError::new(DATA_INVALID, "odd number of hex digits"));
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .map_err(|_| CliError::new(DATA_INVALID, format!("bad hex at offset {i}")))
        })
        .collect()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_prefixed_hex() {
        assert_eq!(parse_hex("7e00").unwrap(), [0x7E, 0x00]);
        assert_eq!(parse_hex("0x7E00").unwrap(), [0x7E, 0x00]);
        assert_eq!(parse_hex("7e 00 01").unwrap(), [0x7E, 0x00, 0x01]);
    }

    #[test]
    fn rejects_odd_length() {
        assert!(parse_hex("7e0").is_err());
    }

    #[test]
    fn decodes_version_request_frame() {
        let args = DecodeArgs {
            hex: "7e0004000100007e".into(),
        };
        assert_eq!(run(args).unwrap(), SUCCESS);
    }

    #[test]
    fn rejects_length_mismatch() {
        let args = DecodeArgs {
            hex: "7e0005000100007e".into(),
        };
        assert!(run(args).is_err());
    }
}
