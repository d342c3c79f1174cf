//! Wire encoding of text and hex protocol messages.

use rand::Rng;

/// Label of the trailing checksum field of a text message.
const CHECKSUM_LABEL: &str = "Checksum";

/// Encode one text protocol message.
///
/// Each field is sent as `\r\n<label>\t<value>`. The message ends with a
/// checksum field whose byte makes the sum of all message bytes 0 modulo 256.
pub fn text_message<'a, I>(fields: I) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = Vec::new();
    for (label, value) in fields {
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(label.as_bytes());
        out.push(b'\t');
        out.extend_from_slice(value.as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(CHECKSUM_LABEL.as_bytes());
    out.push(b'\t');
    let check = checksum_byte(&out);
    out.push(check);
    out
}

pub fn checksum_byte(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0u8.wrapping_sub(sum)
}

/// Answer to a hex protocol request for `register`.
pub fn hex_response(register: &str, value: &str) -> String {
    format!(":{register}{value}\n")
}

/// Flip every bit of `bytes` independently with probability `rate`.
///
/// Returns the number of flipped bits.
pub fn inject_bit_errors<R: Rng>(bytes: &mut [u8], rate: f64, rng: &mut R) -> usize {
    if rate <= 0.0 {
        return 0;
    }
    let rate = rate.min(1.0);
    let mut flipped = 0;
    for byte in bytes.iter_mut() {
        for bit in 0..8 {
            if rng.gen_bool(rate) {
                *byte ^= 1 << bit;
                flipped += 1;
            }
        }
    }
    flipped
}
