//! MIDI variable-length quantities

use crate::error::{Error, Result};

/// Append the variable-length encoding of `value` to `buf`
pub fn write(buf: &mut Vec<u8>, value: u64) {
    let mut groups = [0u8; 10];
    let mut count = 0;
    let mut rest = value;

    loop {
        groups[count] = (rest & 0x7F) as u8;
        count += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }

    // Most significant group first; every group but the last carries 0x80
    for i in (0..count).rev() {
        let cont = if i == 0 { 0x00 } else { 0x80 };
        buf.push(groups[i] | cont);
    }
}

/// Encode a value as a variable-length quantity
pub fn encode(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4);
    write(&mut buf, value);
    buf
}

/// Decode a variable-length quantity starting at `offset`
///
/// Returns the value and the number of bytes consumed.
pub fn decode(bytes: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut value = 0u64;
    let mut pos = offset;

    loop {
        let byte = *bytes.get(pos).ok_or(Error::MalformedVlq { offset })?;
        value = (value << 7) | u64::from(byte & 0x7F);
        pos += 1;
        if byte & 0x80 == 0 {
            return Ok((value, pos - offset));
        }
    }
}
