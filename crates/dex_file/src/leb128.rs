// https://source.android.com/docs/core/runtime/dex-format#leb128

/// Decodes an unsigned LEB128 value starting at `pos`, returning the value and the position just
/// past its last byte.
///
/// At most five bytes are consumed. Bits beyond the 32nd are dropped, as the dex format never
/// encodes wider values.
///
/// # Panics
///
/// Panics if the encoding runs past the end of `data`. Class data is expected to have been
/// verified before it is decoded.
#[inline]
pub fn decode_unsigned_leb128(data: &[u8], pos: usize) -> (u32, usize) {
    let mut result = 0u32;
    let mut pos = pos;

    for shift in (0..35).step_by(7) {
        let byte = data[pos];
        pos += 1;
        result |= ((byte & 0x7f) as u32).wrapping_shl(shift);
        if byte & 0x80 == 0 {
            break;
        }
    }

    (result, pos)
}

/// Like [`decode_unsigned_leb128`], but returns `None` instead of panicking when the encoding runs
/// past the end of `data`.
pub fn try_decode_unsigned_leb128(data: &[u8], pos: usize) -> Option<(u32, usize)> {
    let mut result = 0u32;
    let mut pos = pos;

    for shift in (0..35).step_by(7) {
        let byte = *data.get(pos)?;
        pos += 1;
        result |= ((byte & 0x7f) as u32).wrapping_shl(shift);
        if byte & 0x80 == 0 {
            break;
        }
    }

    Some((result, pos))
}

/// Number of bytes the shortest encoding of `value` occupies.
pub fn unsigned_leb128_size(value: u32) -> usize {
    let mut size = 1;
    let mut value = value >> 7;
    while value != 0 {
        size += 1;
        value >>= 7;
    }
    size
}

pub fn encode_unsigned_leb128(out: &mut Vec<u8>, value: u32) {
    let mut value = value;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Overwrites the LEB128 value at `pos` with `value`, keeping the original encoded length.
///
/// When the new value needs fewer bytes, the tail is filled with redundant `0x80`/`0x00`
/// continuation bytes so every following byte stays where it was. Returns the length of the
/// rewritten encoding.
///
/// # Panics
///
/// Panics if `value` needs more bytes than the value it replaces.
pub fn update_unsigned_leb128(data: &mut [u8], pos: usize, value: u32) -> usize {
    let (_, old_end) = decode_unsigned_leb128(data, pos);
    let old_len = old_end - pos;
    assert!(
        unsigned_leb128_size(value) <= old_len,
        "LEB128 value 0x{value:X} does not fit in {old_len} byte(s)"
    );

    let mut value = value;
    for (i, byte) in data[pos..old_end].iter_mut().enumerate() {
        let last = i + 1 == old_len;
        *byte = (value & 0x7f) as u8 | if last { 0 } else { 0x80 };
        value >>= 7;
    }

    old_len
}

#[cfg(test)]
mod decode_unsigned_leb128_tests {
    use super::*;

    #[test]
    fn it_should_decode_a_single_byte_value() {
        assert_eq!(decode_unsigned_leb128(&[0x7f, 0xff], 0), (0x7f, 1));
    }

    #[test]
    fn it_should_decode_a_multi_byte_value_from_an_offset() {
        assert_eq!(decode_unsigned_leb128(&[0x00, 0x80, 0x7f], 1), (0x3f80, 3));
        assert_eq!(
            decode_unsigned_leb128(&[0xff, 0xff, 0xff, 0xff, 0x0f], 0),
            (0xffff_ffff, 5)
        );
    }

    #[test]
    fn it_should_accept_padded_encodings() {
        assert_eq!(decode_unsigned_leb128(&[0x81, 0x80, 0x00], 0), (1, 3));
    }

    #[test]
    #[should_panic]
    fn it_should_panic_on_a_truncated_encoding() {
        decode_unsigned_leb128(&[0x80, 0x80], 0);
    }
}

#[cfg(test)]
mod try_decode_unsigned_leb128_tests {
    use super::*;

    #[test]
    fn it_should_agree_with_the_panicking_decoder() {
        let data = [0x00, 0x80, 0x7f, 0x05];
        assert_eq!(try_decode_unsigned_leb128(&data, 1), Some((0x3f80, 3)));
        assert_eq!(try_decode_unsigned_leb128(&data, 3), Some((0x05, 4)));
    }

    #[test]
    fn it_should_return_none_on_a_truncated_encoding() {
        assert_eq!(try_decode_unsigned_leb128(&[0x80, 0x80], 0), None);
        assert_eq!(try_decode_unsigned_leb128(&[0x01], 1), None);
    }
}

#[cfg(test)]
mod encode_unsigned_leb128_tests {
    use super::*;

    #[test]
    fn it_should_use_the_shortest_encoding() {
        let mut out = Vec::new();
        encode_unsigned_leb128(&mut out, 0);
        encode_unsigned_leb128(&mut out, 0x80);
        encode_unsigned_leb128(&mut out, 0x0010_0000);
        assert_eq!(out, [0x00, 0x80, 0x01, 0x80, 0x80, 0x40]);
    }

    #[test]
    fn it_should_agree_with_the_size_computation() {
        for value in [0, 0x7f, 0x80, 0x3fff, 0x4000, 0x0fff_ffff, 0x1000_0000, u32::MAX] {
            let mut out = Vec::new();
            encode_unsigned_leb128(&mut out, value);
            assert_eq!(out.len(), unsigned_leb128_size(value), "value 0x{value:X}");
        }
    }
}

#[cfg(test)]
mod update_unsigned_leb128_tests {
    use super::*;

    #[test]
    fn it_should_keep_the_original_length_when_the_value_shrinks() {
        let mut data = [0xaa, 0x81, 0x04, 0xbb];
        assert_eq!(update_unsigned_leb128(&mut data, 1, 0x01), 2);
        assert_eq!(data, [0xaa, 0x81, 0x00, 0xbb]);
        assert_eq!(decode_unsigned_leb128(&data, 1), (0x01, 3));
    }

    #[test]
    fn it_should_rewrite_a_value_of_equal_width() {
        let mut data = [0x06];
        update_unsigned_leb128(&mut data, 0, 0x01);
        assert_eq!(data, [0x01]);
    }

    #[test]
    #[should_panic]
    fn it_should_refuse_to_grow_an_encoding() {
        let mut data = [0x01, 0x00];
        update_unsigned_leb128(&mut data, 0, 0x80);
    }
}
