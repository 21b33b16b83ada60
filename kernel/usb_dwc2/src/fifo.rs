//! Byte/word conversion for the channel FIFOs.
//!
//! The FIFOs are only accessible 32 bits at a time. Bytes map onto words
//! little-endian first: byte `4n` is the low byte of word `n`. A trailing
//! partial word is padded with zero bytes on the way in, and the extra
//! bytes of a partial word are dropped on the way out.

/// Number of FIFO words occupied by `len` bytes.
pub const fn words_for(len: usize) -> usize {
    (len + 3) / 4
}

/// Splits `bytes` into FIFO words, zero-padding the last one.
pub fn pack_words(bytes: &[u8]) -> impl Iterator<Item = u32> + '_ {
    bytes.chunks(4).map(|chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        u32::from_le_bytes(word)
    })
}

/// Copies up to 4 bytes of `word` into the front of `out`.
///
/// Returns how many bytes were stored.
pub fn unpack_word(word: u32, out: &mut [u8]) -> usize {
    let n = out.len().min(4);
    out[..n].copy_from_slice(&word.to_le_bytes()[..n]);
    n
}
