//! 2-bit DNA k-mer codec: packing, reverse-complement, and the
//! canonicalization used to fold a k-mer and its reverse complement onto
//! the same Bloom row set.

use crate::error::{CobsError, Result};

fn code_of(base: u8) -> Result<u8> {
    match base {
        b'A' => Ok(0),
        b'C' => Ok(1),
        b'G' => Ok(2),
        b'T' => Ok(3),
        other => Err(CobsError::input(format!(
            "non-DNA base {:?} in k-mer",
            other as char
        ))),
    }
}

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Packs `k` ASCII bases into `⌈k/4⌉` bytes, 2 bits per base, MSB-first
/// within each byte. Unused high bits of the last byte are zero.
///
/// # Examples
///
/// ```
/// use cobs::kmer::pack;
///
/// let packed = pack(b"ACGT").unwrap();
/// assert_eq!(packed, vec![0b00_01_10_11]);
/// ```
pub fn pack(bases: &[u8]) -> Result<Vec<u8>> {
    let k = bases.len();
    let mut out = vec![0u8; (k + 3) / 4];
    for (i, &base) in bases.iter().enumerate() {
        let code = code_of(base)?;
        let shift = 6 - 2 * (i % 4);
        out[i / 4] |= code << shift;
    }
    Ok(out)
}

/// Inverse of [`pack`]: expands `k` bases back to their ASCII form.
///
/// # Examples
///
/// ```
/// use cobs::kmer::{pack, unpack};
///
/// let packed = pack(b"ACGT").unwrap();
/// assert_eq!(unpack(&packed, 4), b"ACGT");
/// ```
pub fn unpack(packed: &[u8], k: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(k);
    for i in 0..k {
        let byte = packed[i / 4];
        let shift = 6 - 2 * (i % 4);
        let code = (byte >> shift) & 0x3;
        out.push(BASES[code as usize]);
    }
    out
}

/// Bitwise reverse complement of a packed k-mer: reverses base order and
/// complements each 2-bit code (`A↔T, C↔G`, i.e. XOR with `0b11`).
///
/// # Examples
///
/// ```
/// use cobs::kmer::{pack, reverse_complement, unpack};
///
/// let packed = pack(b"ACGT").unwrap();
/// let rc = reverse_complement(&packed, 4);
/// assert_eq!(unpack(&rc, 4), b"ACGT"); // ACGT is its own reverse complement
/// ```
pub fn reverse_complement(packed: &[u8], k: usize) -> Vec<u8> {
    let mut out = vec![0u8; packed.len()];
    for i in 0..k {
        let src_byte = packed[i / 4];
        let src_shift = 6 - 2 * (i % 4);
        let code = (src_byte >> src_shift) & 0x3;
        let complement = code ^ 0b11;

        let j = k - 1 - i;
        let dst_shift = 6 - 2 * (j % 4);
        out[j / 4] |= complement << dst_shift;
    }
    out
}

/// Returns the lexicographically smaller of `packed` and its reverse
/// complement, compared as the *unpacked* byte string so the ordering
/// matches the on-disk DNA ordering rather than the packed bit pattern.
///
/// Idempotent: `canonicalize(canonicalize(s)) == canonicalize(s)`.
///
/// # Examples
///
/// ```
/// use cobs::kmer::{pack, canonicalize, unpack};
///
/// let canon = canonicalize(&pack(b"TTTT").unwrap(), 4);
/// assert_eq!(unpack(&canon, 4), b"AAAA");
/// ```
pub fn canonicalize(packed: &[u8], k: usize) -> Vec<u8> {
    let rc = reverse_complement(packed, k);
    let fwd_unpacked = unpack(packed, k);
    let rc_unpacked = unpack(&rc, k);
    if rc_unpacked < fwd_unpacked {
        rc
    } else {
        packed.to_vec()
    }
}

/// Packs and, if `canonical` is set, canonicalizes `bases` in one step —
/// the form every term is hashed and stored under (spec.md §4.4).
pub fn canonical_form(bases: &[u8], canonical: bool) -> Result<Vec<u8>> {
    let packed = pack(bases)?;
    Ok(if canonical {
        canonicalize(&packed, bases.len())
    } else {
        packed
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_roundtrip() {
        let seq = b"ACGTACGTACG";
        let packed = pack(seq).unwrap();
        assert_eq!(packed.len(), (seq.len() + 3) / 4);
        assert_eq!(unpack(&packed, seq.len()), seq);
    }

    #[test]
    fn pack_rejects_non_dna() {
        assert!(pack(b"ACGN").is_err());
    }

    #[test]
    fn reverse_complement_of_palindrome_is_itself() {
        let packed = pack(b"ACGT").unwrap();
        let rc = reverse_complement(&packed, 4);
        assert_eq!(unpack(&rc, 4), b"ACGT");
    }

    #[test]
    fn reverse_complement_matches_manual() {
        let packed = pack(b"AACCGGTT").unwrap();
        let rc = reverse_complement(&packed, 8);
        assert_eq!(unpack(&rc, 8), b"AACCGGTT");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let packed = pack(b"GATTACA").unwrap();
        let once = canonicalize(&packed, 7);
        let twice = canonicalize(&once, 7);
        assert_eq!(once, twice);
    }

    #[test]
    fn canonicalize_of_rc_matches_canonicalize() {
        let packed = pack(b"GATTACA").unwrap();
        let rc = reverse_complement(&packed, 7);
        assert_eq!(canonicalize(&packed, 7), canonicalize(&rc, 7));
    }

    #[test]
    fn canonicalize_picks_lexicographically_smaller_unpacked_form() {
        let fwd = pack(b"TTTT").unwrap();
        let canon = canonicalize(&fwd, 4);
        assert_eq!(unpack(&canon, 4), b"AAAA");
    }
}
