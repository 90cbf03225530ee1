//! Column "expand-and-add" popcount: turns each AND-ed row byte into
//! eight per-column `0`/`1` contributions and accumulates them into a
//! `u16` score array (spec.md §4.9 step 5, §9 "SIMD").

/// `EXPAND_TABLE[b]` holds, for byte `b`, the eight `u16` values (`0` or
/// `1`) for each of its 8 columns, MSB first — matching the bit order
/// [`crate::bitmap::Bitmap::set`] uses.
static EXPAND_TABLE: [[u16; 8]; 256] = build_expand_table();

const fn build_expand_table() -> [[u16; 8]; 256] {
    let mut table = [[0u16; 8]; 256];
    let mut b = 0usize;
    while b < 256 {
        let mut bit = 0usize;
        while bit < 8 {
            let shift = 7 - bit;
            table[b][bit] = ((b >> shift) & 1) as u16;
            bit += 1;
        }
        b += 1;
    }
    table
}

/// Adds byte `b`'s eight column contributions into `scores[col_offset..
/// col_offset + 8]`. Scalar portable path: two 64-bit adds over a
/// 4-entry-wide `u16` lookup, safe on every target.
#[inline]
pub fn expand_add_scalar(scores: &mut [u16], col_offset: usize, b: u8) {
    let row = &EXPAND_TABLE[b as usize];
    for i in 0..8 {
        scores[col_offset + i] += row[i];
    }
}

/// Adds every byte of `bytes` (one row slice, already AND-ed across hash
/// functions) into `scores`, dispatching to a SIMD path when available.
pub fn expand_add_row(scores: &mut [u16], bytes: &[u8]) {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("sse2") {
            unsafe { expand_add_row_sse2(scores, bytes) };
            return;
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        if std::arch::is_aarch64_feature_detected!("neon") {
            unsafe { expand_add_row_neon(scores, bytes) };
            return;
        }
    }
    expand_add_row_scalar(scores, bytes);
}

pub fn expand_add_row_scalar(scores: &mut [u16], bytes: &[u8]) {
    for (i, &b) in bytes.iter().enumerate() {
        expand_add_scalar(scores, i * 8, b);
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn expand_add_row_sse2(scores: &mut [u16], bytes: &[u8]) {
    use std::arch::x86_64::{_mm_add_epi16, _mm_loadu_si128, _mm_storeu_si128};

    for (i, &b) in bytes.iter().enumerate() {
        let col_offset = i * 8;
        let row = &EXPAND_TABLE[b as usize];
        let add = _mm_loadu_si128(row.as_ptr() as *const _);
        let dst_ptr = scores.as_mut_ptr().add(col_offset) as *mut _;
        let cur = _mm_loadu_si128(dst_ptr as *const _);
        let sum = _mm_add_epi16(cur, add);
        _mm_storeu_si128(dst_ptr, sum);
    }
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn expand_add_row_neon(scores: &mut [u16], bytes: &[u8]) {
    use std::arch::aarch64::{vaddq_u16, vld1q_u16, vst1q_u16};

    for (i, &b) in bytes.iter().enumerate() {
        let col_offset = i * 8;
        let row = &EXPAND_TABLE[b as usize];
        let add = vld1q_u16(row.as_ptr());
        let dst_ptr = scores.as_mut_ptr().add(col_offset);
        let cur = vld1q_u16(dst_ptr);
        let sum = vaddq_u16(cur, add);
        vst1q_u16(dst_ptr, sum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_and_dispatched_paths_agree() {
        let bytes: Vec<u8> = (0..=255u8).collect();
        let mut scalar_scores = vec![0u16; bytes.len() * 8];
        let mut dispatched_scores = vec![0u16; bytes.len() * 8];

        expand_add_row_scalar(&mut scalar_scores, &bytes);
        expand_add_row(&mut dispatched_scores, &bytes);

        assert_eq!(scalar_scores, dispatched_scores);
    }

    #[test]
    fn expand_table_matches_bit_count() {
        for b in 0u16..256 {
            let expected = (b as u8).count_ones();
            let sum: u16 = EXPAND_TABLE[b as usize].iter().sum();
            assert_eq!(sum as u32, expected);
        }
    }

    #[test]
    fn byte_of_all_ones_adds_one_to_every_column() {
        let mut scores = vec![0u16; 8];
        expand_add_scalar(&mut scores, 0, 0xFF);
        assert_eq!(scores, vec![1u16; 8]);
    }
}
