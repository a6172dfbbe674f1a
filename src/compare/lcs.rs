//! Longest-common-subsequence alignment.
//!
//! [`align`] matches equal keys: it trims the common prefix and suffix,
//! solves small middles with a dynamic-programming table and splits large
//! middles at patience anchors (keys unique on both sides). [`align_by`]
//! runs the table directly with an arbitrary pairing predicate.
//!
//! Ties in the table are broken on content, not on position, so aligning
//! `(b, a)` yields the mirror image of aligning `(a, b)`.
use crate::common::CancellationToken;
use crate::error::Result;
use std::collections::HashMap;
use std::hash::Hash;

/// Largest `n * m` solved with the table.
pub const DP_CELL_BUDGET: usize = 4_000_000;

/// Matched index pairs, strictly increasing on both sides.
pub type Matches = Vec<(usize, usize)>;

/// Align two sequences on key equality.
pub fn align<K: Eq + Hash + Ord>(a: &[K], b: &[K], cancel: &CancellationToken) -> Result<Matches> {
    let mut matches = Matches::new();
    align_into(a, b, 0, 0, cancel, &mut matches)?;
    Ok(matches)
}

fn align_into<K: Eq + Hash + Ord>(
    a: &[K],
    b: &[K],
    a_base: usize,
    b_base: usize,
    cancel: &CancellationToken,
    out: &mut Matches,
) -> Result<()> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    out.extend((0..prefix).map(|k| (a_base + k, b_base + k)));

    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];
    let (a_mid_base, b_mid_base) = (a_base + prefix, b_base + prefix);
    if !a_mid.is_empty() && !b_mid.is_empty() {
        if a_mid.len().saturating_mul(b_mid.len()) <= DP_CELL_BUDGET {
            let middle = align_by(
                a_mid.len(),
                b_mid.len(),
                |i, j| a_mid[i] == b_mid[j],
                |i, j| a_mid[i] < b_mid[j],
                cancel,
            )?;
            out.extend(
                middle
                    .into_iter()
                    .map(|(i, j)| (a_mid_base + i, b_mid_base + j)),
            );
        } else {
            align_patience(a_mid, b_mid, a_mid_base, b_mid_base, cancel, out)?;
        }
    }

    let (a_tail, b_tail) = (a.len() - suffix, b.len() - suffix);
    out.extend((0..suffix).map(|k| (a_base + a_tail + k, b_base + b_tail + k)));
    Ok(())
}

/// Split at keys that occur exactly once on each side, then recurse into
/// the gaps. Gaps without anchors that are still too large stay unmatched.
fn align_patience<K: Eq + Hash + Ord>(
    a: &[K],
    b: &[K],
    a_base: usize,
    b_base: usize,
    cancel: &CancellationToken,
    out: &mut Matches,
) -> Result<()> {
    cancel.check()?;

    // key -> (count in a, index in a, count in b, index in b)
    let mut counts: HashMap<&K, (usize, usize, usize, usize)> = HashMap::new();
    for (i, key) in a.iter().enumerate() {
        let entry = counts.entry(key).or_insert((0, i, 0, 0));
        entry.0 += 1;
    }
    for (j, key) in b.iter().enumerate() {
        if let Some(entry) = counts.get_mut(key) {
            entry.2 += 1;
            entry.3 = j;
        }
    }
    let mut unique: Vec<(usize, usize)> = counts
        .values()
        .filter(|(ca, _, cb, _)| *ca == 1 && *cb == 1)
        .map(|&(_, i, _, j)| (i, j))
        .collect();
    unique.sort_unstable();

    let anchors = longest_increasing(&unique);
    if anchors.is_empty() {
        tracing::debug!(
            left = a.len(),
            right = b.len(),
            "no unique anchors in oversized gap; leaving it unaligned"
        );
        return Ok(());
    }

    let (mut ai, mut bj) = (0, 0);
    for (i, j) in anchors {
        align_into(&a[ai..i], &b[bj..j], a_base + ai, b_base + bj, cancel, out)?;
        out.push((a_base + i, b_base + j));
        ai = i + 1;
        bj = j + 1;
    }
    align_into(&a[ai..], &b[bj..], a_base + ai, b_base + bj, cancel, out)
}

/// Longest subsequence of `pairs` (sorted by first index) that is also
/// increasing in the second index. Patience sorting, O(k log k).
fn longest_increasing(pairs: &[(usize, usize)]) -> Matches {
    // tails[len] = index into pairs of the smallest tail of an increasing
    // subsequence of length len + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; pairs.len()];
    for (k, &(_, j)) in pairs.iter().enumerate() {
        let pos = tails.partition_point(|&t| pairs[t].1 < j);
        if pos > 0 {
            prev[k] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(k);
        } else {
            tails[pos] = k;
        }
    }

    let mut result = Matches::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(k) = cursor {
        result.push(pairs[k]);
        cursor = prev[k];
    }
    result.reverse();
    result
}

/// LCS over index spaces `0..n` and `0..m` with a pairing predicate.
///
/// When skipping either side is equally good, `skip_a(i, j)` decides; it
/// must be antisymmetric in its arguments for mirrored results. Problems
/// over [`DP_CELL_BUDGET`] return no matches.
pub fn align_by<M, S>(
    n: usize,
    m: usize,
    matches: M,
    skip_a: S,
    cancel: &CancellationToken,
) -> Result<Matches>
where
    M: Fn(usize, usize) -> bool,
    S: Fn(usize, usize) -> bool,
{
    if n == 0 || m == 0 {
        return Ok(Matches::new());
    }
    if n.saturating_mul(m) > DP_CELL_BUDGET {
        tracing::debug!(n, m, "alignment table over budget; skipping");
        return Ok(Matches::new());
    }

    // table[i * width + j] = LCS length of suffixes a[i..], b[j..]
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        cancel.check()?;
        for j in (0..m).rev() {
            table[i * width + j] = if matches(i, j) {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut result = Matches::with_capacity(table[0] as usize);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if matches(i, j) {
            result.push((i, j));
            i += 1;
            j += 1;
            continue;
        }
        let down = table[(i + 1) * width + j];
        let right = table[i * width + j + 1];
        if down > right || (down == right && skip_a(i, j)) {
            i += 1;
        } else {
            j += 1;
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lcs_len(a: &[u8], b: &[u8]) -> usize {
        let token = CancellationToken::new();
        align_by(a.len(), b.len(), |i, j| a[i] == b[j], |_, _| true, &token)
            .unwrap()
            .len()
    }

    #[test]
    fn test_simple_alignment() {
        let a = ["Hello ", "world"];
        let b = ["Hello ", "brave ", "world"];
        let matches = align(&a, &b, &CancellationToken::new()).unwrap();
        assert_eq!(matches, vec![(0, 0), (1, 2)]);
    }

    #[test]
    fn test_mirror_tie_break() {
        let a = ["x", "y"];
        let b = ["y", "x"];
        let token = CancellationToken::new();
        let forward = align(&a, &b, &token).unwrap();
        let backward = align(&b, &a, &token).unwrap();
        let mirrored: Matches = backward.iter().map(|&(i, j)| (j, i)).collect();
        assert_eq!(forward.len(), 1);
        assert_eq!(forward, mirrored);
    }

    #[test]
    fn test_longest_increasing() {
        let pairs = [(0, 3), (1, 0), (2, 1), (3, 4), (4, 2)];
        assert_eq!(longest_increasing(&pairs), vec![(1, 0), (2, 1), (4, 2)]);
        assert!(longest_increasing(&[]).is_empty());
    }

    #[test]
    fn test_patience_on_large_input() {
        // 3000 x 3000 exceeds the table budget only with the middle kept
        let a: Vec<u32> = (0..3000).collect();
        let mut b = a.clone();
        b.swap(10, 2990);
        let matches = align(&a, &b, &CancellationToken::new()).unwrap();
        assert_eq!(matches.len(), 2998);
        assert!(matches.windows(2).all(|w| w[0].0 < w[1].0 && w[0].1 < w[1].1));
    }

    #[test]
    fn test_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let a = [1, 2, 3];
        let b = [3, 2, 1];
        assert!(align(&a, &b, &token).is_err());
    }

    proptest! {
        #[test]
        fn prop_align_is_optimal_and_increasing(
            a in proptest::collection::vec(0u8..4, 0..24),
            b in proptest::collection::vec(0u8..4, 0..24),
        ) {
            let matches = align(&a, &b, &CancellationToken::new()).unwrap();
            prop_assert_eq!(matches.len(), lcs_len(&a, &b));
            for &(i, j) in &matches {
                prop_assert_eq!(a[i], b[j]);
            }
            prop_assert!(matches.windows(2).all(|w| w[0].0 < w[1].0 && w[0].1 < w[1].1));
        }
    }
}
