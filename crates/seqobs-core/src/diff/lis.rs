//! Longest increasing subsequence.

/// Indices (ascending) of a longest strictly increasing subsequence of `seq`.
///
/// When several subsequences share the maximal length, the one that keeps
/// earlier elements is chosen: the scan runs from the back, so a later
/// element only wins a slot when it strictly improves on what is there.
///
/// Runs in `O(n log n)`.
pub fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    // tails[k]: index of the best head of an increasing run of length k + 1
    // among the elements scanned so far. Head values decrease with k.
    let mut tails: Vec<usize> = Vec::new();
    let mut next: Vec<Option<usize>> = vec![None; seq.len()];

    for i in (0..seq.len()).rev() {
        let value = seq[i];
        let k = tails.partition_point(|&t| seq[t] > value);
        if k > 0 {
            next[i] = Some(tails[k - 1]);
        }
        if k == tails.len() {
            tails.push(i);
        } else {
            tails[k] = i;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        result.push(i);
        cursor = next[i];
    }
    result
}
