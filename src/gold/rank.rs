//! Dense ranking within a group

use std::cmp::Ordering;

/// Sort `entries` by value descending (ties by name ascending) and assign dense ranks.
///
/// Equal values share a rank and the next distinct value gets the previous
/// rank plus one.
pub(crate) fn dense_rank_desc<T>(mut entries: Vec<(T, f64)>) -> Vec<(T, f64, i32)>
where
    T: Ord,
{
    entries.sort_by(|(a_key, a), (b_key, b)| match b.total_cmp(a) {
        Ordering::Equal => a_key.cmp(b_key),
        other => other,
    });

    let mut ranked = Vec::with_capacity(entries.len());
    let mut rank = 0;
    let mut previous: Option<f64> = None;
    for (key, value) in entries {
        if previous != Some(value) {
            rank += 1;
            previous = Some(value);
        }
        ranked.push((key, value, rank));
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranks(values: &[(&'static str, f64)]) -> Vec<(&'static str, i32)> {
        dense_rank_desc(values.to_vec())
            .into_iter()
            .map(|(key, _, rank)| (key, rank))
            .collect()
    }

    #[test]
    fn test_ties_share_rank_without_gaps() {
        let ranked = ranks(&[("P-3", 50.0), ("P-1", 80.0), ("P-2", 80.0), ("P-4", 10.0)]);
        assert_eq!(ranked, vec![("P-1", 1), ("P-2", 1), ("P-3", 2), ("P-4", 3)]);
    }

    #[test]
    fn test_single_and_empty_groups() {
        assert_eq!(ranks(&[("P-1", 5.0)]), vec![("P-1", 1)]);
        assert!(ranks(&[]).is_empty());
    }
}
