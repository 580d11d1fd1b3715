//! Fuzzy ranking of completion candidates.

/// Similarity of `needle` and `candidate` in `0..=100`, case-insensitive.
///
/// Substring matches score highest, earlier positions first; otherwise the
/// score follows the longest in-order character match.
pub fn fuzzy_score(needle: &str, candidate: &str) -> u32 {
    let needle = needle.to_lowercase();
    let candidate = candidate.to_lowercase();
    if needle.is_empty() || candidate.is_empty() {
        return 0;
    }
    if needle == candidate {
        return 100;
    }
    let needle_len = needle.chars().count();
    let candidate_len = candidate.chars().count();
    if let Some(byte_pos) = candidate.find(&needle) {
        let pos = candidate[..byte_pos].chars().count();
        let coverage = (needle_len * 20 / candidate_len).min(19) as u32;
        return 80 + coverage.saturating_sub(pos.min(10) as u32);
    }
    let common = longest_common_subsequence(&needle, &candidate);
    ((2 * common * 79) / (needle_len + candidate_len)) as u32
}

fn longest_common_subsequence(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row = vec![0usize; b.len() + 1];
    for ca in a.chars() {
        let mut diagonal = 0;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Candidates ordered by descending score; equal scores keep input order.
pub fn scored_results<T, F>(needle: &str, candidates: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut scored: Vec<(u32, T)> = candidates
        .into_iter()
        .map(|candidate| (fuzzy_score(needle, key(&candidate)), candidate))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, candidate)| candidate).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_beats_scattered_match() {
        assert!(fuzzy_score("list", "Get From List") > fuzzy_score("list", "Log Is Silent Text"));
        assert_eq!(fuzzy_score("Log", "log"), 100);
        assert_eq!(fuzzy_score("", "log"), 0);
    }

    #[test]
    fn ranking_is_stable_for_ties() {
        let ranked = scored_results("zz", vec!["abc", "def", "zz top"], |s| s);
        assert_eq!(ranked, vec!["zz top", "abc", "def"]);
    }
}
