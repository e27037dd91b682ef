//! Splitting strings into bounded fragments and joining them back.
//!
//! Fragments are bounded in UTF-8 bytes, because remote stores limit value
//! length in bytes, and never cut a character in half. A single character
//! wider than the budget becomes a fragment of its own.
//! `join(split(s, n)) == s` for every `s` and every `n >= 1`; the empty string
//! splits into zero fragments.

use std::num::NonZeroUsize;

/// Split `s` into ordered fragments of at most `max_fragment_size` bytes.
pub fn split(s: &str, max_fragment_size: NonZeroUsize) -> Vec<String> {
    boundaries(s, max_fragment_size)
        .windows(2)
        .map(|w| s[w[0]..w[1]].to_string())
        .collect()
}

/// Fragment start offsets followed by `s.len()`; a single `0` for "".
fn boundaries(s: &str, max_fragment_size: NonZeroUsize) -> Vec<usize> {
    let max = max_fragment_size.get();
    let mut cuts = Vec::with_capacity(s.len() / max + 2);
    let mut start = 0;
    cuts.push(0);

    for (idx, ch) in s.char_indices() {
        if idx > start && idx + ch.len_utf8() - start > max {
            cuts.push(idx);
            start = idx;
        }
    }

    if start < s.len() {
        cuts.push(s.len());
    }
    cuts
}

/// Concatenate fragments in order.
pub fn join<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fragments.into_iter().fold(String::new(), |mut acc, f| {
        acc.push_str(f.as_ref());
        acc
    })
}

/// Number of fragments `split` would produce.
pub fn fragment_count(s: &str, max_fragment_size: NonZeroUsize) -> usize {
    boundaries(s, max_fragment_size).len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn n(v: usize) -> NonZeroUsize {
        NonZeroUsize::new(v).unwrap()
    }

    #[test]
    fn empty_string_has_no_fragments() {
        assert!(split("", n(5)).is_empty());
        assert_eq!(join(Vec::<String>::new()), "");
        assert_eq!(fragment_count("", n(5)), 0);
    }

    #[test]
    fn exact_multiple() {
        let parts = split("abcdef", n(3));
        assert_eq!(parts, vec!["abc", "def"]);
    }

    #[test]
    fn remainder_goes_last() {
        let parts = split("abcdefg", n(3));
        assert_eq!(parts, vec!["abc", "def", "g"]);
        assert_eq!(fragment_count("abcdefg", n(3)), 3);
    }

    #[test]
    fn size_one() {
        let parts = split("héllo", n(1));
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[1], "é");
    }

    #[test]
    fn budget_is_in_bytes() {
        let parts = split("кошка", n(4));
        assert_eq!(parts, vec!["ко", "шк", "а"]);
        assert_eq!(fragment_count("кошка", n(4)), 3);
        assert_eq!(split("aкb", n(2)), vec!["a", "к", "b"]);
    }

    #[test]
    fn larger_than_input() {
        assert_eq!(split("abc", n(2500)), vec!["abc"]);
    }

    #[test]
    fn never_splits_inside_a_character() {
        let s = "кошка🐈кот";
        for size in 1..=s.len() {
            let parts = split(s, n(size));
            assert!(parts
                .iter()
                .all(|p| p.len() <= size || p.chars().count() == 1));
            assert_eq!(join(&parts), s);
        }
    }

    proptest! {
        #[test]
        fn split_join_roundtrip(s in "\\PC{0,400}", size in 1usize..64) {
            let parts = split(&s, n(size));
            prop_assert_eq!(parts.len(), fragment_count(&s, n(size)));
            prop_assert!(parts
                .iter()
                .all(|p| !p.is_empty() && (p.len() <= size || p.chars().count() == 1)));
            prop_assert_eq!(join(&parts), s);
        }
    }
}
