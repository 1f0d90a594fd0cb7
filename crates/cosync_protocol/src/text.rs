//! Plain-text edit algebra.
//!
//! The reference algebra for collaborative strings. Positions are character
//! offsets, not byte offsets, so multi-byte text transforms correctly.

use crate::algebra::{Algebra, AlgebraError, AlgebraResult, Side};
use serde::{Deserialize, Serialize};

/// One splice against a text document.
///
/// `Remove` carries the removed text, not just a length. The content is what
/// makes the edit invertible and lets [`TextAlgebra::apply`] detect a
/// divergent replica instead of silently corrupting the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum TextEdit {
    /// Insert `text` so its first character lands at `index`.
    #[serde(rename_all = "camelCase")]
    Insert {
        /// Character offset of the insertion point.
        index: usize,
        /// Text to insert.
        text: String,
    },
    /// Remove `text` starting at `index`.
    #[serde(rename_all = "camelCase")]
    Remove {
        /// Character offset of the first removed character.
        index: usize,
        /// The removed text.
        text: String,
    },
}

impl TextEdit {
    /// Insert constructor.
    pub fn insert(index: usize, text: impl Into<String>) -> TextEdit {
        TextEdit::Insert {
            index,
            text: text.into(),
        }
    }

    /// Remove constructor.
    pub fn remove(index: usize, text: impl Into<String>) -> TextEdit {
        TextEdit::Remove {
            index,
            text: text.into(),
        }
    }

    fn index(&self) -> usize {
        match self {
            TextEdit::Insert { index, .. } | TextEdit::Remove { index, .. } => *index,
        }
    }

    fn len(&self) -> usize {
        match self {
            TextEdit::Insert { text, .. } | TextEdit::Remove { text, .. } => text.chars().count(),
        }
    }
}

/// [`Algebra`] over plain strings with [`TextEdit`] splices.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextAlgebra;

impl TextAlgebra {
    fn transform_insert(&self, index: usize, text: &str, against: &TextEdit, side: Side) -> Vec<TextEdit> {
        let k = against.index();
        let m = against.len();
        match against {
            TextEdit::Insert { .. } => {
                let shifted = match index.cmp(&k) {
                    std::cmp::Ordering::Less => index,
                    std::cmp::Ordering::Greater => index + m,
                    std::cmp::Ordering::Equal => match side {
                        Side::Left => index,
                        Side::Right => index + m,
                    },
                };
                vec![TextEdit::insert(shifted, text)]
            }
            TextEdit::Remove { .. } => {
                let shifted = if index <= k {
                    index
                } else if index >= k + m {
                    index - m
                } else {
                    // Insertion point fell inside the removed span.
                    k
                };
                vec![TextEdit::insert(shifted, text)]
            }
        }
    }

    fn transform_remove(&self, index: usize, text: &str, against: &TextEdit) -> Vec<TextEdit> {
        let n = text.chars().count();
        let k = against.index();
        let m = against.len();
        match against {
            TextEdit::Insert { .. } => {
                if index + n <= k {
                    vec![TextEdit::remove(index, text)]
                } else if index >= k {
                    vec![TextEdit::remove(index + m, text)]
                } else {
                    // The removal straddles the concurrent insert: split into
                    // the part before it and the part after it.
                    let split = k - index;
                    let head: String = text.chars().take(split).collect();
                    let tail: String = text.chars().skip(split).collect();
                    vec![
                        TextEdit::remove(index, head),
                        TextEdit::remove(index + m, tail),
                    ]
                }
            }
            TextEdit::Remove { .. } => {
                if index + n <= k {
                    vec![TextEdit::remove(index, text)]
                } else if index >= k + m {
                    vec![TextEdit::remove(index - m, text)]
                } else {
                    // Overlapping removals: keep only the characters the
                    // concurrent removal did not already take.
                    let head: String = if index < k {
                        text.chars().take(k - index).collect()
                    } else {
                        String::new()
                    };
                    let tail: String = if index + n > k + m {
                        text.chars().skip(k + m - index).collect()
                    } else {
                        String::new()
                    };
                    let remaining = head + &tail;
                    if remaining.is_empty() {
                        Vec::new()
                    } else {
                        vec![TextEdit::remove(index.min(k), remaining)]
                    }
                }
            }
        }
    }
}

impl Algebra for TextAlgebra {
    type Data = String;
    type Edit = TextEdit;

    fn transform(&self, op: &TextEdit, against: &TextEdit, side: Side) -> Vec<TextEdit> {
        match op {
            TextEdit::Insert { index, text } => self.transform_insert(*index, text, against, side),
            TextEdit::Remove { index, text } => self.transform_remove(*index, text, against),
        }
    }

    fn invert(&self, op: &TextEdit) -> TextEdit {
        match op {
            TextEdit::Insert { index, text } => TextEdit::remove(*index, text.clone()),
            TextEdit::Remove { index, text } => TextEdit::insert(*index, text.clone()),
        }
    }

    fn apply(&self, data: &String, op: &TextEdit) -> AlgebraResult<String> {
        let chars: Vec<char> = data.chars().collect();
        match op {
            TextEdit::Insert { index, text } => {
                if text.is_empty() {
                    return Err(AlgebraError::InvalidEdit("empty insert".into()));
                }
                if *index > chars.len() {
                    return Err(AlgebraError::IndexOutOfRange {
                        index: *index,
                        len: chars.len(),
                    });
                }
                let mut out: String = chars[..*index].iter().collect();
                out.push_str(text);
                out.extend(&chars[*index..]);
                Ok(out)
            }
            TextEdit::Remove { index, text } => {
                if text.is_empty() {
                    return Err(AlgebraError::InvalidEdit("empty remove".into()));
                }
                let n = text.chars().count();
                if *index + n > chars.len() {
                    return Err(AlgebraError::IndexOutOfRange {
                        index: *index + n,
                        len: chars.len(),
                    });
                }
                let present: String = chars[*index..*index + n].iter().collect();
                if present != *text {
                    return Err(AlgebraError::InvalidEdit(format!(
                        "remove expected {text:?} at {index}, found {present:?}"
                    )));
                }
                let mut out: String = chars[..*index].iter().collect();
                out.extend(&chars[*index + n..]);
                Ok(out)
            }
        }
    }
}

/// Derives the edit batch that rewrites `old` into `new` as a single splice,
/// by trimming the common prefix and suffix.
///
/// Returns at most one `Remove` followed by at most one `Insert`; an empty
/// batch when the strings are equal.
pub fn diff(old: &str, new: &str) -> Vec<TextEdit> {
    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();

    let prefix = old_chars
        .iter()
        .zip(new_chars.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = old_chars.len().min(new_chars.len()) - prefix;
    let suffix = old_chars
        .iter()
        .rev()
        .zip(new_chars.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let removed: String = old_chars[prefix..old_chars.len() - suffix].iter().collect();
    let inserted: String = new_chars[prefix..new_chars.len() - suffix].iter().collect();

    let mut edits = Vec::new();
    if !removed.is_empty() {
        edits.push(TextEdit::remove(prefix, removed));
    }
    if !inserted.is_empty() {
        edits.push(TextEdit::insert(prefix, inserted));
    }
    edits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::apply_all;
    use proptest::prelude::*;

    fn alg() -> TextAlgebra {
        TextAlgebra
    }

    #[test]
    fn insert_against_insert_tie_breaks_by_side() {
        let a = TextEdit::insert(2, "x");
        let b = TextEdit::insert(2, "y");
        assert_eq!(
            alg().transform(&a, &b, Side::Left),
            vec![TextEdit::insert(2, "x")]
        );
        assert_eq!(
            alg().transform(&a, &b, Side::Right),
            vec![TextEdit::insert(3, "x")]
        );
    }

    #[test]
    fn insert_shifts_past_earlier_insert() {
        let a = TextEdit::insert(4, "!");
        let b = TextEdit::insert(0, "ab");
        assert_eq!(
            alg().transform(&a, &b, Side::Left),
            vec![TextEdit::insert(6, "!")]
        );
    }

    #[test]
    fn insert_inside_removed_span_collapses() {
        let a = TextEdit::insert(3, "x");
        let b = TextEdit::remove(1, "bcde");
        assert_eq!(
            alg().transform(&a, &b, Side::Left),
            vec![TextEdit::insert(1, "x")]
        );
    }

    #[test]
    fn remove_splits_around_concurrent_insert() {
        // Removing "bcd" from "abcde" while "X" lands between c and d.
        let a = TextEdit::remove(1, "bcd");
        let b = TextEdit::insert(3, "X");
        let out = alg().transform(&a, &b, Side::Left);
        assert_eq!(
            out,
            vec![TextEdit::remove(1, "bc"), TextEdit::remove(2, "d")]
        );

        let mid = alg().apply(&"abcde".to_string(), &b).unwrap();
        assert_eq!(mid, "abcXde");
        assert_eq!(apply_all(&alg(), &mid, &out).unwrap(), "aXe");
    }

    #[test]
    fn overlapping_removes_keep_the_leftovers() {
        // a removes "bcd", b removes "cde" from "abcdef".
        let a = TextEdit::remove(1, "bcd");
        let b = TextEdit::remove(2, "cde");
        assert_eq!(
            alg().transform(&a, &b, Side::Left),
            vec![TextEdit::remove(1, "b")]
        );
        assert_eq!(
            alg().transform(&b, &a, Side::Right),
            vec![TextEdit::remove(1, "e")]
        );
    }

    #[test]
    fn identical_removes_annihilate() {
        let a = TextEdit::remove(2, "cd");
        let b = TextEdit::remove(2, "cd");
        assert!(alg().transform(&a, &b, Side::Left).is_empty());
    }

    #[test]
    fn apply_validates_bounds_and_content() {
        let e = alg().apply(&"ab".to_string(), &TextEdit::insert(5, "x"));
        assert_eq!(e, Err(AlgebraError::IndexOutOfRange { index: 5, len: 2 }));

        let e = alg().apply(&"abcd".to_string(), &TextEdit::remove(1, "xy"));
        assert!(matches!(e, Err(AlgebraError::InvalidEdit(_))));

        let e = alg().apply(&"abcd".to_string(), &TextEdit::insert(1, ""));
        assert!(matches!(e, Err(AlgebraError::InvalidEdit(_))));
    }

    #[test]
    fn apply_uses_character_offsets() {
        let out = alg()
            .apply(&"héllo".to_string(), &TextEdit::insert(5, "!"))
            .unwrap();
        assert_eq!(out, "héllo!");
    }

    #[test]
    fn invert_undoes_an_edit() {
        let base = "hello".to_string();
        let edit = TextEdit::remove(1, "ell");
        let after = alg().apply(&base, &edit).unwrap();
        let back = alg().apply(&after, &alg().invert(&edit)).unwrap();
        assert_eq!(back, base);
    }

    #[test]
    fn diff_produces_a_minimal_splice() {
        assert_eq!(
            diff("Hello World", "Hello Rust World"),
            vec![TextEdit::insert(6, "Rust ")]
        );
        assert_eq!(
            diff("Hello World", "Hello"),
            vec![TextEdit::remove(5, " World")]
        );
        assert_eq!(
            diff("abcd", "axyd"),
            vec![TextEdit::remove(1, "bc"), TextEdit::insert(1, "xy")]
        );
        assert!(diff("same", "same").is_empty());
    }

    #[test]
    fn diff_edits_apply_cleanly() {
        let old = "the quick brown fox";
        let new = "the slow brown fox jumps";
        let out = apply_all(&alg(), &old.to_string(), &diff(old, new)).unwrap();
        assert_eq!(out, new);
    }

    fn splice(base: &str, start: usize, end: usize, insert: &str) -> Vec<TextEdit> {
        let len = base.chars().count();
        let start = start.min(len);
        let end = end.clamp(start, len);
        let next: String = base
            .chars()
            .take(start)
            .chain(insert.chars())
            .chain(base.chars().skip(end))
            .collect();
        diff(base, &next)
    }

    proptest! {
        // Concurrent splices on the same base converge regardless of the
        // order the two sites integrate each other's work.
        #[test]
        fn concurrent_splices_converge(
            base in "[a-z]{0,12}",
            a in (0usize..16, 0usize..16, "[a-z]{0,4}"),
            b in (0usize..16, 0usize..16, "[a-z]{0,4}"),
        ) {
            let alg = TextAlgebra;
            let ours = splice(&base, a.0, a.1, &a.2);
            let theirs = splice(&base, b.0, b.1, &b.2);

            let (ours2, theirs2) =
                crate::algebra::transform_seqs(&alg, &ours, &theirs, Side::Left);

            let via_ours =
                apply_all(&alg, &apply_all(&alg, &base, &ours).unwrap(), &theirs2).unwrap();
            let via_theirs =
                apply_all(&alg, &apply_all(&alg, &base, &theirs).unwrap(), &ours2).unwrap();
            prop_assert_eq!(via_ours, via_theirs);
        }
    }
}
