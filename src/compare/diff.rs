// src/compare/diff.rs
//! Structural diff of JSON document trees
//!
//! Objects are compared key by key. Arrays are aligned on their longest
//! common subsequence; a removed element equal to an added one is reported
//! as a MOVE, leftovers at the same index are diffed recursively, and the
//! rest become ADD or REMOVE.

use super::DiffDetail;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Arrays with more element pairs than this are aligned by index only
const LCS_CELL_LIMIT: usize = 1 << 20;

/// Differences turning `before` into `after`
pub fn diff_values(before: &Value, after: &Value) -> Vec<DiffDetail> {
    let mut diffs = Vec::new();
    diff_at("", before, after, &mut diffs);
    diffs
}

/// Differences under a pointer prefix such as `/body`
pub fn diff_values_at(prefix: &str, before: &Value, after: &Value) -> Vec<DiffDetail> {
    let mut diffs = Vec::new();
    diff_at(prefix, before, after, &mut diffs);
    diffs
}

/// Append one escaped reference token to a JSON pointer
pub fn child_path(parent: &str, token: &str) -> String {
    let mut path = String::with_capacity(parent.len() + token.len() + 1);
    path.push_str(parent);
    path.push('/');
    for c in token.chars() {
        match c {
            '~' => path.push_str("~0"),
            '/' => path.push_str("~1"),
            c => path.push(c),
        }
    }
    path
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{}/{}", parent, index)
}

fn diff_at(path: &str, before: &Value, after: &Value, out: &mut Vec<DiffDetail>) {
    match (before, after) {
        (Value::Object(a), Value::Object(b)) => diff_objects(path, a, b, out),
        (Value::Array(a), Value::Array(b)) => diff_arrays(path, a, b, out),
        _ if before == after => {}
        _ => out.push(DiffDetail::modify(path, before, after)),
    }
}

fn diff_objects(path: &str, a: &Map<String, Value>, b: &Map<String, Value>, out: &mut Vec<DiffDetail>) {
    let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();

    for key in keys {
        let child = child_path(path, key);
        match (a.get(key), b.get(key)) {
            (Some(x), Some(y)) => diff_at(&child, x, y, out),
            (Some(x), None) => out.push(DiffDetail::remove(child, x)),
            (None, Some(y)) => out.push(DiffDetail::add(child, y)),
            (None, None) => {}
        }
    }
}

fn diff_arrays(path: &str, a: &[Value], b: &[Value], out: &mut Vec<DiffDetail>) {
    let (removed, added) = if a.len().saturating_mul(b.len()) > LCS_CELL_LIMIT {
        unaligned_by_index(a, b)
    } else {
        unaligned_by_lcs(a, b)
    };

    // Pair equal elements that changed position
    let mut added_used = vec![false; added.len()];
    let mut removed_left = Vec::new();
    for &ri in &removed {
        let hit = added
            .iter()
            .enumerate()
            .find(|(k, aj)| !added_used[*k] && a[ri] == b[**aj])
            .map(|(k, &aj)| (k, aj));

        match hit {
            Some((k, aj)) => {
                added_used[k] = true;
                out.push(DiffDetail::moved(index_path(path, ri), index_path(path, aj), &a[ri]));
            }
            None => removed_left.push(ri),
        }
    }

    let mut added_left: Vec<usize> = added
        .iter()
        .zip(&added_used)
        .filter(|(_, used)| !**used)
        .map(|(&aj, _)| aj)
        .collect();

    // Same slot on both sides: the element was edited in place
    for ri in removed_left {
        match added_left.iter().position(|&aj| aj == ri) {
            Some(k) => {
                added_left.remove(k);
                diff_at(&index_path(path, ri), &a[ri], &b[ri], out);
            }
            None => out.push(DiffDetail::remove(index_path(path, ri), &a[ri])),
        }
    }

    for aj in added_left {
        out.push(DiffDetail::add(index_path(path, aj), &b[aj]));
    }
}

/// Indices outside the longest common subsequence, per side
fn unaligned_by_lcs(a: &[Value], b: &[Value]) -> (Vec<usize>, Vec<usize>) {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];

    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a[i] == b[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut removed = Vec::new();
    let mut added = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            removed.push(i);
            i += 1;
        } else {
            added.push(j);
            j += 1;
        }
    }
    removed.extend(i..n);
    added.extend(j..m);

    (removed, added)
}

fn unaligned_by_index(a: &[Value], b: &[Value]) -> (Vec<usize>, Vec<usize>) {
    let common = a.len().min(b.len());
    let mismatched = (0..common).filter(|&i| a[i] != b[i]);

    let removed = mismatched.clone().chain(common..a.len()).collect();
    let added = mismatched.chain(common..b.len()).collect();
    (removed, added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::DiffKind;
    use serde_json::json;

    fn kinds(diffs: &[DiffDetail]) -> Vec<(DiffKind, &str)> {
        diffs.iter().map(|d| (d.kind, d.path.as_str())).collect()
    }

    #[test]
    fn test_single_modify() {
        let diffs = diff_values(&json!({"a": 1, "b": 2}), &json!({"a": 1, "b": 3}));

        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DiffKind::Modify);
        assert_eq!(diffs[0].path, "/b");
        assert_eq!(diffs[0].before.as_deref(), Some("2"));
        assert_eq!(diffs[0].after.as_deref(), Some("3"));
    }

    #[test]
    fn test_identical_documents() {
        let doc = json!({"a": [1, {"b": null}], "c": "x"});
        assert!(diff_values(&doc, &doc).is_empty());
    }

    #[test]
    fn test_add_remove_keys() {
        let diffs = diff_values(&json!({"gone": 1, "kept": 2}), &json!({"kept": 2, "new": 3}));
        assert_eq!(
            kinds(&diffs),
            vec![(DiffKind::Remove, "/gone"), (DiffKind::Add, "/new")]
        );
    }

    #[test]
    fn test_nested_path_escaping() {
        let diffs = diff_values(&json!({"a/b": {"c~d": 1}}), &json!({"a/b": {"c~d": 2}}));
        assert_eq!(kinds(&diffs), vec![(DiffKind::Modify, "/a~1b/c~0d")]);
    }

    #[test]
    fn test_type_change_is_modify() {
        let diffs = diff_values(&json!({"a": [1]}), &json!({"a": {"0": 1}}));
        assert_eq!(kinds(&diffs), vec![(DiffKind::Modify, "/a")]);
    }

    #[test]
    fn test_array_move() {
        let diffs = diff_values(&json!([1, 2, 3]), &json!([3, 1, 2]));

        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DiffKind::Move);
        assert_eq!(diffs[0].from.as_deref(), Some("/2"));
        assert_eq!(diffs[0].path, "/0");
    }

    #[test]
    fn test_array_insert_and_delete() {
        let diffs = diff_values(&json!(["a", "b", "c"]), &json!(["a", "c", "d"]));
        assert_eq!(
            kinds(&diffs),
            vec![(DiffKind::Remove, "/1"), (DiffKind::Add, "/2")]
        );
    }

    #[test]
    fn test_array_element_edited_in_place() {
        let diffs = diff_values(
            &json!({"items": [{"id": 1, "qty": 2}]}),
            &json!({"items": [{"id": 1, "qty": 5}]}),
        );
        assert_eq!(kinds(&diffs), vec![(DiffKind::Modify, "/items/0/qty")]);
    }

    #[test]
    fn test_large_arrays_align_by_index() {
        let a: Vec<u32> = (0..2000).collect();
        let mut b = a.clone();
        b[10] = 99_999;

        let diffs = diff_values(&json!(a), &json!(b));
        assert_eq!(kinds(&diffs), vec![(DiffKind::Modify, "/10")]);
    }

    #[test]
    fn test_prefix() {
        let diffs = diff_values_at("/body", &json!({"x": 1}), &json!({"x": 2}));
        assert_eq!(kinds(&diffs), vec![(DiffKind::Modify, "/body/x")]);
    }
}
