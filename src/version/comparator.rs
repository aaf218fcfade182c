//! Version comparison

use std::cmp::Ordering;

/// Orders two version identifiers
///
/// Implementations must be pure: the same pair always yields the same ordering.
/// Any `Fn(&str, &str) -> Ordering` closure is a comparator.
pub trait VersionComparator: Send + Sync {
    /// Compare `a` against `b`
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

impl<F> VersionComparator for F
where
    F: Fn(&str, &str) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &str, b: &str) -> Ordering {
        self(a, b)
    }
}

/// Comparator for the dotted, possibly suffixed versions update feeds publish
///
/// `1.0 < 1.0.1 < 1.1`, `1.0b1 < 1.0b2 < 1.0`, `1.9 < 1.10`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardVersionComparator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartKind {
    Number,
    Text,
    Separator,
}

fn kind_of(c: char) -> PartKind {
    if c.is_ascii_digit() {
        PartKind::Number
    } else if c == '.' {
        PartKind::Separator
    } else {
        PartKind::Text
    }
}

/// Split a version into runs of digits, runs of text, and single separators
fn split_parts(version: &str) -> Vec<(PartKind, &str)> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut current: Option<PartKind> = None;

    for (i, c) in version.char_indices() {
        let kind = kind_of(c);
        match current {
            Some(prev) if prev == kind && kind != PartKind::Separator => {}
            Some(prev) => {
                parts.push((prev, &version[start..i]));
                start = i;
                current = Some(kind);
            }
            None => current = Some(kind),
        }
    }
    if let Some(kind) = current {
        parts.push((kind, &version[start..]));
    }

    parts
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl VersionComparator for StandardVersionComparator {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        let parts_a = split_parts(a);
        let parts_b = split_parts(b);

        for ((kind_a, part_a), (kind_b, part_b)) in parts_a.iter().zip(parts_b.iter()) {
            let ordering = match (kind_a, kind_b) {
                (PartKind::Number, PartKind::Number) => compare_numbers(part_a, part_b),
                (PartKind::Text, PartKind::Text) => part_a.cmp(part_b),
                (PartKind::Separator, PartKind::Separator) => Ordering::Equal,
                // Pre-release text sorts below anything structural
                (PartKind::Text, _) => Ordering::Less,
                (_, PartKind::Text) => Ordering::Greater,
                (PartKind::Number, PartKind::Separator) => Ordering::Greater,
                (PartKind::Separator, PartKind::Number) => Ordering::Less,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        // Equal prefix: extra trailing parts win unless they start with text
        match parts_a.len().cmp(&parts_b.len()) {
            Ordering::Equal => Ordering::Equal,
            Ordering::Greater => match parts_a[parts_b.len()].0 {
                PartKind::Text => Ordering::Less,
                _ => Ordering::Greater,
            },
            Ordering::Less => match parts_b[parts_a.len()].0 {
                PartKind::Text => Ordering::Greater,
                _ => Ordering::Less,
            },
        }
    }
}
