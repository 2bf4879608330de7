//! Structural addresses into a notebook tree.
//!
//! A path is a sequence of segments from the document root, rendered as
//! `/cells/3/outputs/0/text`. Ignore patterns and replacement rules are
//! written in the same syntax with `*` standing for any index, and are
//! matched against the *generalized* forms of a concrete path: the path with
//! every suffix position replaced by the wildcard.

use std::collections::BTreeSet;
use std::fmt;

/// The wildcard segment as written in patterns.
pub const WILDCARD: &str = "*";

/// One step of a structural path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// A mapping key.
    Key(String),
    /// A sequence index.
    Index(usize),
    /// Any index.
    Wildcard,
}

impl PathSegment {
    /// Whether this segment is replaced by the wildcard when starred.
    ///
    /// Indices always are; keys are when they spell an (optionally signed)
    /// integer, since split paths carry indices as text.
    pub fn is_indexlike(&self) -> bool {
        match self {
            Self::Index(_) => true,
            Self::Key(key) => is_integer(key),
            Self::Wildcard => false,
        }
    }

    /// The starred form of this segment.
    pub fn starred(&self) -> Self {
        if self.is_indexlike() {
            Self::Wildcard
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
            Self::Wildcard => f.write_str(WILDCARD),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        if key == WILDCARD {
            Self::Wildcard
        } else {
            Self::Key(key.to_string())
        }
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        if key == WILDCARD {
            Self::Wildcard
        } else {
            Self::Key(key)
        }
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

fn is_integer(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Replace every index-like segment with the wildcard.
pub fn star(path: &[PathSegment]) -> Vec<PathSegment> {
    path.iter().map(PathSegment::starred).collect()
}

/// Render a path as `/a/b/c`. The root (empty path) renders as `""`.
pub fn join(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        out.push('/');
        out.push_str(&segment.to_string());
    }
    out
}

/// Parse a `/a/b/c` string into segments.
///
/// Surrounding slashes are ignored, `*` becomes [`PathSegment::Wildcard`],
/// everything else (digits included) is a key.
pub fn split(text: &str) -> Vec<PathSegment> {
    let trimmed = text.trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('/').map(PathSegment::from).collect()
}

/// All suffix-starred forms of a path.
///
/// For a path of length N this yields the forms obtained by starring from
/// cut point `i` to the end, for `i = N` (the path itself) down to `0` (the
/// fully starred path).
pub fn generalize_suffixes(path: &[PathSegment]) -> BTreeSet<String> {
    (0..=path.len())
        .rev()
        .map(|cut| {
            let mut form = path[..cut].to_vec();
            form.extend(star(&path[cut..]));
            join(&form)
        })
        .collect()
}

/// Whether any generalized form of `path` starts with one of `patterns`.
///
/// Matching is by string prefix: `/cells/*/outputs` matches every address
/// under any cell's outputs.
pub fn matches_any<I, S>(path: &[PathSegment], patterns: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let forms = generalize_suffixes(path);
    patterns
        .into_iter()
        .any(|pattern| forms.iter().any(|form| form.starts_with(pattern.as_ref())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(text: &str) -> Vec<PathSegment> {
        split(text)
    }

    #[test]
    fn join_renders_leading_slash() {
        let path = vec![
            PathSegment::from("cells"),
            PathSegment::Index(3),
            PathSegment::from("source"),
        ];
        assert_eq!(join(&path), "/cells/3/source");
        assert_eq!(join(&[]), "");
    }

    #[test]
    fn split_strips_surrounding_slashes() {
        assert_eq!(split("/cells/*/outputs/"), p("cells/*/outputs"));
        assert_eq!(split("/"), Vec::<PathSegment>::new());
        assert_eq!(split("/cells/*")[1], PathSegment::Wildcard);
        assert_eq!(split("/cells/3")[1], PathSegment::Key("3".into()));
    }

    #[test]
    fn star_replaces_integers_only() {
        let starred = star(&p("/cells/3/outputs/-1/data/+2/text"));
        assert_eq!(join(&starred), "/cells/*/outputs/*/data/*/text");
        let starred = star(&[PathSegment::from("a1"), PathSegment::Index(0)]);
        assert_eq!(join(&starred), "/a1/*");
    }

    #[test]
    fn generalized_forms_star_every_suffix() {
        let forms = generalize_suffixes(&p("/cells/5/outputs/0/text"));
        let expected: BTreeSet<String> = [
            "/cells/5/outputs/0/text",
            "/cells/5/outputs/*/text",
            "/cells/*/outputs/*/text",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(forms, expected);
    }

    #[test]
    fn generalized_forms_of_root() {
        let forms = generalize_suffixes(&[]);
        assert_eq!(forms.len(), 1);
        assert!(forms.contains(""));
    }

    #[test]
    fn wildcard_pattern_covers_every_cell() {
        for index in [0usize, 1, 999] {
            let mut path = p("/cells");
            path.push(PathSegment::Index(index));
            path.extend(p("/outputs/0/text"));
            assert!(matches_any(&path, ["/cells/*/outputs"]));
        }
    }

    #[test]
    fn concrete_pattern_only_matches_its_cell() {
        assert!(matches_any(&p("/cells/1/outputs/0"), ["/cells/1/"]));
        assert!(!matches_any(&p("/cells/2/outputs/0"), ["/cells/1/"]));
        assert!(!matches_any(&p("/cells/1/source"), ["/cells/*/outputs"]));
    }

    #[test]
    fn empty_patterns_never_match() {
        assert!(!matches_any(&p("/cells/0"), Vec::<String>::new()));
    }

    fn segment() -> impl Strategy<Value = PathSegment> {
        prop_oneof![
            "[a-z_]{1,8}".prop_map(PathSegment::Key),
            (0usize..1000).prop_map(PathSegment::Index),
        ]
    }

    proptest! {
        #[test]
        fn star_is_idempotent(path in proptest::collection::vec(segment(), 0..8)) {
            let once = star(&path);
            prop_assert_eq!(star(&once), once);
        }

        #[test]
        fn split_inverts_join(path in proptest::collection::vec(segment(), 0..8)) {
            let text = join(&path);
            prop_assert_eq!(join(&split(&text)), text);
        }

        #[test]
        fn forms_contain_path_and_full_star(path in proptest::collection::vec(segment(), 0..8)) {
            let forms = generalize_suffixes(&path);
            prop_assert!(forms.len() <= path.len() + 1);
            prop_assert!(forms.contains(&join(&path)));
            prop_assert!(forms.contains(&join(&star(&path))));
        }

        #[test]
        fn every_path_matches_its_own_starred_prefix(
            path in proptest::collection::vec(segment(), 1..8),
            cut in 0usize..8,
        ) {
            let cut = cut.min(path.len());
            let pattern = join(&star(&path[..cut]));
            prop_assert!(matches_any(&path, [pattern]));
        }
    }
}
