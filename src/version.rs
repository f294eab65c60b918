use std::cmp::Ordering;
use std::path::Path;

pub const DEFAULT_VERSION: &str = "1.0.0";

/// Dotted numeric version, compared segment by segment with the shorter
/// side zero-padded, so `1.0` and `1.0.0` are equal.
#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<u64>,
}

impl Version {
    /// Lenient parse: strips a leading `v`, keeps the leading digits of each
    /// segment and treats anything else as 0. Never fails.
    pub fn parse(s: &str) -> Self {
        let segments = strip_tag_prefix(s).split('.').map(leading_number).collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::parse(DEFAULT_VERSION)
    }
}

/// A release tag as written to the version markers: trimmed, without a
/// leading `v`, suffixes such as `-rc1` kept.
pub fn strip_tag_prefix(tag: &str) -> &str {
    let tag = tag.trim();
    tag.strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag)
}

fn leading_number(segment: &str) -> u64 {
    let digits: &str = {
        let segment = segment.trim();
        let end = segment
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(segment.len());
        &segment[..end]
    };
    if digits.is_empty() {
        return 0;
    }
    // only overflow can fail here; saturate so a huge segment stays newest
    digits.parse().unwrap_or_else(|_| {
        log::warn!("version segment {digits} out of range, using u64::MAX");
        u64::MAX
    })
}

pub fn compare(a: &Version, b: &Version) -> Ordering {
    let len = a.segments.len().max(b.segments.len());
    for i in 0..len {
        let x = a.segments.get(i).copied().unwrap_or(0);
        let y = b.segments.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

/// First non-empty marker among `candidates`, or the default version.
pub fn read_current_version<P: AsRef<Path>>(candidates: &[P]) -> Version {
    match crate::marker::read_first(candidates) {
        Some((path, raw)) => {
            log::debug!("version {raw} read from {}", path.display());
            Version::parse(&raw)
        }
        None => {
            log::debug!("no version marker found; assuming {DEFAULT_VERSION}");
            Version::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s)
    }

    #[test]
    fn orders_release_sequence() {
        let seq = ["1.0.0", "1.0.1", "1.1.0", "2.0.0"];
        for pair in seq.windows(2) {
            assert_eq!(compare(&v(pair[0]), &v(pair[1])), Ordering::Less, "{pair:?}");
            assert_eq!(compare(&v(pair[1]), &v(pair[0])), Ordering::Greater, "{pair:?}");
        }
        assert!(v("1.0.0") < v("2.0.0"));
    }

    #[test]
    fn zero_pads_shorter_versions() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0.0.0"));
        assert!(v("1.0") < v("1.0.1"));
    }

    #[test]
    fn strips_leading_v() {
        assert_eq!(v("v1.2.3"), v("1.2.3"));
        assert_eq!(v("V1.2.3"), v("1.2.3"));
        assert_eq!(v("v1.2.3").to_string(), "1.2.3");
    }

    #[test]
    fn non_numeric_segments_are_zero() {
        assert_eq!(v("1.x.3").segments(), &[1, 0, 3]);
        assert_eq!(v("1.2.3-beta").segments(), &[1, 2, 3]);
        assert_eq!(v(""), v("0"));
        assert_eq!(v("1..2").segments(), &[1, 0, 2]);
    }

    #[test]
    fn oversized_segment_saturates_instead_of_dropping_to_zero() {
        let huge = v("1.99999999999999999999999.0");
        assert_eq!(huge.segments(), &[1, u64::MAX, 0]);
        assert!(huge > v("1.2.0"));
    }

    #[test]
    fn tag_prefix_strip_keeps_suffix() {
        assert_eq!(strip_tag_prefix(" v1.3.0-rc1\n"), "1.3.0-rc1");
        assert_eq!(strip_tag_prefix("V2"), "2");
        assert_eq!(strip_tag_prefix("1.0"), "1.0");
    }

    #[test]
    fn comparison_is_antisymmetric() {
        let all = ["0.9", "1.0", "1.0.0", "v1.0.1", "1.10", "1.9.9", "2"];
        for a in all {
            for b in all {
                assert_eq!(compare(&v(a), &v(b)), compare(&v(b), &v(a)).reverse(), "{a} {b}");
            }
        }
        assert!(v("1.10") > v("1.9.9"));
    }

    #[test]
    fn reads_marker_or_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("VERSION");
        let second = dir.path().join("other");

        assert_eq!(read_current_version(&[&first, &second]), v(DEFAULT_VERSION));

        std::fs::write(&second, "1.4.2\n").unwrap();
        assert_eq!(read_current_version(&[&first, &second]), v("1.4.2"));

        std::fs::write(&first, "  ").unwrap();
        assert_eq!(read_current_version(&[&first, &second]), v("1.4.2"));

        std::fs::write(&first, "2.0.0").unwrap();
        assert_eq!(read_current_version(&[&first, &second]), v("2.0.0"));
    }
}
