//! Domain name helpers: label splitting, normalisation and validation.

use std::fmt;

use crate::error::DnsError;

/// Maximum length of a full domain name in characters.
const MAX_NAME_LEN: usize = 255;

/// Maximum length of a single label.
const MAX_LABEL_LEN: usize = 63;

/// Check whether `s` looks like a usable domain name.
///
/// Accepts letters, digits, `-`, `_` and `.` as label separator. Labels may
/// not be empty, longer than 63 characters, or start/end with a hyphen, and at
/// least one letter or underscore has to appear somewhere in the name. A single
/// trailing dot is tolerated.
pub fn is_valid_domain_name(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_NAME_LEN {
        return false;
    }

    let mut last = b'.';
    let mut seen_letter = false;
    let mut label_len = 0usize;

    for c in s.bytes() {
        match c {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                seen_letter = true;
                label_len += 1;
            }
            b'0'..=b'9' => label_len += 1,
            b'-' => {
                if last == b'.' {
                    return false;
                }
                label_len += 1;
            }
            b'.' => {
                if last == b'.' || last == b'-' {
                    return false;
                }
                if label_len > MAX_LABEL_LEN || label_len == 0 {
                    return false;
                }
                label_len = 0;
            }
            _ => return false,
        }
        last = c;
    }

    if last == b'-' || label_len > MAX_LABEL_LEN {
        return false;
    }

    seen_letter
}

/// Split a stored dotted field (image, name) into labels.
///
/// Labels are lowercased so that stored fields compare case-insensitively
/// against query labels.
pub fn split_labels(s: &str) -> Vec<String> {
    s.split('.').map(|label| label.to_ascii_lowercase()).collect()
}

/// Split an incoming query name into lowercased labels.
pub fn query_labels(query: &str) -> Vec<String> {
    query.to_ascii_lowercase().split('.').map(String::from).collect()
}

/// Strip a single trailing dot from a fully qualified name.
pub fn trim_fqdn(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

/// The locally authoritative domain as an ordered label sequence,
/// e.g. `["docker", "local"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    labels: Vec<String>,
}

impl Domain {
    /// Parse a dotted domain. Empty labels (leading, trailing or doubled dots)
    /// are dropped so that `".docker"` and `"docker."` both yield `["docker"]`.
    pub fn parse(s: &str) -> Result<Self, DnsError> {
        let labels: Vec<String> = s
            .split('.')
            .filter(|label| !label.is_empty())
            .map(|label| label.to_ascii_lowercase())
            .collect();

        if labels.is_empty() {
            return Err(DnsError::Config(format!("domain {s:?} has no labels")));
        }

        for label in &labels {
            if label.len() > MAX_LABEL_LEN
                || label.starts_with('-')
                || label.ends_with('-')
                || !label
                    .bytes()
                    .all(|c| c.is_ascii_alphanumeric() || c == b'-' || c == b'_')
            {
                return Err(DnsError::Config(format!(
                    "domain {s:?} has invalid label {label:?}"
                )));
            }
        }

        Ok(Self { labels })
    }

    /// Labels, outermost last.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The outermost (rightmost) label.
    pub fn last_label(&self) -> &str {
        // parse() guarantees at least one label
        self.labels.last().map(String::as_str).unwrap_or_default()
    }

    /// Whether `name` (without trailing dot) is this domain or lies below it.
    /// Comparison is case-insensitive and respects label boundaries.
    pub fn contains(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        let domain = self.to_string();
        name == domain
            || name
                .strip_suffix(domain.as_str())
                .is_some_and(|head| head.ends_with('.'))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.labels.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_domain_names() {
        for name in [
            "www.seznam.cz",
            "docker",
            "my_service.local",
            "a-b.c-d.e",
            "x1.y2",
            "www.seznam.cz.",
        ] {
            assert!(is_valid_domain_name(name), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_domain_names() {
        let too_long_label = format!("{}.com", "a".repeat(64));
        let too_long_name = "a.".repeat(128);
        for name in [
            "",
            "$not_a_domain.99",
            "-abc.com",
            "abc-.com",
            "abc..com",
            "123.456",
            "with space.com",
            too_long_label.as_str(),
            too_long_name.as_str(),
        ] {
            assert!(!is_valid_domain_name(name), "{name:?} should be invalid");
        }
    }

    #[test]
    fn test_label_of_63_chars_is_valid() {
        let name = format!("{}.com", "a".repeat(63));
        assert!(is_valid_domain_name(&name));
    }

    #[test]
    fn test_query_labels_lowercases() {
        assert_eq!(query_labels("Foo.BAR.docker"), vec!["foo", "bar", "docker"]);
    }

    #[test]
    fn test_split_labels_keeps_empty_segments() {
        assert_eq!(split_labels(""), vec![""]);
        assert_eq!(split_labels("Bar.Zar"), vec!["bar", "zar"]);
    }

    #[test]
    fn test_trim_fqdn_strips_one_dot() {
        assert_eq!(trim_fqdn("docker.local."), "docker.local");
        assert_eq!(trim_fqdn("docker.local"), "docker.local");
        assert_eq!(trim_fqdn("docker.."), "docker.");
    }

    #[test]
    fn test_domain_parse_drops_empty_labels() {
        let domain = Domain::parse(".docker.Local.").unwrap();
        assert_eq!(domain.labels(), ["docker", "local"]);
        assert_eq!(domain.to_string(), "docker.local");
        assert_eq!(domain.last_label(), "local");
    }

    #[test]
    fn test_domain_parse_rejects_garbage() {
        assert!(Domain::parse("").is_err());
        assert!(Domain::parse("...").is_err());
        assert!(Domain::parse("bad label.local").is_err());
        assert!(Domain::parse("-docker").is_err());
    }

    #[test]
    fn test_domain_contains_respects_label_boundaries() {
        let domain = Domain::parse("docker.local").unwrap();
        assert!(domain.contains("docker.local"));
        assert!(domain.contains("foo.bar.docker.local"));
        assert!(domain.contains("FOO.Docker.Local"));
        assert!(!domain.contains("xdocker.local"));
        assert!(!domain.contains("local"));
        assert!(!domain.contains("google.com"));
    }
}
