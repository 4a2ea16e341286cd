//! Domain normalization and aggregation.
//!
//! Pure functions shared by every collector that produces domain lists.
//! Aggregation is visit-count-summing and order-independent: permuting
//! the input rows yields the same sorted output.

use crate::collector::browser::types::DomainVisit;
use std::collections::HashMap;

/// Prefixes stripped during normalization, longest first.
const STRIP_PREFIXES: [&str; 3] = ["mobile.", "www.", "m."];

/// Normalize a raw domain: trim, lowercase, strip at most one of
/// `www.` / `mobile.` / `m.`.
///
/// Idempotent: `normalize_domain(normalize_domain(d)) == normalize_domain(d)`.
pub fn normalize_domain(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    for prefix in STRIP_PREFIXES {
        if let Some(rest) = lower.strip_prefix(prefix) {
            // Only strip when something real remains after the prefix.
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }
    lower
}

/// Aggregate raw `(domain, visits)` rows into a sorted, deduplicated list.
///
/// Duplicate normalized domains have their visit counts summed. The
/// result is sorted by visits descending; ties keep discovery order
/// (stable sort over first-seen indices).
pub fn aggregate_domains<I>(rows: I) -> Vec<DomainVisit>
where
    I: IntoIterator<Item = (String, i64)>,
{
    let mut order: Vec<DomainVisit> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (raw, visits) in rows {
        let domain = normalize_domain(&raw);
        if domain.is_empty() {
            continue;
        }
        match index.get(&domain) {
            Some(&i) => order[i].visits += visits.max(0),
            None => {
                index.insert(domain.clone(), order.len());
                order.push(DomainVisit {
                    domain,
                    visits: visits.max(0),
                });
            }
        }
    }

    order.sort_by(|a, b| b.visits.cmp(&a.visits));
    order
}

/// Extract the host part of a URL: the substring between `://` and the
/// next `/`. Loopback hosts and non-web schemes yield `None`.
pub fn domain_from_url(url: &str) -> Option<String> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return None;
    }
    let rest = &url[url.find("://")? + 3..];
    let host = match rest.find('/') {
        Some(i) => &rest[..i],
        None => rest,
    };
    if host.is_empty()
        || host.contains("localhost")
        || host.contains("127.0.0.1")
        || host.contains("0.0.0.0")
    {
        return None;
    }
    Some(host.to_string())
}

/// Remove from `all_time` every domain already present (case-insensitively)
/// in `recent`, making all-time a complement set rather than a superset.
pub fn complement_recent(all_time: Vec<DomainVisit>, recent: &[DomainVisit]) -> Vec<DomainVisit> {
    let seen: std::collections::HashSet<String> =
        recent.iter().map(|d| d.domain.to_lowercase()).collect();
    all_time
        .into_iter()
        .filter(|d| !seen.contains(&d.domain.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_single_prefix() {
        assert_eq!(normalize_domain("www.github.com"), "github.com");
        assert_eq!(normalize_domain("mobile.twitter.com"), "twitter.com");
        assert_eq!(normalize_domain("m.youtube.com"), "youtube.com");
        assert_eq!(normalize_domain("GitHub.com"), "github.com");
    }

    #[test]
    fn test_normalize_strips_at_most_one() {
        // "www.m.example.com" loses only the outer prefix.
        assert_eq!(normalize_domain("www.m.example.com"), "m.example.com");
    }

    #[test]
    fn test_normalize_idempotent() {
        for raw in ["www.github.com", "m.site.org", "mobile.news.net", "plain.dev"] {
            let once = normalize_domain(raw);
            assert_eq!(normalize_domain(&once), once);
        }
    }

    #[test]
    fn test_normalize_keeps_bare_prefix_domains() {
        // Nothing left after the prefix means nothing is stripped.
        assert_eq!(normalize_domain("www."), "www.");
    }

    #[test]
    fn test_aggregate_sums_duplicates() {
        let rows = vec![
            ("github.com".to_string(), 10),
            ("www.github.com".to_string(), 5),
        ];
        let result = aggregate_domains(rows);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].domain, "github.com");
        assert_eq!(result[0].visits, 15);
    }

    #[test]
    fn test_aggregate_order_independent() {
        let a = vec![
            ("a.com".to_string(), 3),
            ("b.com".to_string(), 7),
            ("www.a.com".to_string(), 2),
        ];
        let mut b = a.clone();
        b.reverse();

        let ra = aggregate_domains(a);
        let rb = aggregate_domains(b);
        assert_eq!(ra.len(), rb.len());
        for (x, y) in ra.iter().zip(rb.iter()) {
            assert_eq!(x.domain, y.domain);
            assert_eq!(x.visits, y.visits);
        }
    }

    #[test]
    fn test_aggregate_sorted_descending() {
        let rows = vec![
            ("low.com".to_string(), 1),
            ("high.com".to_string(), 100),
            ("mid.com".to_string(), 50),
        ];
        let result = aggregate_domains(rows);
        assert_eq!(result[0].domain, "high.com");
        assert_eq!(result[1].domain, "mid.com");
        assert_eq!(result[2].domain, "low.com");
    }

    #[test]
    fn test_domain_from_url() {
        assert_eq!(
            domain_from_url("https://github.com/rust-lang/rust"),
            Some("github.com".to_string())
        );
        assert_eq!(domain_from_url("https://docs.rs"), Some("docs.rs".to_string()));
        assert_eq!(domain_from_url("http://localhost:3000/x"), None);
        assert_eq!(domain_from_url("chrome://settings"), None);
        assert_eq!(domain_from_url("file:///tmp/a"), None);
    }

    #[test]
    fn test_complement_is_disjoint() {
        let recent = vec![DomainVisit {
            domain: "github.com".to_string(),
            visits: 10,
        }];
        let all_time = vec![
            DomainVisit {
                domain: "GitHub.com".to_string(),
                visits: 50,
            },
            DomainVisit {
                domain: "docs.rs".to_string(),
                visits: 20,
            },
        ];
        let result = complement_recent(all_time, &recent);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].domain, "docs.rs");
    }
}
