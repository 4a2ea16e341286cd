//! Noise filtering for page titles and authentication domains.
//!
//! A "noise title" reflects a transient technical state (loading screen,
//! error page, bot challenge, raw URL) rather than real content.

use crate::collector::browser::types::{DomainDetail, DomainVisit};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Maximum title samples kept per domain.
pub const MAX_DETAILS_PER_DOMAIN: usize = 15;

static NOISE_TITLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Loading / interstitial states
        r"(?i)^(just a moment|loading|please wait|one moment)",
        // HTTP status pages: "404 Not Found", "502 Bad Gateway"
        r"(?i)^\d{3}\s",
        r"(?i)(page not found|not found$|access denied|forbidden)",
        // Bot challenges
        r"(?i)(checking your browser|attention required|are you a robot|verify you are human)",
        // Placeholders
        r"(?i)^(untitled|new tab|blank page)$",
        // Raw URLs used as titles
        r"(?i)^(https?://|www\.)",
        // Sign-in interstitials
        r"(?i)^(sign in|log in|signing in|redirecting)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static noise pattern"))
    .collect()
});

/// Domains whose titles are authentication/infrastructure plumbing, not
/// content. Matched by substring against the normalized domain.
const AUTH_DOMAIN_MARKERS: [&str; 7] = [
    "accounts.google.com",
    "login.",
    "auth.",
    "oauth.",
    "signin.",
    "sso.",
    "id.",
];

/// Below this count a domain is considered low-signal.
const MIN_DOMAIN_VISITS: i64 = 2;

/// How many entries a suppressed list must retain for suppression to
/// apply at all.
const MIN_SUPPRESSED_LEN: usize = 3;

/// Drop single-visit domains from an already-sorted list, unless doing
/// so would leave too little signal to be useful.
pub fn suppress_low_signal(domains: Vec<DomainVisit>) -> Vec<DomainVisit> {
    let kept: Vec<DomainVisit> = domains
        .iter()
        .filter(|d| d.visits >= MIN_DOMAIN_VISITS)
        .cloned()
        .collect();
    if kept.len() >= MIN_SUPPRESSED_LEN {
        kept
    } else {
        domains
    }
}

/// Classify a page title as noise.
pub fn is_noise_title(title: &str) -> bool {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return true;
    }
    NOISE_TITLE_PATTERNS.iter().any(|re| re.is_match(trimmed))
}

/// Classify a domain as authentication/infrastructure.
pub fn is_auth_domain(domain: &str) -> bool {
    let lower = domain.to_lowercase();
    AUTH_DOMAIN_MARKERS.iter().any(|m| lower.contains(m))
}

/// Deduplicate title samples by case-insensitive trimmed title, summing
/// visit counts across duplicates. Sorted by count descending.
pub fn dedupe_details(details: Vec<DomainDetail>) -> Vec<DomainDetail> {
    let mut order: Vec<DomainDetail> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for detail in details {
        let key = detail.title.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        match index.get(&key) {
            Some(&i) => order[i].visit_count += detail.visit_count.max(0),
            None => {
                index.insert(key, order.len());
                order.push(detail);
            }
        }
    }

    order.sort_by(|a, b| b.visit_count.cmp(&a.visit_count));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_titles() {
        assert!(is_noise_title("Just a moment..."));
        assert!(is_noise_title("404 Not Found"));
        assert!(is_noise_title(""));
        assert!(is_noise_title("https://example.com"));
        assert!(is_noise_title("Loading..."));
        assert!(is_noise_title("New Tab"));
        assert!(is_noise_title("   "));
    }

    #[test]
    fn test_real_titles_pass() {
        assert!(!is_noise_title("My Project Notes"));
        assert!(!is_noise_title("rust - How do lifetimes work? - Stack Overflow"));
        assert!(!is_noise_title("Weekly planning doc"));
    }

    #[test]
    fn test_auth_domains() {
        assert!(is_auth_domain("accounts.google.com"));
        assert!(is_auth_domain("login.example.com"));
        assert!(is_auth_domain("sso.corp.net"));
        assert!(is_auth_domain("id.atlassian.com"));
        assert!(!is_auth_domain("github.com"));
        assert!(!is_auth_domain("docs.rs"));
    }

    #[test]
    fn test_low_signal_suppression() {
        let domains: Vec<DomainVisit> = [("a.com", 9), ("b.com", 5), ("c.com", 4), ("d.com", 1)]
            .iter()
            .map(|(d, v)| DomainVisit {
                domain: d.to_string(),
                visits: *v,
            })
            .collect();
        let kept = suppress_low_signal(domains);
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|d| d.visits > 1));
    }

    #[test]
    fn test_suppression_keeps_sparse_lists_intact() {
        let domains = vec![
            DomainVisit {
                domain: "only.com".to_string(),
                visits: 1,
            },
            DomainVisit {
                domain: "other.com".to_string(),
                visits: 1,
            },
        ];
        // Too little signal to suppress anything.
        assert_eq!(suppress_low_signal(domains).len(), 2);
    }

    #[test]
    fn test_dedupe_details_sums_counts() {
        let details = vec![
            DomainDetail {
                title: "Rust Book".to_string(),
                url: "https://doc.rust-lang.org/book/".to_string(),
                visit_count: 8,
            },
            DomainDetail {
                title: "  rust book ".to_string(),
                url: "https://doc.rust-lang.org/book/ch01".to_string(),
                visit_count: 4,
            },
            DomainDetail {
                title: "Cargo Guide".to_string(),
                url: "https://doc.rust-lang.org/cargo/".to_string(),
                visit_count: 2,
            },
        ];
        let deduped = dedupe_details(details);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "Rust Book");
        assert_eq!(deduped[0].visit_count, 12);
    }
}
