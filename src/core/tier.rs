//! Importance tiering for the formatted digest.
//!
//! After all category sections are concatenated, one tiering pass reorders
//! `## ` sections so denser signal comes first, then truncates the whole
//! document to a fixed line budget. Ties keep the original section order,
//! so the output is deterministic regardless of collector finish order.

/// Default line budget for the final digest.
pub const DEFAULT_DIGEST_LINE_BUDGET: usize = 600;

/// One `## ` section of the digest.
struct Section {
    text: String,
    density: usize,
}

/// Reorder sections by signal density and truncate to `max_lines`.
///
/// Density is the number of non-empty, non-header lines in the section.
/// The preamble (anything before the first `## `) always stays first.
pub fn tier_sections(digest: &str, max_lines: usize) -> String {
    let mut preamble: Vec<&str> = Vec::new();
    let mut sections: Vec<Section> = Vec::new();

    for line in digest.lines() {
        if line.starts_with("## ") {
            sections.push(Section {
                text: String::new(),
                density: 0,
            });
        }
        match sections.last_mut() {
            Some(section) => {
                if !section.text.is_empty() {
                    section.text.push('\n');
                }
                section.text.push_str(line);
                let trimmed = line.trim();
                if !trimmed.is_empty() && !trimmed.starts_with('#') {
                    section.density += 1;
                }
            }
            None => preamble.push(line),
        }
    }

    // Stable sort keeps the fixed category order for equal densities.
    sections.sort_by(|a, b| b.density.cmp(&a.density));

    let mut out: Vec<String> = Vec::new();
    let mut line_count = 0;

    for line in &preamble {
        out.push((*line).to_string());
        line_count += 1;
    }

    'sections: for section in &sections {
        if line_count > 0 && out.last().map(|l| !l.is_empty()).unwrap_or(false) {
            out.push(String::new());
            line_count += 1;
        }
        for line in section.text.lines() {
            if line_count >= max_lines {
                break 'sections;
            }
            out.push(line.to_string());
            line_count += 1;
        }
    }

    out.join("\n")
}
