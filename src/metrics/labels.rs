use crate::models::ticket::{ProductLabel, TechLabel};

/// Raw Jira labels that mark a ticket as technical work.
pub const TECHNICAL_LABELS: [&str; 5] = ["technical", "security", "secops", "devops", "msm"];

pub const SECURITY_LABELS: [&str; 3] = ["security", "secops", "msm"];

pub fn is_technical_label(label: &str) -> bool {
    TECHNICAL_LABELS.contains(&label.to_lowercase().as_str())
}

/// Maps raw labels onto technical categories.
///
/// Security and devops labels map directly. Any other technical label only
/// produces `misc_tech` when nothing has been produced yet, so a ticket
/// labelled `technical` and `devops` is just devops. Each category appears at
/// most once.
pub fn tech_labels(raw_labels: &[String]) -> Vec<TechLabel> {
    let mut labels = Vec::new();
    for label in raw_labels {
        let label = label.to_lowercase();
        if !TECHNICAL_LABELS.contains(&label.as_str()) {
            continue;
        }

        let mapped = if SECURITY_LABELS.contains(&label.as_str()) {
            Some(TechLabel::Security)
        } else if label == "devops" {
            Some(TechLabel::Devops)
        } else if labels.is_empty() {
            Some(TechLabel::MiscTech)
        } else {
            None
        };

        if let Some(mapped) = mapped {
            if !labels.contains(&mapped) {
                labels.push(mapped);
            }
        }
    }
    labels
}

/// Project work wins over everything. Otherwise only non-technical tickets
/// count as BAU product work, so a technical ticket outside any project gets
/// no product label at all.
pub fn product_labels(tech_labels: &[TechLabel], matched_projects: &[String]) -> Vec<ProductLabel> {
    if !matched_projects.is_empty() {
        vec![ProductLabel::Project]
    } else if tech_labels.is_empty() {
        vec![ProductLabel::BauProduct]
    } else {
        Vec::new()
    }
}
