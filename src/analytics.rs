/// Analytics derived from rules and the focus ledger
use crate::rules::{CategoryTable, ListType, RuleSet};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Redirects attributed to one blocked domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainStat {
    pub domain: String,
    pub count: u64,
}

/// Redirect counts per blocklisted domain, busiest first
///
/// With per-domain counts available they are used as-is, for covered
/// domains only. Without them each rule's hit count is credited to every
/// domain it covers, so a category spreads its total over all members.
pub fn domain_block_stats(rules: &RuleSet, categories: &CategoryTable, domain_counts: Option<&BTreeMap<String, u64>>) -> Vec<DomainStat> {
    let mut counts: HashMap<String, u64> = HashMap::new();

    for site in rules.sites.iter().filter(|s| s.list_type == ListType::Blocklist) {
        for domain in site.domains(categories) {
            let key = domain.to_lowercase();
            match domain_counts {
                Some(per_domain) => {
                    if let Some(count) = per_domain.get(&key) {
                        counts.insert(key, *count);
                    }
                }
                None => *counts.entry(key).or_insert(0) += site.redirect_count,
            }
        }
    }

    let mut stats: Vec<DomainStat> = counts
        .into_iter()
        .map(|(domain, count)| DomainStat { domain, count })
        .collect();

    // Sort by count descending, then by domain name ascending
    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.domain.cmp(&b.domain)));
    stats
}

/// Chart label for focused hours, rounded to the minute
///
/// Examples: 0.5 → "30m", 1.0 → "1h", 1.4166667 → "1h 25m"
pub fn format_hours_minutes(hours: f64) -> String {
    let minutes = (hours * 60.0).round().max(0.0) as u64;
    let (h, m) = (minutes / 60, minutes % 60);
    match (h, m) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

/// Display name for a category key
pub fn category_label(key: &str, categories: &CategoryTable) -> String {
    let known = match key {
        "social" => Some("Social Media"),
        "news" => Some("News & Media"),
        "shopping" => Some("Shopping"),
        "entertainment" => Some("Entertainment"),
        "custom" => Some("Custom"),
        _ => None,
    };

    known
        .map(str::to_string)
        .or_else(|| categories.members(key).first().cloned())
        .unwrap_or_else(|| key.to_string())
}
