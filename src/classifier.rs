/// List classification: which list wins for a navigated URL
use crate::domain::{domains_match, host_of};
use crate::rules::{CategoryTable, ListType, RuleSet};
use serde::{Deserialize, Serialize};

/// Effective verdict for a navigation, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Blocked,
    Friction,
    Whitelisted,
    Unrestricted,
}

impl Verdict {
    fn from_list(list_type: ListType) -> Verdict {
        match list_type {
            ListType::Blocklist => Verdict::Blocked,
            ListType::Greylist => Verdict::Friction,
            ListType::Whitelist => Verdict::Whitelisted,
        }
    }
}

/// Result of classifying one URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub verdict: Verdict,
    pub host: String,
    /// Rule domain (or category member) that produced the verdict
    pub matched_domain: Option<String>,
    /// Rule to charge the hit to
    pub rule_id: Option<String>,
}

impl Classification {
    pub fn unrestricted(host: String) -> Classification {
        Classification {
            verdict: Verdict::Unrestricted,
            host,
            matched_domain: None,
            rule_id: None,
        }
    }
}

/// Classify a navigated URL against every rule
///
/// Malformed URLs are classified by their raw text.
pub fn classify(url: &str, rules: &RuleSet, categories: &CategoryTable) -> Classification {
    classify_host(&host_of(url), rules, categories)
}

/// Classify an already-extracted hostname
///
/// Every rule is expanded to its domains and tested; a host may sit in
/// several lists at once. The first matching rule of the winning list, in
/// rule order, is reported.
pub fn classify_host(host: &str, rules: &RuleSet, categories: &CategoryTable) -> Classification {
    // Indexed by ListType::priority() - 1
    let mut first_match: [Option<(&str, &str)>; 3] = [None; 3];

    for site in &rules.sites {
        let slot = &mut first_match[usize::from(site.list_type.priority() - 1)];
        if slot.is_some() {
            continue;
        }
        if let Some(domain) = site.domains(categories).into_iter().find(|d| domains_match(host, d)) {
            *slot = Some((site.id.as_str(), domain));
        }
    }

    let winner = ListType::ALL
        .iter()
        .find_map(|&list_type| first_match[usize::from(list_type.priority() - 1)].map(|m| (list_type, m)));

    match winner {
        Some((list_type, (rule_id, domain))) => Classification {
            verdict: Verdict::from_list(list_type),
            host: host.to_string(),
            matched_domain: Some(domain.to_string()),
            rule_id: Some(rule_id.to_string()),
        },
        None => Classification::unrestricted(host.to_string()),
    }
}
