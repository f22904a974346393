/// Cross-list conflict detection for the rule management view
use crate::domain::domains_match;
use crate::rules::{BlockedSite, CategoryTable, ListType, RuleKind, RuleSet};
use serde::{Deserialize, Serialize};

/// Another list that also claims a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub list_type: ListType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Lists other than `current_list` that also cover `domain`
///
/// One entry per list, carrying the category of the first rule seen, sorted
/// blocklist first.
pub fn domain_conflicts(domain: &str, current_list: ListType, rules: &RuleSet, categories: &CategoryTable) -> Vec<Conflict> {
    let mut conflicts: Vec<Conflict> = Vec::new();

    for site in rules.sites.iter().filter(|s| s.list_type != current_list) {
        if conflicts.iter().any(|c| c.list_type == site.list_type) {
            continue;
        }
        if site.domains(categories).iter().any(|d| domains_match(d, domain)) {
            conflicts.push(Conflict {
                list_type: site.list_type,
                category: Some(site.category.clone()),
            });
        }
    }

    conflicts.sort_by(|a, b| b.list_type.priority().cmp(&a.list_type.priority()));
    conflicts
}

/// Whether any member of a category is also claimed by a different list
pub fn category_has_conflicts(category_key: &str, current_list: ListType, rules: &RuleSet, categories: &CategoryTable) -> bool {
    categories
        .members(category_key)
        .iter()
        .any(|domain| !domain_conflicts(domain, current_list, rules, categories).is_empty())
}

/// Conflicts for a rule shown in `current_list`
///
/// Domain rules check their own domain; category rules check every member.
pub fn site_conflicts(site: &BlockedSite, current_list: ListType, rules: &RuleSet, categories: &CategoryTable) -> Vec<Conflict> {
    let mut conflicts: Vec<Conflict> = Vec::new();
    for domain in site.domains(categories) {
        for conflict in domain_conflicts(domain, current_list, rules, categories) {
            if !conflicts.iter().any(|c| c.list_type == conflict.list_type) {
                conflicts.push(conflict);
            }
        }
    }

    conflicts.sort_by(|a, b| b.list_type.priority().cmp(&a.list_type.priority()));
    conflicts
}

/// Whether a rule shown in `current_list` overlaps any other list
pub fn site_has_conflicts(site: &BlockedSite, current_list: ListType, rules: &RuleSet, categories: &CategoryTable) -> bool {
    match site.kind {
        RuleKind::Domain => !domain_conflicts(&site.domain, current_list, rules, categories).is_empty(),
        RuleKind::Category => category_has_conflicts(&site.category, current_list, rules, categories),
    }
}

/// Advisory text for a conflict badge
///
/// Conflicts arrive sorted by priority, so the first entry that yields a
/// message decides it.
pub fn build_conflict_message(current_list: ListType, conflicts: &[Conflict]) -> &'static str {
    conflicts
        .iter()
        .find_map(|conflict| match (current_list, conflict.list_type) {
            (ListType::Blocklist, ListType::Greylist) => Some("BLOCKLIST OVERRIDES GREYLIST"),
            (ListType::Blocklist, ListType::Whitelist) => Some("BLOCKLIST OVERRIDES WHITELIST"),
            (ListType::Greylist | ListType::Whitelist, ListType::Blocklist) => Some("BLOCKLIST RULE APPLIED"),
            (ListType::Greylist, ListType::Whitelist) | (ListType::Whitelist, ListType::Greylist) => {
                Some("GREYLIST OVERRIDES WHITELIST")
            }
            _ => None,
        })
        .unwrap_or("")
}
