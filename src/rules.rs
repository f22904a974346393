/// Rule data: blocked sites, list membership and the category table
use crate::domain::normalize_domain;
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Which list a rule belongs to
///
/// Stored as "blocklist" / "greylist" / "whitelist". The legacy name
/// "blacklist" and any unknown value read back as the blocklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ListType {
    Blocklist,
    Greylist,
    Whitelist,
}

impl ListType {
    pub const ALL: [ListType; 3] = [ListType::Blocklist, ListType::Greylist, ListType::Whitelist];

    /// Precedence rank, higher wins
    pub fn priority(self) -> u8 {
        match self {
            ListType::Blocklist => 3,
            ListType::Greylist => 2,
            ListType::Whitelist => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ListType::Blocklist => "blocklist",
            ListType::Greylist => "greylist",
            ListType::Whitelist => "whitelist",
        }
    }

    pub fn parse(value: &str) -> ListType {
        match value {
            "greylist" => ListType::Greylist,
            "whitelist" => ListType::Whitelist,
            _ => ListType::Blocklist,
        }
    }
}

impl From<String> for ListType {
    fn from(value: String) -> Self {
        ListType::parse(&value)
    }
}

impl From<ListType> for String {
    fn from(value: ListType) -> Self {
        value.as_str().to_string()
    }
}

/// Whether a rule targets one domain or a named category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Domain,
    Category,
}

fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

fn default_category() -> String {
    "custom".to_string()
}

/// A rule ("blocked site" entry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedSite {
    pub id: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub kind: RuleKind,
    #[serde(default = "default_category")]
    pub category: String,
    pub list_type: ListType,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub redirect_count: u64,
}

impl BlockedSite {
    pub fn domain_rule(domain: &str, list_type: ListType) -> BlockedSite {
        BlockedSite {
            id: new_rule_id(),
            domain: normalize_domain(domain),
            kind: RuleKind::Domain,
            category: default_category(),
            list_type,
            redirect_count: 0,
        }
    }

    pub fn category_rule(category: &str, list_type: ListType) -> BlockedSite {
        BlockedSite {
            id: new_rule_id(),
            domain: category.to_string(),
            kind: RuleKind::Category,
            category: category.to_string(),
            list_type,
            redirect_count: 0,
        }
    }

    /// Domain string or category key, depending on the kind
    pub fn target(&self) -> &str {
        match self.kind {
            RuleKind::Domain => &self.domain,
            RuleKind::Category => &self.category,
        }
    }

    /// Concrete domains this rule covers; a missing category covers nothing
    pub fn domains<'a>(&'a self, categories: &'a CategoryTable) -> Vec<&'a str> {
        match self.kind {
            RuleKind::Domain => vec![self.domain.as_str()],
            RuleKind::Category => categories.members(&self.category).iter().map(String::as_str).collect(),
        }
    }
}

fn new_rule_id() -> String {
    Uuid::new_v4().simple().to_string()[..9].to_string()
}

/// Category key → member domains
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTable {
    pub categories: BTreeMap<String, Vec<String>>,
}

impl CategoryTable {
    pub fn new() -> Self {
        CategoryTable {
            categories: BTreeMap::new(),
        }
    }

    /// The table a fresh install starts with
    pub fn defaults() -> Self {
        let table: [(&str, &[&str]); 5] = [
            ("social", &["x.com", "twitter.com", "facebook.com", "instagram.com", "linkedin.com", "tiktok.com", "reddit.com", "threads.net", "pinterest.com", "snapchat.com"]),
            ("news", &["cnn.com", "nytimes.com", "bbc.com", "reuters.com", "theguardian.com"]),
            ("shopping", &["amazon.com", "ebay.com", "etsy.com", "walmart.com", "target.com"]),
            ("entertainment", &["youtube.com", "netflix.com", "hulu.com", "disney.com", "spotify.com"]),
            ("custom", &[]),
        ];

        CategoryTable {
            categories: table
                .iter()
                .map(|(key, domains)| (key.to_string(), domains.iter().map(|d| d.to_string()).collect()))
                .collect(),
        }
    }

    pub fn members(&self, key: &str) -> &[String] {
        self.categories.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.categories.contains_key(key)
    }

    pub fn add_member(&mut self, key: &str, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return false;
        }
        let members = self.categories.entry(key.to_string()).or_default();
        if members.contains(&domain) {
            return false;
        }
        members.push(domain);
        true
    }

    pub fn remove_member(&mut self, key: &str, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        match self.categories.get_mut(key) {
            Some(members) => {
                let original_len = members.len();
                members.retain(|d| normalize_domain(d) != domain);
                members.len() < original_len
            }
            None => false,
        }
    }
}

/// The flat rule collection
///
/// Reading is per entry: a malformed rule is dropped with a warning and
/// the rest still load.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    pub sites: Vec<BlockedSite>,
}

impl<'de> Deserialize<'de> for RuleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<Value>::deserialize(deserializer)?;
        let sites = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<BlockedSite>(entry) {
                Ok(site) => Some(site),
                Err(err) => {
                    warn!("Dropping unreadable rule: {}", err);
                    None
                }
            })
            .collect();
        Ok(RuleSet { sites })
    }
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet { sites: Vec::new() }
    }

    pub fn from_sites(sites: Vec<BlockedSite>) -> Self {
        RuleSet { sites }
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&BlockedSite> {
        self.sites.iter().find(|s| s.id == id)
    }

    /// Add a domain rule; blank values and duplicates within a list are ignored
    pub fn add_site(&mut self, value: &str, list_type: ListType, category: Option<&str>) -> Option<&BlockedSite> {
        let domain = normalize_domain(value);
        if domain.is_empty() {
            return None;
        }
        let exists = self
            .sites
            .iter()
            .any(|s| s.kind == RuleKind::Domain && s.list_type == list_type && s.domain == domain);
        if exists {
            debug!("{} already on the {}", domain, list_type.as_str());
            return None;
        }

        let mut site = BlockedSite::domain_rule(&domain, list_type);
        if let Some(category) = category {
            site.category = category.to_string();
        }
        self.sites.push(site);
        self.sites.last()
    }

    /// Add a rule backed by a whole category
    pub fn add_category(&mut self, key: &str, list_type: ListType) -> Option<&BlockedSite> {
        let exists = self
            .sites
            .iter()
            .any(|s| s.kind == RuleKind::Category && s.list_type == list_type && s.category == key);
        if exists || key.is_empty() {
            return None;
        }
        self.sites.push(BlockedSite::category_rule(key, list_type));
        self.sites.last()
    }

    /// Quick-block from the context menu or keyboard shortcut
    pub fn block_domain(&mut self, domain: &str) -> bool {
        self.add_site(domain, ListType::Blocklist, None).is_some()
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let original_len = self.sites.len();
        self.sites.retain(|s| s.id != id);
        self.sites.len() < original_len
    }

    /// Rename a rule in place
    ///
    /// Domain rules take the normalized new domain. Category rules rename the
    /// category key in the table and in every rule that references it,
    /// including the `category` label of domain rules filed under that key.
    pub fn rename(&mut self, id: &str, new_name: &str, categories: &mut CategoryTable) -> bool {
        let Some(site) = self.get(id).cloned() else {
            return false;
        };

        match site.kind {
            RuleKind::Domain => {
                let domain = normalize_domain(new_name);
                if domain.is_empty() {
                    return false;
                }
                self.sites
                    .iter_mut()
                    .find(|s| s.id == id)
                    .map(|s| s.domain = domain)
                    .is_some()
            }
            RuleKind::Category => {
                let new_key = new_name.trim();
                if new_key.is_empty() || categories.contains(new_key) {
                    return false;
                }
                let members = categories.categories.remove(&site.category).unwrap_or_default();
                categories.categories.insert(new_key.to_string(), members);
                for s in self.sites.iter_mut().filter(|s| s.category == site.category) {
                    s.category = new_key.to_string();
                    if s.kind == RuleKind::Category {
                        s.domain = new_key.to_string();
                    }
                }
                true
            }
        }
    }

    pub fn reassign_list(&mut self, id: &str, list_type: ListType) -> bool {
        self.sites
            .iter_mut()
            .find(|s| s.id == id)
            .map(|site| {
                site.list_type = list_type;
            })
            .is_some()
    }

    /// Drag a domain rule onto another rule of the same list
    ///
    /// Dropping onto a category rule adds the domain to that category.
    /// Dropping onto a domain rule turns the target into a new category
    /// holding both domains. The dragged rule is removed either way.
    /// Returns the category key that now holds the dragged domain.
    pub fn merge_into_category(&mut self, dragged_id: &str, target_id: &str, categories: &mut CategoryTable) -> Option<String> {
        if dragged_id == target_id {
            return None;
        }
        let dragged = self.get(dragged_id)?.clone();
        let target = self.get(target_id)?.clone();
        if dragged.kind != RuleKind::Domain || dragged.list_type != target.list_type {
            return None;
        }

        let key = match target.kind {
            RuleKind::Category => target.category.clone(),
            RuleKind::Domain => {
                let key = format!("group-{}", &Uuid::new_v4().simple().to_string()[..8]);
                categories.add_member(&key, &target.domain);
                let site = self.sites.iter_mut().find(|s| s.id == target_id)?;
                site.kind = RuleKind::Category;
                site.category = key.clone();
                site.domain = key.clone();
                key
            }
        };

        categories.add_member(&key, &dragged.domain);
        self.remove(dragged_id);
        Some(key)
    }

    /// Pull one domain out of a category rule into its own domain rule
    pub fn split_out_of_category(&mut self, category_rule_id: &str, domain: &str, categories: &mut CategoryTable) -> Option<String> {
        let site = self.get(category_rule_id)?.clone();
        if site.kind != RuleKind::Category || !categories.remove_member(&site.category, domain) {
            return None;
        }
        let split = BlockedSite::domain_rule(domain, site.list_type);
        let id = split.id.clone();
        self.sites.push(split);
        Some(id)
    }

    /// Count one redirect against a rule
    pub fn record_hit(&mut self, id: &str) -> Option<u64> {
        self.sites.iter_mut().find(|s| s.id == id).map(|site| {
            site.redirect_count += 1;
            site.redirect_count
        })
    }
}

/// Suggest a default category key for a newly added domain
pub fn suggest_category(domain: &str) -> &'static str {
    const KEYWORDS: [(&str, &[&str]); 4] = [
        ("social", &["twitter", "facebook", "instagram", "tiktok", "linkedin", "reddit", "threads", "bluesky", "pinterest", "snapchat", "whatsapp", "telegram", "discord"]),
        ("shopping", &["amazon", "ebay", "shopify", "etsy", "temu", "shein", "walmart", "target", "bestbuy", "aliexpress", "nike", "ikea"]),
        ("news", &["cnn", "bbc", "nytimes", "fox", "washingtonpost", "reuters", "wsj", "bloomberg", "theguardian", "guardian", "npr", "forbes", "usatoday"]),
        ("entertainment", &["netflix", "hulu", "youtube", "twitch", "primevideo", "disneyplus", "disney", "hbo", "spotify", "apple.com/tv", "roblox", "steam"]),
    ];

    let domain = domain.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| domain.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or("custom")
}
