use std::collections::HashMap;

use log::debug;

/// A prefix/suffix pair classifying group names. Empty parts impose no constraint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleMappingRule {
    pub prefix: String,
    pub suffix: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleMatch {
    Matched,
    TooShortForPrefix,
    TooShortForSuffix,
    PrefixMismatch,
    SuffixMismatch,
}

impl RoleMappingRule {
    pub fn new(prefix: &str, suffix: &str) -> RoleMappingRule {
        RoleMappingRule {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }
    }

    // Both length checks run before any comparison.
    pub fn check(&self, name: &str) -> RuleMatch {
        if name.len() < self.prefix.len() {
            return RuleMatch::TooShortForPrefix;
        }
        if name.len() < self.suffix.len() {
            return RuleMatch::TooShortForSuffix;
        }
        if !name.starts_with(&self.prefix) {
            return RuleMatch::PrefixMismatch;
        }
        if !name.ends_with(&self.suffix) {
            return RuleMatch::SuffixMismatch;
        }
        RuleMatch::Matched
    }

    pub fn matches(&self, name: &str) -> bool {
        self.check(name) == RuleMatch::Matched
    }
}

/// A named application role granted by membership in a matching group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedRole {
    pub role: String,
    pub rule: RoleMappingRule,
    // group attribute whose values are matched against `rule`
    pub name_attr: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantedRole {
    pub role: String,
    pub groups: Vec<String>,
}

/// Keeps the group names satisfying at least one rule, in input order.
pub fn match_roles(group_names: &[String], rules: &[RoleMappingRule]) -> Vec<String> {
    group_names
        .iter()
        .filter(|name| {
            let results: Vec<RuleMatch> = rules.iter().map(|r| r.check(name)).collect();
            let matched = results.contains(&RuleMatch::Matched);
            if matched {
                debug!("Group name '{}' matches", name);
            } else {
                debug!("Group name '{}' does not match: {:?}", name, results);
            }
            matched
        })
        .cloned()
        .collect()
}

/// Grants every role with at least one matching group, in role declaration order.
///
/// `names_by_attr` maps a group attribute name to the user's group names under that attribute.
pub fn map_roles(
    roles: &[NamedRole],
    names_by_attr: &HashMap<String, Vec<String>>,
) -> Vec<GrantedRole> {
    roles
        .iter()
        .filter_map(|role| {
            let names = names_by_attr
                .get(&role.name_attr)
                .map(|n| n.as_slice())
                .unwrap_or(&[]);
            let groups = match_roles(names, std::slice::from_ref(&role.rule));
            if groups.is_empty() {
                None
            } else {
                Some(GrantedRole {
                    role: role.role.clone(),
                    groups,
                })
            }
        })
        .collect()
}
