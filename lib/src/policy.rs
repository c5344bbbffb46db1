use log::debug;

/// Allow/deny lists checked after a user's groups are known. Empty lists impose nothing.
#[derive(Clone, Debug, Default)]
pub struct AccessPolicy {
    pub allowed_users: Vec<String>,
    pub blocked_users: Vec<String>,
    pub required_groups: Vec<String>,
    pub forbidden_groups: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied(String),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        *self == AccessDecision::Allowed
    }
}

impl AccessPolicy {
    pub fn is_empty(&self) -> bool {
        self.allowed_users.is_empty()
            && self.blocked_users.is_empty()
            && self.required_groups.is_empty()
            && self.forbidden_groups.is_empty()
    }

    // First violation wins.
    pub fn evaluate(&self, username: &str, groups: &[String]) -> AccessDecision {
        if !self.allowed_users.is_empty() && !self.allowed_users.iter().any(|u| u == username) {
            return AccessDecision::Denied(format!("user '{}' is not in allowed_users", username));
        }
        if self.blocked_users.iter().any(|u| u == username) {
            return AccessDecision::Denied(format!("user '{}' is in blocked_users", username));
        }
        if let Some(missing) = self.required_groups.iter().find(|g| !groups.contains(*g)) {
            return AccessDecision::Denied(format!("missing required group '{}'", missing));
        }
        if let Some(forbidden) = self.forbidden_groups.iter().find(|g| groups.contains(*g)) {
            return AccessDecision::Denied(format!("member of forbidden group '{}'", forbidden));
        }

        debug!("Access policy allows user '{}'", username);
        AccessDecision::Allowed
    }
}
