use ldap3::ldap_escape;
use log::{debug, info, warn};

use ldapcheck_lib::config::LdapConfig;

use crate::api::Session;
use crate::errors::*;
use crate::models::*;

/// Attributes always requested for a user, before the configured ones.
pub const BASE_USER_ATTRIBUTES: [&str; 6] = ["dn", "cn", "uid", "displayName", "mail", "ou"];

/// `(<attr>=<escaped value>)`, AND-ed with `extra` when one is configured.
pub fn equality_filter(attr: &str, value: &str, extra: &str) -> String {
    let filter = format!("({}={})", attr, ldap_escape(value));
    if extra.is_empty() {
        filter
    } else {
        format!("(&{}{})", extra, filter)
    }
}

pub struct UserResolver<'a> {
    config: &'a LdapConfig,
}

impl<'a> UserResolver<'a> {
    pub fn new(config: &'a LdapConfig) -> UserResolver<'a> {
        UserResolver { config }
    }

    pub fn criteria(&self, username: &str) -> SearchCriteria {
        let search = &self.config.user_search;
        let filter = equality_filter(self.config.user_attr(), username, &search.filter);

        let mut attributes: Vec<String> =
            BASE_USER_ATTRIBUTES.iter().map(|a| a.to_string()).collect();
        for attr in [&search.name_attr, &search.user_attr] {
            if !attr.is_empty() && !attributes.contains(attr) {
                attributes.push(attr.clone());
            }
        }

        SearchCriteria::subtree(self.config.user_search_base(), &filter, attributes)
    }

    /// Finds the single entry for `username`, then verifies `password` by binding as it.
    pub fn resolve<S: Session + ?Sized>(
        &self,
        session: &mut S,
        username: &str,
        password: &str,
    ) -> Result<DirectoryEntry> {
        let req = self.criteria(username);
        info!(
            "Searching for LDAP users: base: {}, filter: {}, attributes: {:?}",
            req.base_dn, req.filter, req.attributes
        );

        let mut entries = session.search(&req)?;
        if entries.len() != 1 {
            return Err(Error::AmbiguousOrMissingUser {
                username: username.to_string(),
                count: entries.len(),
            });
        }
        let user = entries.remove(0);

        info!("Binding as returned user to verify credentials: {}", user.dn());
        session
            .bind(user.dn(), password)
            .map_err(|e| Error::CredentialMismatch {
                dn: user.dn().to_string(),
                reason: match e {
                    Error::Bind { reason, .. } => reason,
                    other => other.to_string(),
                },
            })?;

        Ok(user)
    }
}

pub struct GroupResolver<'a> {
    config: &'a LdapConfig,
}

impl<'a> GroupResolver<'a> {
    pub fn new(config: &'a LdapConfig) -> GroupResolver<'a> {
        GroupResolver { config }
    }

    pub fn criteria(&self, member_value: &str) -> SearchCriteria {
        let search = &self.config.group_search;
        let filter = equality_filter(&search.group_attr, member_value, &search.filter);

        SearchCriteria::subtree(
            self.config.group_search_base(),
            &filter,
            self.config.group_name_attrs(),
        )
    }

    /// One search per value of the correlation attribute on `user`, results kept in search order.
    pub fn resolve_entries<S: Session + ?Sized>(
        &self,
        session: &mut S,
        user: &DirectoryEntry,
    ) -> Result<Vec<DirectoryEntry>> {
        let user_attr = &self.config.group_search.user_attr;
        let values = user.get_attrs(user_attr);
        if values.is_empty() {
            warn!("User {} has no '{}' values to match groups by", user.dn(), user_attr);
        }

        let mut groups = vec![];
        for value in values {
            info!("Finding user's groups, user search attr: {}", value);

            let req = self.criteria(&value);
            debug!(
                "Searching for LDAP groups: base: {}, filter: {}, attributes: {:?}",
                req.base_dn, req.filter, req.attributes
            );

            let found = session.search(&req)?;
            debug!("Found {} group entries for {}", found.len(), value);
            groups.extend(found);
        }

        if groups.is_empty() {
            warn!("No groups found from LDAP search");
        }
        Ok(groups)
    }

    /// Group names under `group_search.name_attr`, duplicates included.
    pub fn resolve<S: Session + ?Sized>(
        &self,
        session: &mut S,
        user: &DirectoryEntry,
    ) -> Result<Vec<String>> {
        let groups = self.resolve_entries(session, user)?;
        let names = group_names(&groups, &self.config.group_search.name_attr);
        info!("Found {} groups for user", names.len());
        Ok(names)
    }
}

/// First value of `name_attr` per entry, skipping entries without one.
pub fn group_names(groups: &[DirectoryEntry], name_attr: &str) -> Vec<String> {
    groups
        .iter()
        .map(|g| g.get_attr(name_attr))
        .filter(|name| !name.is_empty())
        .collect()
}
