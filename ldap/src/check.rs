use std::collections::HashMap;

use ldap3::dn_escape;
use log::{info, warn};

use ldapcheck_lib::config::LdapConfig;
use ldapcheck_lib::policy::AccessDecision;
use ldapcheck_lib::roles::{self, GrantedRole};

use crate::api::Session;
use crate::errors::*;
use crate::models::DirectoryEntry;
use crate::resolver::{self, GroupResolver, UserResolver};

/// Everything learned about one user in a check run.
#[derive(Debug)]
pub struct CheckReport {
    pub user: DirectoryEntry,
    // value of the configured user attribute
    pub username: String,
    pub cn: String,
    pub mail: String,
    pub display_name: String,
    // set when user_search.name_attr overrides the display name
    pub name_override: Option<String>,
    pub groups: Vec<String>,
    pub matched_groups: Vec<String>,
    pub roles: Vec<GrantedRole>,
    pub access: AccessDecision,
}

/// DN used to bind as the user being checked when `self_auth` is on.
pub fn self_bind_dn(config: &LdapConfig, username: &str) -> String {
    format!(
        "{}={},{}",
        config.user_attr(),
        dn_escape(username),
        config.user_search_base()
    )
}

/// Binds before searching: as the user with `self_auth`, else as the configured bind user.
/// Nothing is bound when neither is configured and the search runs anonymously.
pub fn initial_bind<S: Session + ?Sized>(
    session: &mut S,
    config: &LdapConfig,
    username: &str,
    password: &str,
) -> Result<()> {
    if !config.wants_initial_bind() {
        info!("No bind user configured, searching anonymously");
        return Ok(());
    }

    if config.self_auth {
        let dn = self_bind_dn(config, username);
        info!("Self auth is set, binding as {}", dn);
        session.bind(&dn, password)?;
    } else {
        info!("Binding with bind user set in config: {}", config.bind_user);
        session.bind(&config.bind_user, &config.bind_pass)?;
    }

    info!("Bind complete");
    Ok(())
}

/// Runs the whole check against an already connected session.
pub fn run<S: Session + ?Sized>(
    session: &mut S,
    config: &LdapConfig,
    username: &str,
    password: &str,
) -> Result<CheckReport> {
    initial_bind(session, config, username, password)?;

    let user = UserResolver::new(config).resolve(session, username, password)?;
    info!("Credentials verified for {}", user.dn());

    let name_override = if config.user_search.name_attr.is_empty() {
        None
    } else {
        Some(user.get_attr(&config.user_search.name_attr))
    };

    let group_entries = if config.resolves_groups() {
        GroupResolver::new(config).resolve_entries(session, &user)?
    } else {
        warn!("group_search.user_attr, group_attr or name_attr not set, skipping group lookup");
        vec![]
    };

    let names_by_attr: HashMap<String, Vec<String>> = config
        .group_name_attrs()
        .into_iter()
        .map(|attr| {
            let names = resolver::group_names(&group_entries, &attr);
            (attr, names)
        })
        .collect();
    let groups = names_by_attr
        .get(&config.group_search.name_attr)
        .cloned()
        .unwrap_or_default();
    info!("Got group names: [{}]", groups.join(", "));

    let rule = config.group_rule();
    info!(
        "Filtering group names with prefix '{}' and suffix '{}'",
        rule.prefix, rule.suffix
    );
    let matched_groups = roles::match_roles(&groups, &[rule]);
    info!("Matched group names: [{}]", matched_groups.join(", "));

    let granted = roles::map_roles(&config.named_roles(), &names_by_attr);
    let access = config.access_policy().evaluate(username, &groups);

    Ok(CheckReport {
        username: user.get_attr(config.user_attr()),
        cn: user.get_attr("cn"),
        mail: user.get_attr("mail"),
        display_name: user.get_attr("displayName"),
        name_override,
        user,
        groups,
        matched_groups,
        roles: granted,
        access,
    })
}
