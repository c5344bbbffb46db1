use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::anyhow;
use serde_derive::{Deserialize, Serialize};

use crate::errors::*;
use crate::policy::AccessPolicy;
use crate::roles::{NamedRole, RoleMappingRule};

pub const DEFAULT_LDAP_PORT: u16 = 389;
pub const DEFAULT_USER_ATTR: &str = "uid";
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub ldap: LdapConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct LdapConfig {
    // master switch; nothing is checked when this is false
    pub use_ldap: bool,
    pub host: String,
    // 0 means the default LDAP port
    pub port: u16,
    // upgrade the plain connection with StartTLS
    pub use_ssl: bool,
    // verify the server certificate during StartTLS (off by default for a diagnostic tool)
    pub verify_tls: bool,
    // bind as the user being checked instead of the bind user below
    pub self_auth: bool,
    // either username for AD or bind DN for LDAP
    pub bind_user: String,
    // bind user's password
    pub bind_pass: String,
    // default base DN for both user and group searches
    pub base: String,
    // connect timeout; transport default when unset
    pub timeout_secs: Option<u64>,

    pub user_search: UserSearchConfig,
    pub group_search: GroupSearchConfig,
    pub roles: Vec<RoleConfig>,

    pub allowed_users: Vec<String>,
    pub blocked_users: Vec<String>,
    pub required_groups: Vec<String>,
    pub forbidden_groups: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct UserSearchConfig {
    // DN to start the search from (e.g. "cn=People,dc=example,dc=com"). Falls back to `base`.
    pub dn: String,
    // Optional filter AND-ed with the user match (e.g. "(objectClass=organizationalPerson)")
    pub filter: String,
    // attribute the login name is matched against (defaults to "uid")
    pub user_attr: String,
    // attribute holding the user's display name
    pub name_attr: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct GroupSearchConfig {
    // DN to start the search from (e.g. "cn=Groups,dc=example,dc=com"). Falls back to `base`.
    pub dn: String,
    // Optional filter AND-ed with the membership match (e.g. "(objectClass=posixGroup)")
    pub filter: String,
    // Groups are found with `(<group_attr>=<value of user_attr on the user>)`,
    // e.g. the "memberUid" of a group matching the "uid" of the user.
    pub user_attr: String,
    pub group_attr: String,
    // attribute of the group that represents its name
    pub name_attr: String,
    pub group_prefix: String,
    pub group_suffix: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct RoleConfig {
    pub group_prefix: String,
    pub group_suffix: String,
    // group attribute to match against; defaults to group_search.name_attr
    pub name_attr: String,
    pub role: String,
}

impl LdapConfig {
    pub fn port(&self) -> u16 {
        if self.port == 0 {
            DEFAULT_LDAP_PORT
        } else {
            self.port
        }
    }

    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port())
        } else {
            format!("{}:{}", self.host, self.port())
        }
    }

    pub fn url(&self) -> String {
        format!("ldap://{}", self.address())
    }

    pub fn user_search_base(&self) -> &str {
        if self.user_search.dn.is_empty() {
            &self.base
        } else {
            &self.user_search.dn
        }
    }

    pub fn group_search_base(&self) -> &str {
        if self.group_search.dn.is_empty() {
            &self.base
        } else {
            &self.group_search.dn
        }
    }

    pub fn user_attr(&self) -> &str {
        if self.user_search.user_attr.is_empty() {
            DEFAULT_USER_ATTR
        } else {
            &self.user_search.user_attr
        }
    }

    // The service bind is skipped entirely when there is nothing to bind with.
    pub fn wants_initial_bind(&self) -> bool {
        !self.bind_user.is_empty() || !self.bind_pass.is_empty() || self.self_auth
    }

    pub fn group_rule(&self) -> RoleMappingRule {
        RoleMappingRule::new(&self.group_search.group_prefix, &self.group_search.group_suffix)
    }

    pub fn named_roles(&self) -> Vec<NamedRole> {
        self.roles
            .iter()
            .map(|r| NamedRole {
                role: r.role.clone(),
                rule: RoleMappingRule::new(&r.group_prefix, &r.group_suffix),
                name_attr: if r.name_attr.is_empty() {
                    self.group_search.name_attr.clone()
                } else {
                    r.name_attr.clone()
                },
            })
            .collect()
    }

    // Every distinct group attribute needed to name groups, group_search.name_attr first.
    pub fn group_name_attrs(&self) -> Vec<String> {
        let mut attrs: Vec<String> = vec![];
        let candidates = std::iter::once(self.group_search.name_attr.clone())
            .chain(self.named_roles().into_iter().map(|r| r.name_attr));
        for attr in candidates {
            if !attr.is_empty() && !attrs.contains(&attr) {
                attrs.push(attr);
            }
        }
        attrs
    }

    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy {
            allowed_users: self.allowed_users.clone(),
            blocked_users: self.blocked_users.clone(),
            required_groups: self.required_groups.clone(),
            forbidden_groups: self.forbidden_groups.clone(),
        }
    }

    // Group lookup needs the correlation attributes and a name attribute.
    pub fn resolves_groups(&self) -> bool {
        !self.group_search.user_attr.is_empty()
            && !self.group_search.group_attr.is_empty()
            && !self.group_search.name_attr.is_empty()
    }

    // A zero timeout means unset, like a zero port.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|t| *t > 0).map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(anyhow!("LDAP host is not set"));
        }
        Ok(())
    }

    // Copy safe to print: secrets are masked.
    pub fn redacted(&self) -> LdapConfig {
        let mut copy = self.clone();
        if !copy.bind_pass.is_empty() {
            copy.bind_pass = "********".into();
        }
        copy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> ConfigFormat {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// The config file that sits next to the running executable.
pub fn default_path() -> PathBuf {
    match std::env::current_exe() {
        Ok(mut path) => {
            path.pop();
            path.push(DEFAULT_CONFIG_FILE);
            path
        }
        Err(_) => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

pub fn new(config_file: PathBuf) -> Result<Config> {
    let mut config_file_open = fs::File::open(&config_file)
        .map_err(|e| anyhow!("Error opening config {}: {}", config_file.display(), e))?;
    let mut config_contents = String::new();
    config_file_open.read_to_string(&mut config_contents)?;

    parse_string(&config_contents, ConfigFormat::from_path(&config_file))
        .map_err(|e| anyhow!("{} ({})", e, config_file.display()))
}

pub fn parse_string(config_contents: &str, format: ConfigFormat) -> Result<Config> {
    match format {
        ConfigFormat::Yaml => serde_yaml::from_str::<Config>(config_contents)
            .map_err(|e| anyhow!("Error parsing config: {}", e)),
        ConfigFormat::Toml => toml::from_str::<Config>(config_contents)
            .map_err(|e| anyhow!("Error parsing config: {}", e)),
    }
}
