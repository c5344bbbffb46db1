mod mocks;

use maplit::hashmap;

use ldapcheck_lib::config::{LdapConfig, RoleConfig};
use ldapcheck_lib::policy::AccessDecision;
use ldapcheck_lib::roles::GrantedRole;
use ldapcheck_ldap::api::SessionGuard;
use ldapcheck_ldap::check;
use ldapcheck_ldap::errors::Error;

use mocks::mock_session::{MockSession, entry, group};

const USER_ATTRS: &[&str] = &["dn", "cn", "uid", "displayName", "mail", "ou"];
const USER_DN: &str = "uid=jdoe,ou=People,dc=example,dc=com";

fn new_config() -> LdapConfig {
    let mut config = LdapConfig {
        use_ldap: true,
        host: "ldap.example.com".into(),
        bind_user: "cn=reader,dc=example,dc=com".into(),
        bind_pass: "reader-pass".into(),
        base: "dc=example,dc=com".into(),
        ..LdapConfig::default()
    };
    config.user_search.dn = "ou=People,dc=example,dc=com".into();
    config.user_search.user_attr = "uid".into();
    config.group_search.dn = "ou=Groups,dc=example,dc=com".into();
    config.group_search.user_attr = "memberOf".into();
    config.group_search.group_attr = "entryDN".into();
    config.group_search.name_attr = "cn".into();
    config.group_search.group_prefix = "eng-".into();
    config.group_search.group_suffix = "-prod".into();
    config
}

fn expect_user(session: &MockSession) {
    session.mock_search(
        "ou=People,dc=example,dc=com",
        "(uid=jdoe)",
        USER_ATTRS,
        Ok(vec![entry(
            USER_DN,
            hashmap! {
                "uid" => vec!["jdoe"],
                "cn" => vec!["John Doe"],
                "mail" => vec!["jdoe@example.com"],
                "displayName" => vec!["Johnny"],
                "memberOf" => vec![
                    "cn=eng-backend-prod,ou=Groups,dc=example,dc=com",
                    "cn=eng-frontend-dev,ou=Groups,dc=example,dc=com",
                ],
            },
        )]),
    );
    session.mock_bind(USER_DN, "the-password", Ok(()));
}

fn expect_groups(session: &MockSession, attrs: &[&str]) {
    session.mock_search(
        "ou=Groups,dc=example,dc=com",
        "(entryDN=cn=eng-backend-prod,ou=Groups,dc=example,dc=com)",
        attrs,
        Ok(vec![entry(
            "cn=eng-backend-prod,ou=Groups,dc=example,dc=com",
            hashmap! {
                "cn" => vec!["eng-backend-prod"],
                "description" => vec!["Backend admins"],
            },
        )]),
    );
    session.mock_search(
        "ou=Groups,dc=example,dc=com",
        "(entryDN=cn=eng-frontend-dev,ou=Groups,dc=example,dc=com)",
        attrs,
        Ok(vec![group("eng-frontend-dev")]),
    );
}

#[test]
fn test_check_end_to_end() {
    let config = new_config();
    let mut session = MockSession::new();

    session.mock_bind("cn=reader,dc=example,dc=com", "reader-pass", Ok(()));
    expect_user(&session);
    expect_groups(&session, &["cn"]);

    let report = check::run(&mut session, &config, "jdoe", "the-password").unwrap();

    assert_eq!(USER_DN, report.user.dn());
    assert_eq!("jdoe", report.username);
    assert_eq!("John Doe", report.cn);
    assert_eq!("jdoe@example.com", report.mail);
    assert_eq!("Johnny", report.display_name);
    assert_eq!(None, report.name_override);
    assert_eq!(vec!["eng-backend-prod", "eng-frontend-dev"], report.groups);
    assert_eq!(vec!["eng-backend-prod"], report.matched_groups);
    assert!(report.roles.is_empty());
    assert_eq!(AccessDecision::Allowed, report.access);
}

#[test]
fn test_check_self_auth() {
    let mut config = new_config();
    config.self_auth = true;
    let mut session = MockSession::new();

    session.mock_bind(USER_DN, "the-password", Ok(()));
    expect_user(&session);
    expect_groups(&session, &["cn"]);

    let report = check::run(&mut session, &config, "jdoe", "the-password").unwrap();
    assert_eq!(vec!["eng-backend-prod"], report.matched_groups);
}

#[test]
fn test_check_anonymous_search() {
    let mut config = new_config();
    config.bind_user = String::new();
    config.bind_pass = String::new();
    let mut session = MockSession::new();

    // only the verification bind happens
    expect_user(&session);
    expect_groups(&session, &["cn"]);

    check::run(&mut session, &config, "jdoe", "the-password").unwrap();
}

#[test]
fn test_check_service_bind_failure() {
    let config = new_config();
    let mut session = MockSession::new();

    session.mock_bind(
        "cn=reader,dc=example,dc=com",
        "reader-pass",
        Err(Error::Bind {
            dn: "cn=reader,dc=example,dc=com".into(),
            reason: "rc=49, invalidCredentials".into(),
        }),
    );

    let res = check::run(&mut session, &config, "jdoe", "the-password");
    match res {
        Err(e @ Error::Bind { .. }) => assert_eq!("bind", e.stage()),
        other => panic!("Unexpected result: {:?}", other),
    }
}

#[test]
fn test_check_name_override() {
    let mut config = new_config();
    config.user_search.name_attr = "displayName".into();
    let mut session = MockSession::new();

    session.mock_bind("cn=reader,dc=example,dc=com", "reader-pass", Ok(()));
    expect_user(&session);
    expect_groups(&session, &["cn"]);

    let report = check::run(&mut session, &config, "jdoe", "the-password").unwrap();
    assert_eq!(Some("Johnny".to_string()), report.name_override);
}

#[test]
fn test_check_roles_and_policy() {
    let mut config = new_config();
    config.roles = vec![
        RoleConfig {
            group_prefix: "eng-".into(),
            role: "engineer".into(),
            ..RoleConfig::default()
        },
        RoleConfig {
            group_prefix: "ops-".into(),
            role: "operator".into(),
            ..RoleConfig::default()
        },
        RoleConfig {
            group_suffix: "admins".into(),
            name_attr: "description".into(),
            role: "admin".into(),
            ..RoleConfig::default()
        },
    ];
    config.forbidden_groups = vec!["eng-frontend-dev".into()];
    let mut session = MockSession::new();

    session.mock_bind("cn=reader,dc=example,dc=com", "reader-pass", Ok(()));
    expect_user(&session);
    expect_groups(&session, &["cn", "description"]);

    let report = check::run(&mut session, &config, "jdoe", "the-password").unwrap();
    assert_eq!(
        vec![
            GrantedRole {
                role: "engineer".into(),
                groups: vec!["eng-backend-prod".into(), "eng-frontend-dev".into()],
            },
            GrantedRole {
                role: "admin".into(),
                groups: vec!["Backend admins".into()],
            },
        ],
        report.roles
    );
    assert_eq!(
        AccessDecision::Denied("member of forbidden group 'eng-frontend-dev'".into()),
        report.access
    );
}

#[test]
fn test_check_auth_only_skips_groups() {
    let mut config = new_config();
    config.group_search.user_attr = String::new();
    config.group_search.group_attr = String::new();
    config.group_search.name_attr = String::new();
    let mut session = MockSession::new();

    // no group searches are mocked: any search after the user lookup fails the test
    session.mock_bind("cn=reader,dc=example,dc=com", "reader-pass", Ok(()));
    expect_user(&session);

    let report = check::run(&mut session, &config, "jdoe", "the-password").unwrap();
    assert_eq!(USER_DN, report.user.dn());
    assert!(report.groups.is_empty());
    assert!(report.matched_groups.is_empty());
    assert_eq!(AccessDecision::Allowed, report.access);
}

#[test]
fn test_guard_closes_once_on_success() {
    let session = MockSession::new();
    let closes = session.close_count();

    let guard = SessionGuard::new(session);
    guard.close();

    assert_eq!(1, *closes.lock().unwrap());
}

#[test]
fn test_guard_closes_once_on_error() {
    let config = new_config();
    let session = MockSession::new();
    let closes = session.close_count();

    session.mock_bind("cn=reader,dc=example,dc=com", "reader-pass", Ok(()));
    session.mock_search(
        "ou=People,dc=example,dc=com",
        "(uid=jdoe)",
        USER_ATTRS,
        Ok(vec![]),
    );

    let res = {
        let mut guard = SessionGuard::new(session);
        check::run(&mut *guard, &config, "jdoe", "the-password")
    };

    assert!(matches!(res, Err(Error::AmbiguousOrMissingUser { count: 0, .. })));
    assert_eq!(1, *closes.lock().unwrap());
}
