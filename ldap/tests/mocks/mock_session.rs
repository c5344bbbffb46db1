use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;

use maplit::hashmap;

use ldapcheck_ldap::api::Session;
use ldapcheck_ldap::errors::*;
use ldapcheck_ldap::models::*;

pub struct MockSession {
    bind_calls: Mutex<Vec<MockCall<()>>>,
    search_calls: Mutex<Vec<MockCall<Vec<DirectoryEntry>>>>,
    close_count: Arc<Mutex<usize>>,
}

#[derive(Debug)]
struct MockCall<T> {
    args: Vec<String>,
    ret: Result<T>,
}

impl<T> MockCall<T> {
    pub fn new(ret: Result<T>, args: Vec<&str>) -> MockCall<T> {
        MockCall {
            ret,
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl MockSession {
    pub fn new() -> MockSession {
        MockSession {
            bind_calls: Mutex::new(vec![]),
            search_calls: Mutex::new(vec![]),
            close_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn mock_bind(&self, dn: &str, password: &str, ret: Result<()>) {
        self.bind_calls
            .lock()
            .unwrap()
            .push(MockCall::new(ret, vec![dn, password]));
    }

    pub fn mock_search(
        &self,
        base: &str,
        filter: &str,
        attrs: &[&str],
        ret: Result<Vec<DirectoryEntry>>,
    ) {
        let attrs = attrs.join(",");
        self.search_calls
            .lock()
            .unwrap()
            .push(MockCall::new(ret, vec![base, filter, attrs.as_str()]));
    }

    // Shared so it can be read after the session is dropped.
    pub fn close_count(&self) -> Arc<Mutex<usize>> {
        self.close_count.clone()
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        if !thread::panicking() {
            assert!(
                self.bind_calls.lock().unwrap().len() == 0,
                "Unmet bind calls: {:?}",
                *self.bind_calls.lock().unwrap()
            );
            assert!(
                self.search_calls.lock().unwrap().len() == 0,
                "Unmet search calls: {:?}",
                *self.search_calls.lock().unwrap()
            );
        }
    }
}

impl Session for MockSession {
    fn bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let mut calls = self.bind_calls.lock().unwrap();
        assert!(calls.len() > 0, "Unexpected call to bind {}", dn);
        let call = calls.remove(0);
        assert_eq!(call.args[0], dn);
        assert_eq!(call.args[1], password);

        call.ret
    }

    fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<DirectoryEntry>> {
        let mut calls = self.search_calls.lock().unwrap();
        assert!(
            calls.len() > 0,
            "Unexpected call to search {}",
            criteria.filter
        );
        let call = calls.remove(0);
        assert_eq!(call.args[0], criteria.base_dn);
        assert_eq!(call.args[1], criteria.filter);
        assert_eq!(call.args[2], criteria.attributes.join(","));
        assert_eq!(Scope::Subtree, criteria.scope);

        call.ret
    }

    fn close(&mut self) {
        *self.close_count.lock().unwrap() += 1;
    }
}

pub fn entry(dn: &str, attrs: HashMap<&str, Vec<&str>>) -> DirectoryEntry {
    let attributes: HashMap<String, Vec<String>> = attrs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.into_iter().map(|s| s.to_string()).collect()))
        .collect();
    DirectoryEntry::new(dn, attributes)
}

pub fn group(name: &str) -> DirectoryEntry {
    entry(
        &format!("cn={},ou=Groups,dc=example,dc=com", name),
        hashmap! { "cn" => vec![name] },
    )
}
