use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings, SearchEntry};
use log::{debug, info, warn};

use ldapcheck_lib::config::LdapConfig;

use crate::errors::*;
use crate::models::*;

/// The directory operations a check run needs.
pub trait Session {
    fn bind(&mut self, dn: &str, password: &str) -> Result<()>;
    fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<DirectoryEntry>>;
    // Safe to call more than once.
    fn close(&mut self);
}

pub struct LdapSession {
    addr: String,
    conn: Option<LdapConn>,
}

impl LdapSession {
    pub fn connect(config: &LdapConfig) -> Result<LdapSession> {
        let addr = config.address();
        let timeout = config.connect_timeout();

        // dial first so an unreachable host is not reported as a TLS failure
        info!("Attempting to dial the LDAP server at {}...", addr);
        dial(&addr, timeout)?;

        let mut settings = LdapConnSettings::new()
            .set_starttls(config.use_ssl)
            .set_no_tls_verify(!config.verify_tls);
        if let Some(t) = timeout {
            settings = settings.set_conn_timeout(t);
        }
        if config.use_ssl {
            info!("Attempting to start TLS on the LDAP connection...");
        }

        let conn = LdapConn::with_settings(settings, &config.url()).map_err(|e| {
            if config.use_ssl {
                Error::Tls {
                    addr: addr.clone(),
                    reason: e.to_string(),
                }
            } else {
                Error::Connection {
                    addr: addr.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        info!("Connected to LDAP server at {}", addr);
        if config.use_ssl {
            info!("Start TLS complete");
        }

        Ok(LdapSession {
            addr,
            conn: Some(conn),
        })
    }

    fn conn(&mut self) -> Option<&mut LdapConn> {
        self.conn.as_mut()
    }
}

fn dial(addr: &str, timeout: Option<Duration>) -> Result<()> {
    let conn_err = |reason: String| Error::Connection {
        addr: addr.to_string(),
        reason,
    };

    let sock_addrs: Vec<SocketAddr> = addr
        .to_socket_addrs()
        .map_err(|e| conn_err(format!("Could not resolve host: {}", e)))?
        .collect();

    let mut last_err = None;
    for sock_addr in &sock_addrs {
        let res = match timeout {
            Some(t) => TcpStream::connect_timeout(sock_addr, t),
            None => TcpStream::connect(sock_addr),
        };
        match res {
            Ok(_) => return Ok(()),
            Err(e) => {
                debug!("Could not connect to {}: {}", sock_addr, e);
                last_err = Some(e);
            }
        }
    }

    Err(conn_err(match last_err {
        Some(e) => e.to_string(),
        None => "no addresses found".into(),
    }))
}

fn to_ldap3_scope(scope: Scope) -> ldap3::Scope {
    match scope {
        Scope::Base => ldap3::Scope::Base,
        Scope::OneLevel => ldap3::Scope::OneLevel,
        Scope::Subtree => ldap3::Scope::Subtree,
    }
}

impl Session for LdapSession {
    fn bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let bind_err = |reason: String| Error::Bind {
            dn: dn.to_string(),
            reason,
        };
        let conn = self
            .conn()
            .ok_or_else(|| bind_err("connection is closed".into()))?;

        conn.simple_bind(dn, password)
            .and_then(ldap3::LdapResult::success)
            .map_err(|e| bind_err(e.to_string()))?;

        Ok(())
    }

    fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<DirectoryEntry>> {
        let search_err = |reason: String| Error::DirectorySearch {
            base: criteria.base_dn.clone(),
            filter: criteria.filter.clone(),
            reason,
        };
        let conn = self
            .conn()
            .ok_or_else(|| search_err("connection is closed".into()))?;

        let attrs: Vec<&str> = criteria.attributes.iter().map(String::as_str).collect();
        let (results, _) = conn
            .search(
                &criteria.base_dn,
                to_ldap3_scope(criteria.scope),
                &criteria.filter,
                attrs,
            )
            .and_then(|r| r.success())
            .map_err(|e| search_err(e.to_string()))?;

        Ok(results
            .into_iter()
            .map(SearchEntry::construct)
            .map(|e| DirectoryEntry::new(&e.dn, e.attrs))
            .collect())
    }

    fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            info!("Closing connection to LDAP server at {}", self.addr);
            if let Err(e) = conn.unbind() {
                warn!("Error unbinding from LDAP server: {}", e);
            }
        }
    }
}

/// Owns an open session and closes it exactly once, on whichever path leaves the scope.
pub struct SessionGuard<S: Session> {
    session: S,
    closed: bool,
}

impl<S: Session> SessionGuard<S> {
    pub fn new(session: S) -> SessionGuard<S> {
        SessionGuard {
            session,
            closed: false,
        }
    }

    pub fn close(mut self) {
        self.close_once();
    }

    fn close_once(&mut self) {
        if !self.closed {
            self.closed = true;
            self.session.close();
        }
    }
}

impl<S: Session> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: Session> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: Session> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.close_once();
    }
}
