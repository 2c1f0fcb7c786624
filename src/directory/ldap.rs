//! Active Directory over LDAP(S)
//!
//! One bound connection per invocation. Lookups use RFC 4515 escaped filters,
//! new objects RFC 4514 escaped RDNs, and passwords travel as AD's quoted
//! UTF-16LE `unicodePwd` encoding, which the server only accepts over LDAPS.

use super::{
    domain_to_dn, DirectoryError, DirectoryGroup, DirectoryResult, DirectoryService,
    DirectorySession, DirectoryUser, NewGroup, NewUser, UF_DONT_EXPIRE_PASSWD, UF_LOCKOUT,
    UF_NORMAL_ACCOUNT,
};
use crate::config::ExecutionContext;
use crate::error::enhance_ldap_error;
use async_trait::async_trait;
use ldap3::{
    dn_escape, ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, LdapResult, Mod, Scope,
    SearchEntry,
};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const DEFAULT_LDAPS_PORT: u16 = 636;
const CONNECT_TIMEOUT_SECS: u64 = 30;

const USER_ATTRIBUTES: &[&str] = &[
    "distinguishedName",
    "sAMAccountName",
    "userPrincipalName",
    "name",
    "userAccountControl",
    "msDS-User-Account-Control-Computed",
];

const GROUP_ATTRIBUTES: &[&str] = &["distinguishedName", "name", "description"];

type AttrValues = HashSet<Vec<u8>>;

/// LDAP-backed directory service
#[derive(Debug, Clone)]
pub struct LdapDirectory {
    connect_timeout: Duration,
}

impl Default for LdapDirectory {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
        }
    }
}

impl LdapDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryService for LdapDirectory {
    #[instrument(skip(self, context), fields(controller = %context.domain_controller))]
    async fn open(&self, context: &ExecutionContext) -> DirectoryResult<Box<dyn DirectorySession>> {
        let url = ldap_url(&context.domain_controller);
        debug!(url = %url, "Connecting to domain controller");

        let settings = LdapConnSettings::new().set_conn_timeout(self.connect_timeout);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                DirectoryError::Connection(format!("Failed to connect to {}: {}", url, e))
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let username = &context.credential.username;
        let result = ldap
            .simple_bind(username, &context.credential.password)
            .await
            .map_err(|e| DirectoryError::Connection(format!("Bind failed for {}: {}", username, e)))?;

        if result.rc != 0 {
            return Err(DirectoryError::Connection(format!(
                "Bind failed for {}: {}",
                username,
                enhance_ldap_error(result.rc, &result.text)
            )));
        }

        info!(controller = %context.domain_controller, "Bound to domain controller");

        Ok(Box::new(LdapSession {
            ldap,
            base_dn: domain_to_dn(&context.domain_name),
        }))
    }
}

struct LdapSession {
    ldap: Ldap,
    base_dn: String,
}

impl LdapSession {
    async fn search_one(
        &mut self,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Option<SearchEntry>> {
        let (entries, _) = self
            .ldap
            .search(&self.base_dn, Scope::Subtree, filter, attributes.to_vec())
            .await?
            .success()?;

        if entries.len() > 1 {
            warn!(
                filter = %filter,
                count = entries.len(),
                "Lookup matched more than one object, using the first"
            );
        }

        Ok(entries.into_iter().next().map(SearchEntry::construct))
    }

    async fn modify(
        &mut self,
        dn: &str,
        mods: Vec<Mod<Vec<u8>>>,
        action: &str,
    ) -> DirectoryResult<()> {
        let result = self.ldap.modify(dn, mods).await?;
        check(result, action, dn)
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    #[instrument(skip(self))]
    async fn find_user(&mut self, principal_name: &str) -> DirectoryResult<Option<DirectoryUser>> {
        let filter = user_filter(principal_name);
        let entry = self.search_one(&filter, USER_ATTRIBUTES).await?;
        Ok(entry.as_ref().map(user_from_entry))
    }

    #[instrument(skip(self))]
    async fn find_group(&mut self, name: &str) -> DirectoryResult<Option<DirectoryGroup>> {
        let filter = group_filter(name);
        let entry = self.search_one(&filter, GROUP_ATTRIBUTES).await?;
        Ok(entry.as_ref().map(group_from_entry))
    }

    #[instrument(skip(self, user), fields(sam = %user.sam_account_name))]
    async fn create_user(&mut self, user: &NewUser) -> DirectoryResult<DirectoryUser> {
        let dn = rdn_under(&user.display_name, &user.container);
        let account_control = UF_NORMAL_ACCOUNT;

        let mut attrs: Vec<(Vec<u8>, AttrValues)> = vec![
            attr("objectClass", ["top", "person", "organizationalPerson", "user"]),
            attr("cn", [user.display_name.as_str()]),
            attr("sAMAccountName", [user.sam_account_name.as_str()]),
            attr("userPrincipalName", [user.user_principal_name.as_str()]),
            attr("givenName", [user.given_name.as_str()]),
            attr("sn", [user.surname.as_str()]),
            attr("displayName", [user.display_name.as_str()]),
            attr("userAccountControl", [account_control.to_string()]),
            (
                b"unicodePwd".to_vec(),
                HashSet::from([encode_password(&user.password)]),
            ),
        ];
        if let Some(description) = &user.description {
            attrs.push(attr("description", [description.as_str()]));
        }
        if user.change_password_at_logon {
            attrs.push(attr("pwdLastSet", ["0"]));
        }

        let result = self.ldap.add(&dn, attrs).await?;
        check(result, "create user", &dn)?;
        info!(dn = %dn, "User created");

        Ok(DirectoryUser {
            distinguished_name: dn,
            sam_account_name: user.sam_account_name.clone(),
            user_principal_name: user.user_principal_name.clone(),
            name: user.display_name.clone(),
            account_control,
            locked_out: false,
        })
    }

    #[instrument(skip(self, user), fields(dn = %user.distinguished_name))]
    async fn remove_user(&mut self, user: &DirectoryUser) -> DirectoryResult<()> {
        let result = self.ldap.delete(&user.distinguished_name).await?;
        check(result, "remove user", &user.distinguished_name)?;
        info!("User removed");
        Ok(())
    }

    #[instrument(skip(self, group), fields(name = %group.name))]
    async fn create_group(&mut self, group: &NewGroup) -> DirectoryResult<DirectoryGroup> {
        let dn = rdn_under(&group.name, &group.container);

        let mut attrs: Vec<(Vec<u8>, AttrValues)> = vec![
            attr("objectClass", ["top", "group"]),
            attr("cn", [group.name.as_str()]),
            attr("sAMAccountName", [group.name.as_str()]),
            attr("groupType", [group.scope.security_group_type().to_string()]),
        ];
        if let Some(description) = &group.description {
            attrs.push(attr("description", [description.as_str()]));
        }
        if let Some(display_name) = &group.display_name {
            attrs.push(attr("displayName", [display_name.as_str()]));
        }

        let result = self.ldap.add(&dn, attrs).await?;
        check(result, "create group", &dn)?;
        info!(dn = %dn, scope = %group.scope, "Group created");

        Ok(DirectoryGroup {
            distinguished_name: dn,
            name: group.name.clone(),
            description: group.description.clone().unwrap_or_default(),
        })
    }

    #[instrument(skip(self, group), fields(dn = %group.distinguished_name))]
    async fn remove_group(&mut self, group: &DirectoryGroup) -> DirectoryResult<()> {
        let result = self.ldap.delete(&group.distinguished_name).await?;
        check(result, "remove group", &group.distinguished_name)?;
        info!("Group removed");
        Ok(())
    }

    #[instrument(skip(self, group, user), fields(group = %group.name, user = %user.sam_account_name))]
    async fn add_group_member(
        &mut self,
        group: &DirectoryGroup,
        user: &DirectoryUser,
    ) -> DirectoryResult<()> {
        let mods = vec![Mod::Add(
            b"member".to_vec(),
            HashSet::from([user.distinguished_name.clone().into_bytes()]),
        )];
        self.modify(&group.distinguished_name, mods, "add group member")
            .await
    }

    #[instrument(skip(self, group, user), fields(group = %group.name, user = %user.sam_account_name))]
    async fn remove_group_member(
        &mut self,
        group: &DirectoryGroup,
        user: &DirectoryUser,
    ) -> DirectoryResult<()> {
        let mods = vec![Mod::Delete(
            b"member".to_vec(),
            HashSet::from([user.distinguished_name.clone().into_bytes()]),
        )];
        self.modify(&group.distinguished_name, mods, "remove group member")
            .await
    }

    #[instrument(skip(self, user, password), fields(dn = %user.distinguished_name))]
    async fn set_password(&mut self, user: &DirectoryUser, password: &str) -> DirectoryResult<()> {
        let mods = vec![Mod::Replace(
            b"unicodePwd".to_vec(),
            HashSet::from([encode_password(password)]),
        )];
        self.modify(&user.distinguished_name, mods, "set password")
            .await
    }

    #[instrument(skip(self, user), fields(dn = %user.distinguished_name))]
    async fn clear_password_never_expires(
        &mut self,
        user: &DirectoryUser,
    ) -> DirectoryResult<DirectoryUser> {
        let account_control = user.account_control & !UF_DONT_EXPIRE_PASSWD;
        let mods = vec![Mod::Replace(
            b"userAccountControl".to_vec(),
            HashSet::from([account_control.to_string().into_bytes()]),
        )];
        self.modify(&user.distinguished_name, mods, "clear password never expires")
            .await?;

        Ok(DirectoryUser {
            account_control,
            ..user.clone()
        })
    }

    #[instrument(skip(self, user), fields(dn = %user.distinguished_name))]
    async fn require_password_change(&mut self, user: &DirectoryUser) -> DirectoryResult<()> {
        let mods = vec![Mod::Replace(
            b"pwdLastSet".to_vec(),
            HashSet::from([b"0".to_vec()]),
        )];
        self.modify(&user.distinguished_name, mods, "require password change")
            .await
    }

    #[instrument(skip(self, user), fields(dn = %user.distinguished_name))]
    async fn unlock(&mut self, user: &DirectoryUser) -> DirectoryResult<DirectoryUser> {
        let mods = vec![Mod::Replace(
            b"lockoutTime".to_vec(),
            HashSet::from([b"0".to_vec()]),
        )];
        self.modify(&user.distinguished_name, mods, "unlock account")
            .await?;

        Ok(DirectoryUser {
            locked_out: false,
            ..user.clone()
        })
    }

    async fn close(self: Box<Self>) -> DirectoryResult<()> {
        let mut session = self;
        session.ldap.unbind().await?;
        Ok(())
    }
}

/// Bare hosts default to LDAPS; `host:port` keeps its port; full URLs pass through
pub fn ldap_url(controller: &str) -> String {
    let controller = controller.trim();
    if controller.contains("://") {
        controller.to_string()
    } else if controller.contains(':') {
        format!("ldaps://{}", controller)
    } else {
        format!("ldaps://{}:{}", controller, DEFAULT_LDAPS_PORT)
    }
}

pub fn user_filter(principal_name: &str) -> String {
    format!(
        "(&(objectCategory=person)(objectClass=user)(userPrincipalName={}))",
        ldap_escape(principal_name)
    )
}

pub fn group_filter(name: &str) -> String {
    format!("(&(objectClass=group)(name={}))", ldap_escape(name))
}

/// `CN=<escaped value>,<container>`
pub fn rdn_under(value: &str, container: &str) -> String {
    format!("CN={},{}", dn_escape(value), container)
}

/// Quote the password and encode it as UTF-16LE for `unicodePwd`
pub fn encode_password(password: &str) -> Vec<u8> {
    format!("\"{}\"", password)
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn attr<I, V>(name: &str, values: I) -> (Vec<u8>, AttrValues)
where
    I: IntoIterator<Item = V>,
    V: Into<Vec<u8>>,
{
    (
        name.as_bytes().to_vec(),
        values.into_iter().map(Into::into).collect(),
    )
}

fn check(result: LdapResult, action: &str, dn: &str) -> DirectoryResult<()> {
    if result.rc != 0 {
        return Err(DirectoryError::Rejected(format!(
            "Failed to {} '{}': {}",
            action,
            dn,
            enhance_ldap_error(result.rc, &result.text)
        )));
    }
    Ok(())
}

fn first_value<'a>(entry: &'a SearchEntry, name: &str) -> Option<&'a str> {
    entry
        .attrs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

fn user_from_entry(entry: &SearchEntry) -> DirectoryUser {
    let account_control = first_value(entry, "userAccountControl")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(UF_NORMAL_ACCOUNT);
    let computed = first_value(entry, "msDS-User-Account-Control-Computed")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0);

    DirectoryUser {
        distinguished_name: entry.dn.clone(),
        sam_account_name: first_value(entry, "sAMAccountName").unwrap_or_default().to_string(),
        user_principal_name: first_value(entry, "userPrincipalName")
            .unwrap_or_default()
            .to_string(),
        name: first_value(entry, "name").unwrap_or_default().to_string(),
        account_control,
        locked_out: computed & UF_LOCKOUT != 0,
    }
}

fn group_from_entry(entry: &SearchEntry) -> DirectoryGroup {
    DirectoryGroup {
        distinguished_name: entry.dn.clone(),
        name: first_value(entry, "name").unwrap_or_default().to_string(),
        description: first_value(entry, "description").unwrap_or_default().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::UF_ACCOUNT_DISABLE;
    use std::collections::HashMap;

    fn entry(dn: &str, attrs: &[(&str, &str)]) -> SearchEntry {
        SearchEntry {
            dn: dn.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
                .collect::<HashMap<_, _>>(),
            bin_attrs: HashMap::new(),
        }
    }

    #[test]
    fn test_ldap_url() {
        assert_eq!(ldap_url("dc01.corp.example.com"), "ldaps://dc01.corp.example.com:636");
        assert_eq!(ldap_url("dc01:3269"), "ldaps://dc01:3269");
        assert_eq!(ldap_url("ldap://dc01:389"), "ldap://dc01:389");
    }

    #[test]
    fn test_filters_escape_input() {
        assert_eq!(
            user_filter("john@corp.example.com"),
            "(&(objectCategory=person)(objectClass=user)(userPrincipalName=john@corp.example.com))"
        );
        let filter = user_filter("*)(objectClass=*");
        assert!(!filter.contains("*)(objectClass=*"));
        assert_eq!(filter.matches('(').count(), 4);
        assert_eq!(filter.matches(')').count(), 4);

        assert_eq!(group_filter("Staff"), "(&(objectClass=group)(name=Staff))");
    }

    #[test]
    fn test_rdn_under_escapes_commas() {
        assert_eq!(
            rdn_under("Marketing", "OU=Groups,DC=x,DC=y"),
            "CN=Marketing,OU=Groups,DC=x,DC=y"
        );
        let dn = rdn_under("Doe, John", "CN=Users,DC=x,DC=y");
        assert!(dn.starts_with("CN=Doe\\"));
        assert!(!dn.contains("Doe, John"));
        assert!(dn.ends_with(",CN=Users,DC=x,DC=y"));
    }

    #[test]
    fn test_encode_password() {
        let encoded = encode_password("Ab1");
        assert_eq!(encoded, vec![b'"', 0, b'A', 0, b'b', 0, b'1', 0, b'"', 0]);
    }

    #[test]
    fn test_user_from_entry() {
        let e = entry(
            "CN=John Smith,CN=Users,DC=x,DC=y",
            &[
                ("sAMAccountName", "john"),
                ("userPrincipalName", "john@x.y"),
                ("name", "John Smith"),
                ("userAccountControl", "66050"),
                ("msDS-User-Account-Control-Computed", "16"),
            ],
        );
        let user = user_from_entry(&e);
        assert_eq!(user.sam_account_name, "john");
        assert_eq!(
            user.account_control,
            UF_NORMAL_ACCOUNT | UF_DONT_EXPIRE_PASSWD | UF_ACCOUNT_DISABLE
        );
        assert!(!user.enabled());
        assert!(user.password_never_expires());
        assert!(user.locked_out);
    }

    #[test]
    fn test_group_from_entry_without_description() {
        let e = entry("CN=Staff,OU=Groups,DC=x,DC=y", &[("name", "Staff")]);
        let group = group_from_entry(&e);
        assert_eq!(group.name, "Staff");
        assert_eq!(group.description, "");
        assert_eq!(group.distinguished_name, "CN=Staff,OU=Groups,DC=x,DC=y");
    }

    #[test]
    fn test_check_maps_result_code() {
        let result = LdapResult {
            rc: 68,
            matched: String::new(),
            text: "ENTRY_EXISTS".into(),
            refs: vec![],
            ctrls: vec![],
        };
        let err = check(result, "create group", "CN=Staff,DC=x,DC=y").unwrap_err();
        assert!(err.to_string().contains("entryAlreadyExists (68)"));
    }
}
