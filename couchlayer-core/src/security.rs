//! The per-database security document.
//!
//! A security document has two groups, `admins` and `members`, each listing user names and
//! role names. The server admin role [`SYSTEM_ADMIN_ROLE`] is always reported as an admin
//! role by this client, whether or not the server returned it.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeSet;

use crate::{
    error::CouchResult,
    transport::Transport,
    uri::UriTemplate,
};

/// The reserved role of server administrators.
pub const SYSTEM_ADMIN_ROLE: &str = "_admin";

/// Names and roles of one security group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityGroup {
    pub names: BTreeSet<String>,
    pub roles: BTreeSet<String>,
}

impl SecurityGroup {
    fn from_json(value: Option<&Value>) -> Self {
        Self {
            names: entries(value.and_then(|v| v.get("names"))),
            roles: entries(value.and_then(|v| v.get("roles"))),
        }
    }

    fn to_json(names: &BTreeSet<String>, roles: &BTreeSet<String>) -> Value {
        json!({ "names": names, "roles": roles })
    }
}

/// Collects the non-blank entries of a JSON array; scalars other than strings are stringified.
fn entries(value: Option<&Value>) -> BTreeSet<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.trim().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// A database security document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityDocument {
    admins: SecurityGroup,
    members: SecurityGroup,
}

impl SecurityDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admin_names(&self) -> &BTreeSet<String> {
        &self.admins.names
    }

    /// Admin roles, always including [`SYSTEM_ADMIN_ROLE`].
    pub fn admin_roles(&self) -> BTreeSet<String> {
        let mut roles = self.admins.roles.clone();
        roles.insert(SYSTEM_ADMIN_ROLE.to_string());
        roles
    }

    pub fn member_names(&self) -> &BTreeSet<String> {
        &self.members.names
    }

    pub fn member_roles(&self) -> &BTreeSet<String> {
        &self.members.roles
    }

    pub fn add_admin_name(mut self, name: impl Into<String>) -> Self {
        self.admins.names.insert(name.into());
        self
    }

    pub fn add_admin_names<I: IntoIterator<Item = S>, S: Into<String>>(mut self, names: I) -> Self {
        self.admins.names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn add_admin_role(mut self, role: impl Into<String>) -> Self {
        self.admins.roles.insert(role.into());
        self
    }

    pub fn add_admin_roles<I: IntoIterator<Item = S>, S: Into<String>>(mut self, roles: I) -> Self {
        self.admins.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn add_member_name(mut self, name: impl Into<String>) -> Self {
        self.members.names.insert(name.into());
        self
    }

    pub fn add_member_names<I: IntoIterator<Item = S>, S: Into<String>>(mut self, names: I) -> Self {
        self.members.names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn add_member_role(mut self, role: impl Into<String>) -> Self {
        self.members.roles.insert(role.into());
        self
    }

    pub fn add_member_roles<I: IntoIterator<Item = S>, S: Into<String>>(mut self, roles: I) -> Self {
        self.members.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn remove_admin_name(mut self, name: &str) -> Self {
        self.admins.names.remove(name);
        self
    }

    pub fn remove_admin_role(mut self, role: &str) -> Self {
        self.admins.roles.remove(role);
        self
    }

    pub fn remove_member_name(mut self, name: &str) -> Self {
        self.members.names.remove(name);
        self
    }

    pub fn remove_member_role(mut self, role: &str) -> Self {
        self.members.roles.remove(role);
        self
    }

    pub fn clear_admin_names(mut self) -> Self {
        self.admins.names.clear();
        self
    }

    pub fn clear_admin_roles(mut self) -> Self {
        self.admins.roles.clear();
        self
    }

    pub fn clear_member_names(mut self) -> Self {
        self.members.names.clear();
        self
    }

    pub fn clear_member_roles(mut self) -> Self {
        self.members.roles.clear();
        self
    }

    pub fn clear(self) -> Self {
        self.clear_admin_names()
            .clear_admin_roles()
            .clear_member_names()
            .clear_member_roles()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "admins": SecurityGroup::to_json(&self.admins.names, &self.admin_roles()),
            "members": SecurityGroup::to_json(&self.members.names, &self.members.roles),
        })
    }

    pub fn from_json(value: &Value) -> Self {
        Self {
            admins: SecurityGroup::from_json(value.get("admins")),
            members: SecurityGroup::from_json(value.get("members")),
        }
    }
}

/// Acknowledgement of a write whose response body carries nothing else of use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledged {
    pub ok: bool,
}

/// Security document operations on one database.
#[derive(Debug)]
pub struct Security<'a, T: Transport> {
    db: String,
    transport: &'a T,
}

impl<'a, T: Transport> Security<'a, T> {
    pub(crate) fn new(db: String, transport: &'a T) -> Self {
        Self { db, transport }
    }

    /// Reads the security document.
    pub async fn get(&self) -> CouchResult<SecurityDocument> {
        let value: Value = self
            .transport
            .get(&UriTemplate::database_security(&self.db).expand_plain())
            .await?
            .json()?;

        Ok(SecurityDocument::from_json(&value))
    }

    /// Replaces the security document.
    pub async fn set(&self, doc: &SecurityDocument) -> CouchResult<Acknowledged> {
        tracing::debug!(db = %self.db, "writing security document");

        self.transport
            .put_json(
                &UriTemplate::database_security(&self.db).expand_plain(),
                Some(doc.to_json()),
            )
            .await?
            .error_for_status()?;

        Ok(Acknowledged { ok: true })
    }
}
