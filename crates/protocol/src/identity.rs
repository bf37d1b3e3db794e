//! Identity records preloaded by the host page.
//!
//! The backend renders its identity list into the page; the terminal client
//! only reads it to turn "connect to identity X as user Y" into a concrete
//! `user@alias` target.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A key file belonging to one identity user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKey {
	#[serde(rename = "type")]
	pub key_type: String,
	pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUser {
	pub name: String,
	#[serde(default)]
	pub ssh_keys: Vec<UserKey>,
	#[serde(default)]
	pub is_template: bool,
	#[serde(default)]
	pub template_name: String,
}

/// A pinned host key for an identity's remote host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostKey {
	#[serde(rename = "type")]
	pub key_type: String,
	#[serde(default)]
	pub full_type: String,
	pub key: String,
	#[serde(default)]
	pub id: String,
}

/// One remote host identity and everything attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	pub uuid: String,
	pub short_uuid: String,
	#[serde(default)]
	pub users: Vec<IdentityUser>,
	#[serde(default)]
	pub aliases: Vec<String>,
	#[serde(default)]
	pub host_keys: Vec<HostKey>,
}

impl Identity {
	/// Hosts a connection may target; the first entry is the default choice.
	pub fn connect_targets(&self) -> Vec<String> {
		if self.aliases.is_empty() {
			vec![self.short_uuid.clone()]
		} else {
			self.aliases.clone()
		}
	}

	pub fn user(&self, name: &str) -> Option<&IdentityUser> {
		self.users.iter().find(|u| u.name == name)
	}
}

/// Read-only mapping from identity uuid to identity details.
#[derive(Debug, Clone, Default)]
pub struct IdentityDirectory {
	by_uuid: HashMap<String, Identity>,
}

impl IdentityDirectory {
	pub fn from_list(identities: impl IntoIterator<Item = Identity>) -> Self {
		Self {
			by_uuid: identities.into_iter().map(|ident| (ident.uuid.clone(), ident)).collect(),
		}
	}

	/// Parses the JSON list the backend renders into the page.
	pub fn from_json(json: &str) -> Result<Self> {
		let list: Vec<Identity> = serde_json::from_str(json)?;
		Ok(Self::from_list(list))
	}

	pub fn get(&self, uuid: &str) -> Option<&Identity> {
		self.by_uuid.get(uuid)
	}

	pub fn connect_targets(&self, uuid: &str) -> Option<Vec<String>> {
		self.get(uuid).map(Identity::connect_targets)
	}

	pub fn len(&self) -> usize {
		self.by_uuid.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_uuid.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const LIST: &str = r#"[
		{"uuid": "0f8e2a41-aaaa", "short_uuid": "0f8e2a41", "aliases": ["db1", "db1.internal"],
		 "users": [{"name": "deploy", "ssh_keys": [{"type": "ed25519", "content": "ssh-ed25519 AAAA"}]}],
		 "host_keys": [{"type": "ed25519", "full_type": "ssh-ed25519", "key": "AAAA", "id": "h1"}]},
		{"uuid": "77c0ffee-bbbb", "short_uuid": "77c0ffee", "aliases": [], "users": [], "host_keys": []}
	]"#;

	#[test]
	fn aliases_are_preferred_targets() {
		let dir = IdentityDirectory::from_json(LIST).unwrap();
		assert_eq!(dir.len(), 2);
		assert_eq!(dir.connect_targets("0f8e2a41-aaaa").unwrap(), vec!["db1", "db1.internal"]);
	}

	#[test]
	fn short_uuid_is_fallback_target() {
		let dir = IdentityDirectory::from_json(LIST).unwrap();
		assert_eq!(dir.connect_targets("77c0ffee-bbbb").unwrap(), vec!["77c0ffee"]);
		assert!(dir.connect_targets("missing").is_none());
	}

	#[test]
	fn users_are_looked_up_by_name() {
		let dir = IdentityDirectory::from_json(LIST).unwrap();
		let ident = dir.get("0f8e2a41-aaaa").unwrap();
		assert_eq!(ident.user("deploy").unwrap().ssh_keys[0].key_type, "ed25519");
		assert!(ident.user("root").is_none());
	}
}
