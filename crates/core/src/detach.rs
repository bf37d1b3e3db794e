//! Moving a live session into a standalone window.
//!
//! A detach serializes the session descriptor into the query string of the
//! console URL:
//!
//! ```text
//! http://127.0.0.1:8080/?popout=true&payload=%7B%22cmd%22%3A%22connect%22...
//! ```
//!
//! The window that loads this URL recognizes the marker, restricts itself to
//! terminal-only mode and starts a fresh session from the payload alone.
//! Because the descriptor keeps its session id, the backend can re-attach to
//! the same terminal.

use std::fmt;

use tracing::debug;
use url::Url;

use sshui_protocol::SessionDescriptor;

use crate::error::HandoffError;
use crate::host::HostMode;

/// Query parameter marking a handoff window.
pub const HANDOFF_MARKER: &str = "popout";
/// Query parameter carrying the serialized descriptor.
pub const PAYLOAD_PARAM: &str = "payload";

/// Location a detached session resumes at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffTarget {
	url: Url,
}

impl HandoffTarget {
	pub fn url(&self) -> &Url {
		&self.url
	}

	pub fn as_str(&self) -> &str {
		self.url.as_str()
	}
}

impl fmt::Display for HandoffTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.url.as_str())
	}
}

/// What a freshly loaded window should do, judging by its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffLoad {
	/// No handoff marker: run the full console.
	Normal,
	/// Marker present but no payload: terminal-only mode, nothing to resume.
	Restricted,
	/// Marker and payload present: terminal-only mode, resume this session.
	Resume(SessionDescriptor),
}

impl HandoffLoad {
	pub fn host_mode(&self) -> HostMode {
		match self {
			HandoffLoad::Normal => HostMode::Embedded,
			HandoffLoad::Restricted | HandoffLoad::Resume(_) => HostMode::Handoff,
		}
	}
}

/// Builds handoff targets against the console's base URL.
#[derive(Debug, Clone)]
pub struct DetachCoordinator {
	base: Url,
}

impl DetachCoordinator {
	/// `base` is the console page URL; any query or fragment is discarded.
	pub fn new(base: &str) -> Result<Self, HandoffError> {
		let mut url = Url::parse(base).map_err(|e| HandoffError::InvalidBase {
			url: base.to_string(),
			reason: e.to_string(),
		})?;
		if url.cannot_be_a_base() {
			return Err(HandoffError::InvalidBase {
				url: base.to_string(),
				reason: "not a hierarchical url".into(),
			});
		}
		url.set_query(None);
		url.set_fragment(None);
		Ok(Self { base: url })
	}

	pub fn base(&self) -> &Url {
		&self.base
	}

	/// Serializes `descriptor` into a handoff target.
	pub fn build(&self, descriptor: &SessionDescriptor) -> Result<HandoffTarget, HandoffError> {
		let payload = descriptor.to_json().map_err(|e| HandoffError::Serialize(e.to_string()))?;
		let mut url = self.base.clone();
		url.query_pairs_mut()
			.append_pair(HANDOFF_MARKER, "true")
			.append_pair(PAYLOAD_PARAM, &payload);
		debug!(target = "sshui.detach", session_id = %descriptor.session_id(), url = %url, "built handoff target");
		Ok(HandoffTarget { url })
	}

	/// Inspects a window location for a handoff.
	///
	/// Depends on nothing but `location` itself.
	pub fn recognize(location: &str) -> Result<HandoffLoad, HandoffError> {
		let url = Url::parse(location).map_err(|e| HandoffError::InvalidLocation {
			url: location.to_string(),
			reason: e.to_string(),
		})?;
		Self::recognize_url(&url)
	}

	pub fn recognize_url(url: &Url) -> Result<HandoffLoad, HandoffError> {
		let mut marked = false;
		let mut payload = None;
		for (key, value) in url.query_pairs() {
			match key.as_ref() {
				HANDOFF_MARKER => marked = true,
				PAYLOAD_PARAM => payload = Some(value.into_owned()),
				_ => {}
			}
		}

		if !marked {
			return Ok(HandoffLoad::Normal);
		}
		let Some(payload) = payload.filter(|p| !p.trim().is_empty()) else {
			debug!(target = "sshui.detach", "handoff window without payload");
			return Ok(HandoffLoad::Restricted);
		};
		let descriptor = SessionDescriptor::from_json(&payload).map_err(|e| HandoffError::InvalidPayload(e.to_string()))?;
		debug!(target = "sshui.detach", session_id = %descriptor.session_id(), "resuming handed-off session");
		Ok(HandoffLoad::Resume(descriptor))
	}
}

#[cfg(test)]
mod tests {
	use sshui_protocol::{SessionCommand, SessionId, TemplateAction};

	use super::*;

	fn coordinator() -> DetachCoordinator {
		DetachCoordinator::new("http://127.0.0.1:8080/?stale=1#top").unwrap()
	}

	#[test]
	fn target_carries_marker_and_payload() {
		let descriptor = SessionDescriptor::with_session_id(SessionCommand::connect("bob", "h1"), SessionId::new("abc").unwrap());
		let target = coordinator().build(&descriptor).unwrap();

		assert!(target.as_str().starts_with("http://127.0.0.1:8080/?popout=true&payload="));
		assert!(!target.as_str().contains("stale"));
		assert!(!target.as_str().contains('#'));
		let pairs: Vec<_> = target.url().query_pairs().into_owned().collect();
		assert_eq!(pairs[1].0, PAYLOAD_PARAM);
		let payload: serde_json::Value = serde_json::from_str(&pairs[1].1).unwrap();
		assert_eq!(payload["cmd"], "connect");
		assert_eq!(payload["term_id"], "abc");
	}

	#[test]
	fn handoff_preserves_descriptor_and_session_id() {
		let coordinator = coordinator();
		for command in [
			SessionCommand::connect("bob", "h1"),
			SessionCommand::create("alice@h2", Some("base"), Some("laptop key & more"), true),
			SessionCommand::template(TemplateAction::GenerateOpk, "team"),
		] {
			let descriptor = SessionDescriptor::new(command);
			let target = coordinator.build(&descriptor).unwrap();
			match DetachCoordinator::recognize(target.as_str()).unwrap() {
				HandoffLoad::Resume(resumed) => assert_eq!(resumed, descriptor),
				other => panic!("expected resume, got {other:?}"),
			}
		}
	}

	#[test]
	fn recognizes_normal_and_restricted_loads() {
		assert_eq!(DetachCoordinator::recognize("http://127.0.0.1:8080/").unwrap(), HandoffLoad::Normal);
		assert_eq!(
			DetachCoordinator::recognize("http://127.0.0.1:8080/?payload=%7B%7D").unwrap(),
			HandoffLoad::Normal
		);
		let restricted = DetachCoordinator::recognize("http://127.0.0.1:8080/?popout=true").unwrap();
		assert_eq!(restricted, HandoffLoad::Restricted);
		assert_eq!(restricted.host_mode(), HostMode::Handoff);
		assert_eq!(HandoffLoad::Normal.host_mode(), HostMode::Embedded);
	}

	#[test]
	fn payload_without_session_id_gets_one() {
		let load = DetachCoordinator::recognize(
			"http://127.0.0.1:8080/?popout=true&payload=%7B%22cmd%22%3A%22connect%22%2C%22user%22%3A%22bob%22%2C%22host%22%3A%22h1%22%7D",
		)
		.unwrap();
		let HandoffLoad::Resume(descriptor) = load else {
			panic!("expected resume");
		};
		assert!(!descriptor.session_id().as_str().is_empty());
		assert_eq!(descriptor.command(), &SessionCommand::connect("bob", "h1"));
	}

	#[test]
	fn rejects_bad_input() {
		assert!(matches!(DetachCoordinator::new("not a url"), Err(HandoffError::InvalidBase { .. })));
		assert!(matches!(DetachCoordinator::new("mailto:a@b"), Err(HandoffError::InvalidBase { .. })));
		assert!(matches!(
			DetachCoordinator::recognize("http://h/?popout=true&payload=nope"),
			Err(HandoffError::InvalidPayload(_))
		));
		assert!(matches!(DetachCoordinator::recognize("::"), Err(HandoffError::InvalidLocation { .. })));
	}
}
