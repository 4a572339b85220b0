//! Capability negotiation between a platform and a business.
//!
//! Both sides advertise the optional protocol features they support. The
//! negotiated set is what a session may use: every requested capability the
//! platform can serve at a compatible version, minus any capability whose
//! parent (`extends`) did not survive.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Version assumed when a capability does not state one.
pub const DEFAULT_VERSION: &str = "latest";

const VERSION_FORMAT: &str = "%Y-%m-%d";

/// A named, date-versioned protocol feature.
///
/// # Examples
///
/// ```
/// use ucp_trust::capability::Capability;
///
/// let capability: Capability = serde_json::from_str(r#"{"name": "dev.ucp.checkout"}"#).unwrap();
/// assert_eq!(capability.version, "latest");
/// assert_eq!(capability.extends, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Capability name, for example `dev.ucp.shopping.checkout`.
    pub name: String,
    /// Release date `YYYY-MM-DD`, or [`DEFAULT_VERSION`].
    #[serde(default = "default_version")]
    pub version: String,
    /// Name of the capability this one builds on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_owned()
}

impl Capability {
    /// Creates a capability with no parent.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into(), extends: None }
    }

    /// Sets the parent capability.
    #[must_use]
    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }
}

/// Returns `true` if a capability released at `available` can serve a request
/// for `requested`.
///
/// Either side being [`DEFAULT_VERSION`] matches. Otherwise both must parse as
/// `YYYY-MM-DD` and `available` must not be newer than `requested`; a version
/// that does not parse never matches.
///
/// # Examples
///
/// ```
/// use ucp_trust::capability::is_version_compatible;
///
/// assert!(is_version_compatible("2026-01-10", "2026-01-11"));
/// assert!(!is_version_compatible("2026-01-12", "2026-01-11"));
/// assert!(is_version_compatible("latest", "2026-01-11"));
/// assert!(!is_version_compatible("v2", "2026-01-11"));
/// ```
#[must_use]
pub fn is_version_compatible(available: &str, requested: &str) -> bool {
    if available == DEFAULT_VERSION || requested == DEFAULT_VERSION {
        return true;
    }
    match (parse_version(available), parse_version(requested)) {
        (Some(available), Some(requested)) => available <= requested,
        _ => {
            debug!(available, requested, "unparsable capability version");
            false
        }
    }
}

fn parse_version(version: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(version, VERSION_FORMAT).ok()
}

/// Computes the active capability set.
///
/// 1. Each requested capability is kept if an available capability with the
///    same name has a compatible version. The kept entry carries the requested
///    version and `extends`.
/// 2. Entries whose `extends` target is not among the kept names are removed,
///    repeatedly, until nothing more is removed.
///
/// Output order follows `requested`.
///
/// # Examples
///
/// ```
/// use ucp_trust::capability::{Capability, negotiate};
///
/// let available = vec![Capability::new("checkout", "2026-01-10")];
/// let requested = vec![
///     Capability::new("checkout", "2026-01-11"),
///     Capability::new("discounts", "2026-01-11").extending("checkout"),
/// ];
///
/// // `discounts` is not offered, `checkout` is.
/// assert_eq!(negotiate(&available, &requested), vec![Capability::new("checkout", "2026-01-11")]);
/// ```
#[must_use]
pub fn negotiate(available: &[Capability], requested: &[Capability]) -> Vec<Capability> {
    let mut active: Vec<Capability> = requested
        .iter()
        .filter(|wanted| {
            available
                .iter()
                .filter(|offered| offered.name == wanted.name)
                .any(|offered| is_version_compatible(&offered.version, &wanted.version))
        })
        .cloned()
        .collect();

    loop {
        let before = active.len();
        let names: Vec<String> = active.iter().map(|c| c.name.clone()).collect();
        active.retain(|capability| match &capability.extends {
            Some(parent) => names.contains(parent),
            None => true,
        });
        if active.len() == before {
            break;
        }
        debug!(pruned = before - active.len(), "pruned orphaned capabilities");
    }

    active
}
