//! Join links.
//!
//! A host shares a URL of the form `<base>?view=voter&hostId=<identity>`.
//! Opening the bare base URL (or `view=admin`) lands on the admin view;
//! the voter view requires a `hostId` to dial.

use galavote_types::PeerIdentity;

/// Which application surface a URL selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMode {
    /// The host/admin surface. The default when no view is requested.
    Admin,
    /// The voter surface, dialing `host`. `None` means the link was
    /// shared without a host identity and cannot connect.
    Voter { host: Option<PeerIdentity> },
}

/// Build the shareable voter link for a host identity.
pub fn join_link(base_url: &str, host: &PeerIdentity) -> String {
    let sep = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{sep}view=voter&hostId={host}")
}

/// Parse the view selection out of a URL.
///
/// Unrecognized `view` values fall back to the admin surface rather than
/// erroring; a stale or mistyped link should still land somewhere usable.
pub fn parse_view(url: &str) -> ViewMode {
    let query = match url.split_once('?') {
        Some((_, query)) => query,
        None => return ViewMode::Admin,
    };
    let mut view = None;
    let mut host_id = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "view" => view = Some(value),
            "hostId" => host_id = Some(value),
            _ => {}
        }
    }
    match view {
        Some("voter") => ViewMode::Voter {
            host: host_id
                .filter(|id| !id.is_empty())
                .map(PeerIdentity::new),
        },
        _ => ViewMode::Admin,
    }
}
