//! User-Agent string shared by every request the tool sends.

/// Project URL advertised in the User-Agent header.
const PROJECT_UA_URL: &str = "https://github.com/fierce/vscod";

/// Default User-Agent for marketplace and update-service requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("vscod/{version} (offline-mirror; +{PROJECT_UA_URL})")
}
