use serde::{Deserialize, Serialize};

/// Fixed user-facing strings produced by the classifier.
///
/// The default table is English. A localized table can be deserialized from
/// configuration; missing fields keep their default text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    /// 401
    pub unauthorized: String,
    /// 403
    pub forbidden: String,
    /// 404
    pub not_found: String,
    /// 400/422 with a field mapping that flattens to nothing
    pub invalid_data: String,
    /// 400/422 without a usable body
    pub bad_request: String,
    /// 5xx
    pub server_error: String,
    /// Any other status without a detail field
    pub generic: String,
    /// Request sent, nothing came back
    pub no_connection: String,
    /// Request never left the client and carried no message
    pub unknown: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            unauthorized: "authentication required".to_owned(),
            forbidden: "access denied".to_owned(),
            not_found: "resource not found".to_owned(),
            invalid_data: "invalid data".to_owned(),
            bad_request: "bad request".to_owned(),
            server_error: "server error, try again later".to_owned(),
            generic: "an error occurred".to_owned(),
            no_connection: "no connection to server".to_owned(),
            unknown: "unknown error occurred".to_owned(),
        }
    }
}
