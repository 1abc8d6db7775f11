//! Endpoint resolution: configured URL plus the client identity query.

use url::Url;

use crate::errors::ConfigError;

/// Query key carrying the client type.
pub const QUERY_TYPE: &str = "type";
/// Query key carrying the client id.
pub const QUERY_CLIENT_ID: &str = "cliId";

/// Parse `base` and attach `type` and `cliId`.
///
/// Existing values for those two keys are replaced; every other query pair
/// is preserved in order.
pub fn resolve_endpoint(base: &str, client_type: &str, client_id: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(base).map_err(|source| ConfigError::InvalidUrl {
        url: base.to_owned(),
        source,
    })?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(ConfigError::UnsupportedScheme {
                scheme: other.to_owned(),
            });
        }
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != QUERY_TYPE && key != QUERY_CLIENT_ID)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    {
        let mut query = url.query_pairs_mut();
        let _ = query.clear();
        for (key, value) in &kept {
            let _ = query.append_pair(key, value);
        }
        let _ = query
            .append_pair(QUERY_TYPE, client_type)
            .append_pair(QUERY_CLIENT_ID, client_id);
    }

    Ok(url)
}

/// Whether the endpoint uses TLS.
pub fn is_secure(url: &Url) -> bool {
    url.scheme() == "wss"
}
