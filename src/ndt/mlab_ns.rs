//! mlab-ns server selection.
//!
//! When the caller does not pin a server address, the runner asks mlab-ns
//! (an external HTTP service) for the nearest M-Lab host running a given
//! tool and uses the returned `fqdn`.

use serde::Deserialize;

use crate::error::{Error, Kind};
use crate::logger::Logger;

const MLAB_NS_BASE_URL: &str = "https://mlab-ns.appspot.com";

#[derive(Debug, Deserialize)]
struct MlabNsReply {
    fqdn: String,
}

/// Ask mlab-ns for the nearest server running `tool` (e.g. `"ndt"`) and
/// return its fully-qualified domain name.
pub async fn lookup(tool: &str, logger: &Logger) -> Result<String, Error> {
    logger.in_progress(&format!("mlab-ns: looking up nearest {tool} server"));
    let url = format!("{MLAB_NS_BASE_URL}/{tool}");
    let reply = reqwest::get(&url)
        .await
        .map_err(|e| Error::with_cause(Kind::NetworkError, e))?
        .json::<MlabNsReply>()
        .await
        .map_err(|e| Error::with_cause(Kind::JsonParseError, e))?;
    logger.complete("mlab-ns: lookup", None);
    Ok(reply.fqdn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_deserializes_fqdn_field() {
        let reply: MlabNsReply = serde_json::from_str(r#"{"city": "Turin", "fqdn": "ndt.iplab.polito.it"}"#).unwrap();
        assert_eq!(reply.fqdn, "ndt.iplab.polito.it");
    }
}
