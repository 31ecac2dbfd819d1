//! Client for a glossary hosted on a terminology server.
//!
//! Wire format: `POST <server>/glossaries/search` with a JSON body and HTTP
//! basic auth. The server answers `{"status": "Success"|"Error", "reason": ..,
//! "matches": [..]}` where each match has the same shape as [`Match`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LookupError, LookupResult};
use crate::ir::Match;
use crate::terminology::TerminologyLookup;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct RemoteGlossary {
    name: String,
    glossary: String,
    server: String,
    user: String,
    password: String,
    client: reqwest::blocking::Client,
}

impl fmt::Debug for RemoteGlossary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteGlossary")
            .field("name", &self.name)
            .field("glossary", &self.glossary)
            .field("server", &self.server)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    glossary: &'a str,
    search_str: &'a str,
    src_lang: &'a str,
    tgt_lang: &'a str,
    similarity: u8,
    case_sensitive: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    status: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    matches: Vec<Match>,
}

impl RemoteGlossary {
    pub fn connect(
        name: impl Into<String>,
        glossary: impl Into<String>,
        server: &str,
        user: &str,
        password: &str,
        timeout_secs: Option<u64>,
    ) -> LookupResult<Self> {
        let server = server.trim().trim_end_matches('/').to_string();
        if server.is_empty() {
            return Err(LookupError::Decode("remote glossary has no server URL".to_string()));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)))
            .build()?;
        Ok(Self {
            name: name.into(),
            glossary: glossary.into(),
            server,
            user: user.to_string(),
            password: password.to_string(),
            client,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/glossaries/search", self.server)
    }
}

impl TerminologyLookup for RemoteGlossary {
    fn lookup(
        &self,
        term: &str,
        src_lang: &str,
        tgt_lang: &str,
        min_similarity: u8,
        case_sensitive: bool,
    ) -> LookupResult<Vec<Match>> {
        let body = SearchRequest {
            glossary: &self.glossary,
            search_str: term,
            src_lang,
            tgt_lang,
            similarity: min_similarity,
            case_sensitive,
        };
        let mut req = self.client.post(self.search_url()).json(&body);
        if !self.user.is_empty() {
            req = req.basic_auth(&self.user, Some(&self.password));
        }
        let text = req.send()?.error_for_status()?.text()?;
        let matches = decode_response(&text)?;
        log::debug!(
            "remote glossary {}: {} hit(s) for {term:?}",
            self.name,
            matches.len()
        );
        Ok(matches)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) fn decode_response(body: &str) -> LookupResult<Vec<Match>> {
    let resp: SearchResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Decode(e.to_string()))?;
    if resp.status.eq_ignore_ascii_case("error") {
        return Err(LookupError::Remote {
            status: resp.status,
            reason: resp.reason.unwrap_or_default(),
        });
    }
    let mut matches = resp.matches;
    crate::ir::rank_matches(&mut matches);
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ok_response() {
        let body = r#"{"status":"Success","matches":[
            {"source":"file","target":"fichier","quality":90,"origin":"Corp"},
            {"source":"file","target":"<g id=\"1\">fichier</g>","quality":100,"origin":"Corp"}
        ]}"#;
        let matches = decode_response(body).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].quality(), 100);
        assert_eq!(matches[0].target().flatten(), "fichier");
    }

    #[test]
    fn error_status_is_a_remote_error() {
        let err = decode_response(r#"{"status":"Error","reason":"no such glossary"}"#).unwrap_err();
        match err {
            LookupError::Remote { status, reason } => {
                assert_eq!(status, "Error");
                assert_eq!(reason, "no such glossary");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            decode_response("<html>"),
            Err(LookupError::Decode(_))
        ));
    }

    #[test]
    fn request_uses_camel_case_fields() {
        let body = serde_json::to_value(SearchRequest {
            glossary: "g",
            search_str: "file",
            src_lang: "en",
            tgt_lang: "fr",
            similarity: 100,
            case_sensitive: true,
        })
        .unwrap();
        assert_eq!(body["searchStr"], "file");
        assert_eq!(body["caseSensitive"], true);
    }

    #[test]
    fn connect_requires_a_server() {
        assert!(RemoteGlossary::connect("n", "g", "  ", "", "", None).is_err());
        let g = RemoteGlossary::connect("n", "g", "http://localhost:1/", "", "", Some(1)).unwrap();
        assert_eq!(g.search_url(), "http://localhost:1/glossaries/search");
        assert!(!format!("{g:?}").contains("password"));
    }
}
