//! Europe PMC literature search

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::http_client::HttpClient;
use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::literature::{LiteratureSource, RawPublication, SearchParams};

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    result_list: Option<ResultList>,
}

#[derive(Debug, Deserialize)]
struct ResultList {
    #[serde(default)]
    result: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Hit {
    pmid: Option<String>,
    pmcid: Option<String>,
    #[serde(default)]
    title: String,
    author_string: Option<String>,
    pub_year: Option<String>,
    journal_info: Option<JournalInfo>,
    journal_title: Option<String>,
    abstract_text: Option<String>,
    is_open_access: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JournalInfo {
    journal: Option<Journal>,
}

#[derive(Debug, Deserialize)]
struct Journal {
    title: Option<String>,
}

impl Hit {
    fn is_open_access(&self) -> bool {
        self.is_open_access.as_deref() == Some("Y")
    }

    fn into_publication(self) -> RawPublication {
        let journal = self
            .journal_info
            .and_then(|j| j.journal)
            .and_then(|j| j.title)
            .or(self.journal_title);
        RawPublication {
            pmid: self.pmid,
            pmcid: self.pmcid,
            title: strip_markup(&self.title),
            authors: split_authors(self.author_string.as_deref().unwrap_or("")),
            year: self.pub_year.and_then(|y| y.trim().parse().ok()),
            journal,
            abstract_text: self.abstract_text.map(|a| strip_markup(&a)),
            full_text: None,
        }
    }
}

/// `"Doe J, Roe R."` → `["Doe J", "Roe R"]`
fn split_authors(authors: &str) -> Vec<String> {
    authors
        .trim()
        .trim_end_matches('.')
        .split(", ")
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect()
}

/// Drop XML/HTML tags and collapse whitespace
fn strip_markup(text: &str) -> String {
    let without_tags = TAG_RE.replace_all(text, " ");
    SPACE_RE.replace_all(without_tags.trim(), " ").into_owned()
}

fn build_query(gene: &str, variant: Option<&str>) -> String {
    match variant {
        Some(v) => format!("\"{gene}\" AND \"{v}\""),
        None => format!("\"{gene}\""),
    }
}

pub struct EuropePmcSource {
    client: Arc<HttpClient>,
    config: SourceConfig,
}

impl EuropePmcSource {
    pub fn new(client: Arc<HttpClient>, config: SourceConfig) -> Self {
        Self { client, config }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn full_text(&self, pmcid: &str) -> Result<Option<String>, SourceError> {
        let url = format!("{}/{}/fullTextXML", self.base(), pmcid);
        let xml = self.client.get_text(&url, self.config.timeout()).await?;
        Ok(xml.map(|x| strip_markup(&x)))
    }
}

#[async_trait]
impl LiteratureSource for EuropePmcSource {
    fn name(&self) -> &str {
        "europepmc"
    }

    async fn search(
        &self,
        gene: &str,
        variant: Option<&str>,
        params: &SearchParams,
    ) -> Result<Vec<RawPublication>, SourceError> {
        let query: String =
            url::form_urlencoded::byte_serialize(build_query(gene, variant).as_bytes()).collect();
        let url = format!(
            "{}/search?query={}&format=json&resultType=core&pageSize={}",
            self.base(),
            query,
            params.depth.max(1)
        );
        let response: Option<SearchResponse> = self.client.get_json(&url, self.config.timeout()).await?;
        let hits = response
            .and_then(|r| r.result_list)
            .map(|l| l.result)
            .unwrap_or_default();
        debug!(gene, variant = variant.unwrap_or(""), hits = hits.len(), "europepmc search");

        let mut publications = Vec::with_capacity(hits.len());
        for hit in hits.into_iter().take(params.depth as usize) {
            let fetch_full_text = params.include_full_text && hit.is_open_access();
            let mut publication = hit.into_publication();
            if fetch_full_text {
                if let Some(pmcid) = publication.pmcid.clone() {
                    // Missing full text leaves the abstract to mine
                    match self.full_text(&pmcid).await {
                        Ok(text) => publication.full_text = text,
                        Err(e) => warn!(pmcid = %pmcid, error = %e, "full text unavailable"),
                    }
                }
            }
            publications.push(publication);
        }
        Ok(publications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
      "hitCount": 2,
      "resultList": {
        "result": [
          {
            "pmid": "15607980",
            "pmcid": "PMC1234567",
            "title": "Gain of function of a <i>TP53</i> hot spot mutation",
            "authorString": "Doe J, Roe R.",
            "pubYear": "2004",
            "journalInfo": {"journal": {"title": "Cell"}},
            "abstractText": "The <b>p.Arg273His</b> mutation abolishes DNA binding.",
            "isOpenAccess": "Y"
          },
          {
            "title": "A preprint without identifiers",
            "pubYear": "n.d.",
            "isOpenAccess": "N"
          }
        ]
      }
    }"#;

    #[test]
    fn test_parse_search_response() {
        let response: SearchResponse = serde_json::from_str(RESPONSE).unwrap();
        let hits = response.result_list.unwrap().result;
        assert!(hits[0].is_open_access());
        assert!(!hits[1].is_open_access());

        let publications: Vec<RawPublication> =
            hits.into_iter().map(Hit::into_publication).collect();
        let first = &publications[0];
        assert_eq!(first.pmid.as_deref(), Some("15607980"));
        assert_eq!(first.title, "Gain of function of a TP53 hot spot mutation");
        assert_eq!(first.authors, vec!["Doe J", "Roe R"]);
        assert_eq!(first.year, Some(2004));
        assert_eq!(first.journal.as_deref(), Some("Cell"));
        assert_eq!(
            first.abstract_text.as_deref(),
            Some("The p.Arg273His mutation abolishes DNA binding.")
        );

        let second = &publications[1];
        assert!(second.pmid.is_none());
        assert!(second.year.is_none());
        assert!(second.authors.is_empty());
    }

    #[test]
    fn test_strip_markup() {
        let xml = "<article><p>First   line.</p>\n<p>Second</p></article>";
        assert_eq!(strip_markup(xml), "First line. Second");
    }

    #[test]
    fn test_build_query() {
        assert_eq!(build_query("TP53", Some("R273H")), "\"TP53\" AND \"R273H\"");
        assert_eq!(build_query("TP53", None), "\"TP53\"");
    }
}
