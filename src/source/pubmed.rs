// src/source/pubmed.rs
//! PubMed E-utilities client: ESearch for PMIDs, EFetch for full records.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;

use crate::paper::{Paper, Source};
use crate::source::MAX_AUTHORS_DISPLAY;

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

pub const DEFAULT_DAYS_BACK: i64 = 7;
pub const DEFAULT_MAX_RESULTS: usize = 200;
const DEFAULT_ENTREZ_EMAIL: &str = "user@example.com";

pub struct PubMedClient {
    http: reqwest::Client,
    email: String,
}

impl PubMedClient {
    /// Entrez email comes from `NCBI_EMAIL`; NCBI accepts a placeholder, so
    /// absence is not a configuration error.
    pub fn from_env() -> Self {
        let email = std::env::var("NCBI_EMAIL").unwrap_or_else(|_| DEFAULT_ENTREZ_EMAIL.to_string());
        Self::new(email)
    }

    pub fn new(email: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("longevity-lit-digest/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self { http, email }
    }

    /// Search PubMed for articles matching `query` published in the last
    /// `days` days, returning at most `max_results` PMIDs sorted by
    /// relevance.
    pub async fn search(&self, query: &str, days: i64, max_results: usize) -> Result<Vec<String>> {
        let since = (Utc::now() - ChronoDuration::days(days))
            .format("%Y/%m/%d")
            .to_string();
        let full_query =
            format!("{query} AND ({since}[Date - Publication] : 3000[Date - Publication])");

        let resp = self
            .http
            .get(ESEARCH_URL)
            .query(&[
                ("db", "pubmed"),
                ("term", full_query.as_str()),
                ("retmax", &max_results.to_string()),
                ("sort", "relevance"),
                ("retmode", "json"),
                ("email", self.email.as_str()),
            ])
            .send()
            .await
            .context("pubmed esearch request")?
            .error_for_status()
            .context("pubmed esearch non-2xx")?;

        let body = resp.text().await.context("pubmed esearch body")?;
        parse_esearch_ids(&body)
    }

    /// Resolve PMIDs to full article records.
    pub async fn fetch_details(&self, pmids: &[String]) -> Result<Vec<Paper>> {
        if pmids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = pmids.join(",");
        let resp = self
            .http
            .get(EFETCH_URL)
            .query(&[
                ("db", "pubmed"),
                ("id", ids.as_str()),
                ("rettype", "abstract"),
                ("retmode", "xml"),
                ("email", self.email.as_str()),
            ])
            .send()
            .await
            .context("pubmed efetch request")?
            .error_for_status()
            .context("pubmed efetch non-2xx")?;

        let body = resp.text().await.context("pubmed efetch body")?;
        parse_efetch_articles(&body)
    }
}

pub fn parse_esearch_ids(body: &str) -> Result<Vec<String>> {
    #[derive(Deserialize)]
    struct ESearchEnvelope {
        esearchresult: ESearchResult,
    }
    #[derive(Deserialize)]
    struct ESearchResult {
        #[serde(default)]
        idlist: Vec<String>,
    }

    let env: ESearchEnvelope =
        serde_json::from_str(body).context("parsing pubmed esearch json")?;
    Ok(env.esearchresult.idlist)
}

// ---- EFetch XML shapes (only the fields we read) ----

#[derive(Debug, Deserialize)]
struct PubmedArticleSet {
    #[serde(rename = "PubmedArticle", default)]
    articles: Vec<PubmedArticleXml>,
}

#[derive(Debug, Deserialize)]
struct PubmedArticleXml {
    #[serde(rename = "MedlineCitation")]
    medline: MedlineCitation,
    #[serde(rename = "PubmedData")]
    pubmed_data: Option<PubmedData>,
}

#[derive(Debug, Deserialize)]
struct MedlineCitation {
    #[serde(rename = "Article")]
    article: ArticleXml,
    #[serde(rename = "DateCompleted")]
    date_completed: Option<DateParts>,
}

#[derive(Debug, Deserialize)]
struct ArticleXml {
    #[serde(rename = "ArticleTitle")]
    title: Option<String>,
    #[serde(rename = "Abstract")]
    abstract_block: Option<AbstractBlock>,
    #[serde(rename = "AuthorList")]
    author_list: Option<AuthorList>,
    #[serde(rename = "Journal")]
    journal: Option<JournalXml>,
    #[serde(rename = "ArticleDate")]
    article_date: Option<DateParts>,
}

#[derive(Debug, Deserialize)]
struct AbstractBlock {
    #[serde(rename = "AbstractText", default)]
    parts: Vec<AbstractText>,
}

#[derive(Debug, Deserialize)]
struct AbstractText {
    #[serde(rename = "$text")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<AuthorXml>,
}

#[derive(Debug, Deserialize)]
struct AuthorXml {
    #[serde(rename = "LastName")]
    last_name: Option<String>,
    #[serde(rename = "Initials")]
    initials: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JournalXml {
    #[serde(rename = "Title")]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateParts {
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "Month")]
    month: Option<String>,
    #[serde(rename = "Day")]
    day: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PubmedData {
    #[serde(rename = "ArticleIdList")]
    id_list: Option<ArticleIdList>,
}

#[derive(Debug, Deserialize)]
struct ArticleIdList {
    #[serde(rename = "ArticleId", default)]
    ids: Vec<ArticleId>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    #[serde(rename = "@IdType")]
    id_type: String,
    #[serde(rename = "$text")]
    value: Option<String>,
}

fn format_date(parts: &DateParts) -> String {
    let year = parts.year.clone().unwrap_or_else(|| "2025".to_string());
    let month = format!("{:0>2}", parts.month.as_deref().unwrap_or("01"));
    let day = format!("{:0>2}", parts.day.as_deref().unwrap_or("01"));
    format!("{year}-{month}-{day}")
}

fn format_authors(list: Option<&AuthorList>) -> String {
    let Some(list) = list else {
        return "Unknown authors".to_string();
    };
    let mut names: Vec<String> = list
        .authors
        .iter()
        .take(MAX_AUTHORS_DISPLAY)
        .filter_map(|a| {
            let last = a.last_name.as_deref()?;
            let initials = a.initials.as_deref().unwrap_or_default();
            Some(format!("{last} {initials}").trim().to_string())
        })
        .collect();
    if list.authors.len() > MAX_AUTHORS_DISPLAY {
        names.push("et al.".to_string());
    }
    if names.is_empty() {
        "Unknown authors".to_string()
    } else {
        names.join(", ")
    }
}

pub fn parse_efetch_articles(xml: &str) -> Result<Vec<Paper>> {
    let set: PubmedArticleSet = from_str(xml).context("parsing pubmed efetch xml")?;

    let mut papers = Vec::with_capacity(set.articles.len());
    for article in set.articles {
        let data = &article.medline.article;

        let title = data
            .title
            .clone()
            .unwrap_or_else(|| "No title available.".to_string());

        let abstract_text = data
            .abstract_block
            .as_ref()
            .map(|b| {
                b.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "No abstract available.".to_string());

        let pub_date = data
            .article_date
            .as_ref()
            .or(article.medline.date_completed.as_ref())
            .map(format_date)
            .unwrap_or_else(|| "Unknown".to_string());

        let mut pmid = None;
        let mut doi = None;
        if let Some(ids) = article.pubmed_data.as_ref().and_then(|d| d.id_list.as_ref()) {
            for id in &ids.ids {
                match id.id_type.as_str() {
                    "pubmed" => pmid = id.value.clone(),
                    "doi" => doi = id.value.clone(),
                    _ => {}
                }
            }
        }

        let url = match &pmid {
            Some(p) => format!("https://pubmed.ncbi.nlm.nih.gov/{p}/"),
            None => "https://pubmed.ncbi.nlm.nih.gov/".to_string(),
        };

        let mut paper = Paper::new(title, Source::PubMed);
        paper.abstract_text = abstract_text;
        paper.pub_date = pub_date;
        paper.pmid = pmid;
        paper.doi = doi;
        paper.url = url;
        paper.authors = format_authors(data.author_list.as_ref());
        paper.journal = data
            .journal
            .as_ref()
            .and_then(|j| j.title.clone())
            .unwrap_or_else(|| "Unknown journal".to_string());

        papers.push(paper);
    }
    Ok(papers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esearch_json_yields_idlist() {
        let body = r#"{"esearchresult": {"idlist": ["111", "222"], "count": "2"}}"#;
        assert_eq!(parse_esearch_ids(body).unwrap(), vec!["111", "222"]);
    }

    #[test]
    fn esearch_missing_idlist_is_empty() {
        let body = r#"{"esearchresult": {"count": "0"}}"#;
        assert!(parse_esearch_ids(body).unwrap().is_empty());
    }

    const EFETCH_FIXTURE: &str = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <Article>
        <Journal><Title>Nature Aging</Title></Journal>
        <ArticleTitle>Rapamycin extends lifespan in mice</ArticleTitle>
        <Abstract>
          <AbstractText>Background text.</AbstractText>
          <AbstractText>Results text.</AbstractText>
        </Abstract>
        <AuthorList>
          <Author><LastName>Miller</LastName><Initials>RA</Initials></Author>
          <Author><LastName>Strong</LastName><Initials>R</Initials></Author>
          <Author><LastName>Harrison</LastName><Initials>DE</Initials></Author>
          <Author><LastName>Nadon</LastName><Initials>NL</Initials></Author>
          <Author><LastName>Smith</LastName><Initials>A</Initials></Author>
          <Author><LastName>Jones</LastName><Initials>B</Initials></Author>
        </AuthorList>
        <ArticleDate><Year>2026</Year><Month>8</Month><Day>3</Day></ArticleDate>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">40000001</ArticleId>
        <ArticleId IdType="doi">10.1038/s43587-026-0001</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn efetch_xml_maps_to_paper_fields() {
        let papers = parse_efetch_articles(EFETCH_FIXTURE).unwrap();
        assert_eq!(papers.len(), 1);
        let p = &papers[0];
        assert_eq!(p.title, "Rapamycin extends lifespan in mice");
        assert_eq!(p.abstract_text, "Background text. Results text.");
        assert_eq!(p.pmid.as_deref(), Some("40000001"));
        assert_eq!(p.doi.as_deref(), Some("10.1038/s43587-026-0001"));
        assert_eq!(p.journal, "Nature Aging");
        assert_eq!(p.pub_date, "2026-08-03");
        assert_eq!(p.url, "https://pubmed.ncbi.nlm.nih.gov/40000001/");
        // Six authors: five shown, then et al.
        assert!(p.authors.starts_with("Miller RA, Strong R"));
        assert!(p.authors.ends_with("et al."));
        // Score fields start at the sentinel.
        assert_eq!(p.relevance, -1);
        assert!(!p.is_scored());
    }

    #[test]
    fn missing_abstract_gets_placeholder() {
        let xml = r#"<PubmedArticleSet><PubmedArticle><MedlineCitation><Article>
            <ArticleTitle>Title only</ArticleTitle>
        </Article></MedlineCitation></PubmedArticle></PubmedArticleSet>"#;
        let papers = parse_efetch_articles(xml).unwrap();
        assert_eq!(papers[0].abstract_text, "No abstract available.");
        assert_eq!(papers[0].journal, "Unknown journal");
        assert_eq!(papers[0].authors, "Unknown authors");
        assert_eq!(papers[0].pub_date, "Unknown");
    }
}
