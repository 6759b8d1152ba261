//! E-utilities `efetch` XML parsing.

use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::Publication;
use crate::bibtex::month_number;
use crate::regex::{literal, Regex};
use crate::Result;

static YEAR_REGEX: LazyLock<Regex> = LazyLock::new(|| literal(r"[0-9]{4}"));

/// Which publication field the text of the element being read belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Pmid,
    Title,
    LastName,
    ForeName,
    Initials,
    JournalTitle,
    JournalIso,
    Year,
    Month,
    MedlineDate,
    Volume,
    Issue,
    Pages,
    Abstract,
    Doi,
}

/// Text elements are matched on the tail of the element path.
const TARGETS: &[(&[&str], Target)] = &[
    (&["MedlineCitation", "PMID"], Target::Pmid),
    (&["Article", "ArticleTitle"], Target::Title),
    (&["AuthorList", "Author", "LastName"], Target::LastName),
    (&["AuthorList", "Author", "ForeName"], Target::ForeName),
    (&["AuthorList", "Author", "Initials"], Target::Initials),
    (&["Article", "Journal", "Title"], Target::JournalTitle),
    (&["Article", "Journal", "ISOAbbreviation"], Target::JournalIso),
    (&["PubDate", "Year"], Target::Year),
    (&["PubDate", "Month"], Target::Month),
    (&["PubDate", "MedlineDate"], Target::MedlineDate),
    (&["Journal", "JournalIssue", "Volume"], Target::Volume),
    (&["Journal", "JournalIssue", "Issue"], Target::Issue),
    (&["Pagination", "MedlinePgn"], Target::Pages),
    (&["Abstract", "AbstractText"], Target::Abstract),
    (&["PubmedData", "ArticleIdList", "ArticleId"], Target::Doi),
];

#[derive(Debug, Default)]
struct AuthorParts {
    last: String,
    fore: String,
    initials: String,
}

impl AuthorParts {
    /// `ForeName LastName`, else `Initials LastName`, else `LastName`.
    fn display(&self) -> Option<String> {
        if self.last.is_empty() {
            return None;
        }
        Some(if !self.fore.is_empty() {
            format!("{} {}", self.fore, self.last)
        } else if !self.initials.is_empty() {
            format!("{} {}", self.initials, self.last)
        } else {
            self.last.clone()
        })
    }
}

#[derive(Debug, Default)]
struct ArticleBuilder {
    pmid: String,
    title: String,
    authors: Vec<AuthorParts>,
    journal_title: String,
    journal_iso: String,
    year: String,
    month: String,
    medline_date: String,
    volume: String,
    issue: String,
    pages: String,
    abstract_parts: Vec<String>,
    doi: String,
}

impl ArticleBuilder {
    fn set(&mut self, target: Target, text: String) {
        let author = self.authors.last_mut();
        match target {
            Target::Pmid => fill(&mut self.pmid, text),
            Target::Title => fill(&mut self.title, text),
            Target::LastName => {
                if let Some(author) = author {
                    fill(&mut author.last, text);
                }
            }
            Target::ForeName => {
                if let Some(author) = author {
                    fill(&mut author.fore, text);
                }
            }
            Target::Initials => {
                if let Some(author) = author {
                    fill(&mut author.initials, text);
                }
            }
            Target::JournalTitle => fill(&mut self.journal_title, text),
            Target::JournalIso => fill(&mut self.journal_iso, text),
            Target::Year => fill(&mut self.year, text),
            Target::Month => fill(&mut self.month, text),
            Target::MedlineDate => fill(&mut self.medline_date, text),
            Target::Volume => fill(&mut self.volume, text),
            Target::Issue => fill(&mut self.issue, text),
            Target::Pages => fill(&mut self.pages, text),
            Target::Doi => fill(&mut self.doi, text),
            Target::Abstract => self.abstract_parts.push(text),
        }
    }

    fn finish(self) -> Option<Publication> {
        if self.pmid.is_empty() {
            return None;
        }
        let year = if self.year.is_empty() {
            YEAR_REGEX
                .find(&self.medline_date)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        } else {
            self.year
        };
        Some(Publication {
            pmid: self.pmid,
            title: self.title.trim_end_matches('.').to_string(),
            authors: self.authors.iter().filter_map(AuthorParts::display).collect(),
            journal: if self.journal_iso.is_empty() {
                self.journal_title
            } else {
                self.journal_iso
            },
            year,
            month: month_number(&self.month)
                .map(|m| m.to_string())
                .unwrap_or_default(),
            volume: self.volume,
            issue: self.issue,
            pages: self.pages,
            abstract_text: self.abstract_parts.join(" "),
            doi: self.doi,
            kind: "article".to_string(),
        })
    }
}

/// Text being collected for one element and the depth it was opened at.
struct Capture {
    target: Target,
    depth: usize,
    text: String,
}

/// Reads every `PubmedArticle` of an `efetch` response.
///
/// Articles without a PMID are skipped. Inline markup inside titles and
/// abstracts is flattened to its text, and whitespace runs collapse to one
/// space.
pub fn parse_efetch(xml: &str) -> Result<Vec<Publication>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut publications = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut article: Option<ArticleBuilder> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = element_name(&e);
                path.push(name);
                let name = path.last().map(String::as_str).unwrap_or_default();

                if name == "PubmedArticle" {
                    article = Some(ArticleBuilder::default());
                }
                if let Some(current) = article.as_mut() {
                    if name == "Author" && path_ends_with(&path, &["AuthorList", "Author"]) {
                        current.authors.push(AuthorParts::default());
                    }
                    if capture.is_none() {
                        if let Some(target) = target_for(&path) {
                            if target != Target::Doi || is_doi(&e)? {
                                capture = Some(Capture {
                                    target,
                                    depth: path.len(),
                                    text: String::new(),
                                });
                            }
                        }
                    }
                }
            }
            Event::Text(e) => {
                if let Some(capture) = capture.as_mut() {
                    capture.text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(capture) = capture.as_mut() {
                    capture.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                if capture.as_ref().is_some_and(|c| c.depth == path.len()) {
                    if let (Some(done), Some(current)) = (capture.take(), article.as_mut()) {
                        current.set(done.target, collapse(&done.text));
                    }
                }
                if path.pop().as_deref() == Some("PubmedArticle") {
                    if let Some(publication) = article.take().and_then(ArticleBuilder::finish) {
                        publications.push(publication);
                    }
                }
            }
            Event::Eof => break,
            _ => (),
        }
    }

    Ok(publications)
}

/// The first occurrence of a field wins.
fn fill(slot: &mut String, text: String) {
    if slot.is_empty() {
        *slot = text;
    }
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn path_ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(segment, expected)| segment == expected)
}

fn target_for(path: &[String]) -> Option<Target> {
    TARGETS
        .iter()
        .find(|(suffix, _)| path_ends_with(path, suffix))
        .map(|(_, target)| *target)
}

fn is_doi(e: &BytesStart<'_>) -> Result<bool> {
    Ok(match e.try_get_attribute("IdType")? {
        Some(attr) => attr.unescape_value()? == "doi",
        None => false,
    })
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EFETCH: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE PubmedArticleSet PUBLIC "-//NLM//DTD PubMedArticle, 1st January 2024//EN" "https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_240101.dtd">
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
      <PMID Version="1">38012345</PMID>
      <Article PubModel="Print">
        <Journal>
          <JournalIssue CitedMedium="Internet">
            <Volume>15</Volume>
            <Issue>3</Issue>
            <PubDate>
              <Year>2024</Year>
              <Month>Mar</Month>
            </PubDate>
          </JournalIssue>
          <Title>British journal of anaesthesia</Title>
          <ISOAbbreviation>Br J Anaesth</ISOAbbreviation>
        </Journal>
        <ArticleTitle>Effect of <i>propofol</i> on
          outcome.</ArticleTitle>
        <Pagination>
          <MedlinePgn>123-45</MedlinePgn>
        </Pagination>
        <Abstract>
          <AbstractText Label="BACKGROUND">Background &amp; aims.</AbstractText>
          <AbstractText Label="METHODS">Methods.</AbstractText>
        </Abstract>
        <AuthorList CompleteYN="Y">
          <Author ValidYN="Y">
            <LastName>Tolboom</LastName>
            <ForeName>Robert C</ForeName>
            <Initials>RC</Initials>
          </Author>
          <Author ValidYN="Y">
            <LastName>Smith</LastName>
            <Initials>J</Initials>
          </Author>
          <Author ValidYN="Y">
            <CollectiveName>Study Group</CollectiveName>
          </Author>
        </AuthorList>
      </Article>
      <CommentsCorrectionsList>
        <CommentsCorrections RefType="CommentIn">
          <PMID Version="1">99999999</PMID>
        </CommentsCorrections>
      </CommentsCorrectionsList>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">38012345</ArticleId>
        <ArticleId IdType="doi">10.1016/j.bja.2024.01.001</ArticleId>
      </ArticleIdList>
      <ReferenceList>
        <Reference>
          <ArticleIdList>
            <ArticleId IdType="doi">10.1000/other</ArticleId>
          </ArticleIdList>
        </Reference>
      </ReferenceList>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>37000001</PMID>
      <Article>
        <Journal>
          <JournalIssue>
            <PubDate>
              <MedlineDate>2019 Winter-2020 Spring</MedlineDate>
            </PubDate>
          </JournalIssue>
          <Title>Some Journal</Title>
        </Journal>
        <ArticleTitle>Untitled</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>
"#;

    #[test]
    fn test_parse_full_article() {
        let publications = parse_efetch(EFETCH).unwrap();
        assert_eq!(publications.len(), 2);

        assert_eq!(
            publications[0],
            Publication {
                pmid: "38012345".to_string(),
                title: "Effect of propofol on outcome".to_string(),
                authors: vec!["Robert C Tolboom".to_string(), "J Smith".to_string()],
                journal: "Br J Anaesth".to_string(),
                year: "2024".to_string(),
                month: "3".to_string(),
                volume: "15".to_string(),
                issue: "3".to_string(),
                pages: "123-45".to_string(),
                abstract_text: "Background & aims. Methods.".to_string(),
                doi: "10.1016/j.bja.2024.01.001".to_string(),
                kind: "article".to_string(),
            }
        );
    }

    #[test]
    fn test_medline_date_and_journal_fallback() {
        let publications = parse_efetch(EFETCH).unwrap();
        let second = &publications[1];
        assert_eq!(second.pmid, "37000001");
        assert_eq!(second.year, "2019");
        assert_eq!(second.month, "");
        assert_eq!(second.journal, "Some Journal");
        assert!(second.authors.is_empty());
        assert_eq!(second.doi, "");
    }

    #[test]
    fn test_empty_set() {
        assert_eq!(parse_efetch("<PubmedArticleSet></PubmedArticleSet>").unwrap(), vec![]);
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(parse_efetch("<PubmedArticleSet><PubmedArticle></Wrong>").is_err());
    }
}
