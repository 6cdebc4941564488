//! Read-only scans over a token stream. Each one assumes the document already passed the
//! prepass, so an error item simply ends the scan.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::link::{self, LinkKind};
use crate::tokenizer::{Token, TokenizeError};

pub(crate) const NO_DOCTYPE: &str = "Document contains no doctype element";
pub(crate) const UNRECOGNISED_DOCTYPE: &str = "Unrecognised doctype";
pub(crate) const NO_TITLE: &str = "Document contains no title element";

const LEGACY_HTML_ID: &str = "-//w3c//dtd html";
const XHTML_ID: &str = "-//w3c//dtd xhtml";

/// Frequency of each heading level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingsCount {
    pub h1: usize,
    pub h2: usize,
    pub h3: usize,
    pub h4: usize,
    pub h5: usize,
    pub h6: usize,
}

impl HeadingsCount {
    /// Count `tag` if it is exactly one of `h1`..`h6`.
    pub(crate) fn add(&mut self, tag: &str) {
        let bucket = match tag {
            "h1" => &mut self.h1,
            "h2" => &mut self.h2,
            "h3" => &mut self.h3,
            "h4" => &mut self.h4,
            "h5" => &mut self.h5,
            "h6" => &mut self.h6,
            _ => return,
        };
        *bucket += 1;
    }

    pub(crate) fn total(&self) -> usize {
        self.h1 + self.h2 + self.h3 + self.h4 + self.h5 + self.h6
    }
}

/// Frequency of internal and external links.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinksCount {
    pub internal: usize,
    pub external: usize,
}

impl LinksCount {
    pub(crate) fn add(&mut self, kind: LinkKind) {
        match kind {
            LinkKind::Internal => self.internal += 1,
            LinkKind::External => self.external += 1,
        }
    }
}

/// Label of the first doctype in the document.
pub(crate) fn html_version<I>(tokens: I) -> String
where
    I: Iterator<Item = Result<Token, TokenizeError>>,
{
    let doctype = tokens.map_while(Result::ok).find_map(|token| match token {
        Token::Doctype(doctype) => Some(doctype),
        _ => None,
    });

    match doctype {
        Some(doctype) => classify_doctype(&doctype),
        None => NO_DOCTYPE.to_string(),
    }
}

fn classify_doctype(doctype: &str) -> String {
    let lowered = doctype.to_lowercase();

    if lowered == "html" || lowered == r#"html system "about:legacy-compat""# {
        return "HTML 5.0".to_string();
    }
    if let Some(version) = version_after(&lowered, LEGACY_HTML_ID) {
        return format!("HTML {}", version);
    }
    if let Some(version) = version_after(&lowered, XHTML_ID) {
        return format!("XHTML {}", version);
    }

    debug!("Unrecognised doctype {:?}", doctype);
    if doctype.trim().is_empty() {
        UNRECOGNISED_DOCTYPE.to_string()
    } else {
        format!("{}: {}", UNRECOGNISED_DOCTYPE, doctype)
    }
}

/// The version number that follows a public identifier, e.g. `4.01` in `-//w3c//dtd html 4.01//en`.
fn version_after<'a>(doctype: &'a str, public_id: &str) -> Option<&'a str> {
    let start = doctype.find(public_id)? + public_id.len();
    let rest = doctype[start..].trim_start();
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let version = rest[..end].trim_end_matches('.');

    if version.starts_with(|c: char| c.is_ascii_digit()) {
        Some(version)
    } else {
        None
    }
}

/// Text of the first `<title>` element.
pub(crate) fn page_title<I>(tokens: I) -> String
where
    I: Iterator<Item = Result<Token, TokenizeError>>,
{
    let mut tokens = tokens.map_while(Result::ok);

    while let Some(token) = tokens.next() {
        match token {
            Token::StartTag(tag) if tag.name.starts_with("title") => {
                return match tokens.next() {
                    Some(Token::Text(text)) => text.trim().to_string(),
                    _ => String::new(),
                };
            }
            _ => {}
        }
    }

    NO_TITLE.to_string()
}

pub(crate) fn headings_by_level<I>(tokens: I) -> HeadingsCount
where
    I: Iterator<Item = Result<Token, TokenizeError>>,
{
    let mut headings = HeadingsCount::default();
    for token in tokens.map_while(Result::ok) {
        if let Token::StartTag(tag) = token {
            headings.add(&tag.name);
        }
    }

    headings
}

/// Sort every anchor with a usable `href` into internal and external links relative to `base`.
/// Hrefs that do not parse as URLs are logged and left out.
pub(crate) fn links_by_type<I>(tokens: I, base: &Url) -> LinksCount
where
    I: Iterator<Item = Result<Token, TokenizeError>>,
{
    let mut links = LinksCount::default();
    for href in link::hrefs(tokens) {
        match link::resolve(base, &href) {
            Ok(target) => links.add(link::classify(base, &target)),
            Err(e) => warn!("Failed to parse href {:?} while counting links: {}", href, e),
        }
    }

    links
}

/// Best effort guess: a page has a login form when it has both a password input and a submit
/// input, wherever they appear.
pub(crate) fn has_login_form<I>(tokens: I) -> bool
where
    I: Iterator<Item = Result<Token, TokenizeError>>,
{
    let mut has_password = false;
    let mut has_submit = false;

    for token in tokens.map_while(Result::ok) {
        let tag = match token {
            Token::StartTag(tag) if tag.name.starts_with("input") => tag,
            _ => continue,
        };

        match tag.attr("type") {
            Some(kind) if kind.eq_ignore_ascii_case("password") => has_password = true,
            Some(kind) if kind.eq_ignore_ascii_case("submit") => has_submit = true,
            _ => {}
        }

        if has_password && has_submit {
            return true;
        }
    }

    false
}
