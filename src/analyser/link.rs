use url::Url;

use crate::tokenizer::{Token, TokenizeError};

/// Whether a link stays on the page's own site or leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkKind {
    Internal,
    External,
}

/// Resolve `href` against the URL of the page it was found on.
pub(crate) fn resolve(base: &Url, href: &str) -> Result<Url, url::ParseError> {
    base.join(href)
}

/// Classify a resolved link target by comparing its host (and explicit port) with the page's.
/// Targets without a host at all, such as `mailto:` links, never leave the page.
pub(crate) fn classify(base: &Url, target: &Url) -> LinkKind {
    match target.host() {
        None => LinkKind::Internal,
        Some(host) if base.host().as_ref() == Some(&host) && target.port() == base.port() => {
            LinkKind::Internal
        }
        Some(_) => LinkKind::External,
    }
}

/// Fragment-only references point back into the same document.
pub(crate) fn is_fragment(href: &str) -> bool {
    href.starts_with('#')
}

/// The `href` of every anchor start tag, skipping anchors without one or with an empty one.
pub(crate) fn hrefs<I>(tokens: I) -> impl Iterator<Item = String>
where
    I: Iterator<Item = Result<Token, TokenizeError>>,
{
    tokens.map_while(Result::ok).filter_map(|token| match token {
        Token::StartTag(tag) if tag.name == "a" => tag
            .attr("href")
            .filter(|href| !href.is_empty())
            .map(String::from),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::{classify, hrefs, is_fragment, resolve, LinkKind};
    use crate::tokenizer::{Html5Tokenizer, Tokenize};

    fn kind(href: &str) -> LinkKind {
        let base = Url::parse("https://example.com/blog/post").unwrap();
        classify(&base, &resolve(&base, href).unwrap())
    }

    #[test]
    fn test_classify() {
        assert_eq!(kind("/about"), LinkKind::Internal);
        assert_eq!(kind("next"), LinkKind::Internal);
        assert_eq!(kind("#top"), LinkKind::Internal);
        assert_eq!(kind("?page=2"), LinkKind::Internal);
        assert_eq!(kind("https://example.com/contact"), LinkKind::Internal);
        assert_eq!(kind("http://example.com/contact"), LinkKind::Internal);
        assert_eq!(kind("mailto:someone@example.org"), LinkKind::Internal);

        assert_eq!(kind("https://rust-lang.org/"), LinkKind::External);
        assert_eq!(kind("//cdn.example.net/lib.js"), LinkKind::External);
        assert_eq!(kind("https://sub.example.com/"), LinkKind::External);
        assert_eq!(kind("https://example.com:8443/"), LinkKind::External);
    }

    #[test]
    fn test_unparseable_href() {
        let base = Url::parse("https://example.com").unwrap();
        assert!(resolve(&base, "http://[::1").is_err());
    }

    #[test]
    fn test_fragment() {
        assert!(is_fragment("#section-2"));
        assert!(!is_fragment("/page#section-2"));
    }

    #[test]
    fn test_hrefs() {
        let html = r##"
            <a href="/foo">foo</a>
            <a>no href</a>
            <a href="">empty</a>
            <area href="/map">
            <a name="x" href="#top" href="/dup">top</a>
        "##;

        let found: Vec<String> = hrefs(Html5Tokenizer.stream(html)).collect();
        assert_eq!(found, vec!["/foo".to_string(), "#top".to_string()]);
    }
}
