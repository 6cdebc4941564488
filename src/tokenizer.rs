use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Doctype, Tag as RawTag, TagKind, Token as RawToken, TokenSink, TokenSinkResult,
    Tokenizer, TokenizerOpts, TokenizerResult,
};
use thiserror::Error;
use tracing::trace;

/// Terminal error of a token stream that did not reach a clean end of input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("unexpected end of input on line {line}: {message}")]
    UnexpectedEof { line: u64, message: String },
}

/// A start or end tag with its attributes in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tag {
    pub(crate) name: String,
    pub(crate) attrs: Vec<(String, String)>,
}

impl Tag {
    /// Value of the first attribute named `key`.
    pub(crate) fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    StartTag(Tag),
    EndTag(Tag),
    Text(String),
    Doctype(String),
    Comment(String),
}

/// Produces a fresh token stream over a document.
///
/// Every call to `stream` starts again from the beginning of `text`, so independent scans never
/// share a cursor. A stream that runs out of items has reached a clean end of input; an `Err` item
/// is terminal and nothing follows it.
pub(crate) trait Tokenize {
    type Stream: Iterator<Item = Result<Token, TokenizeError>>;

    fn stream(&self, text: &str) -> Self::Stream;
}

/// Tokenizer backed by html5ever.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Html5Tokenizer;

impl Tokenize for Html5Tokenizer {
    type Stream = std::vec::IntoIter<Result<Token, TokenizeError>>;

    fn stream(&self, text: &str) -> Self::Stream {
        let mut input = BufferQueue::new();
        input.push_back(StrTendril::from_slice(text));

        let mut tokenizer = Tokenizer::new(Collector::default(), TokenizerOpts::default());
        // `Collector` never asks to run a script, so this loop only ever makes one pass.
        while let TokenizerResult::Script(()) = tokenizer.feed(&mut input) {}
        tokenizer.end();

        tokenizer.sink.tokens.into_iter()
    }
}

/// Collects html5ever tokens, merging adjacent character runs into a single text token.
#[derive(Debug, Default)]
struct Collector {
    tokens: Vec<Result<Token, TokenizeError>>,
    text: String,
    failed: bool,
}

impl Collector {
    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.tokens.push(Ok(Token::Text(text)));
        }
    }

    fn push(&mut self, token: Token) {
        self.flush_text();
        self.tokens.push(Ok(token));
    }
}

impl TokenSink for Collector {
    type Handle = ();

    fn process_token(&mut self, token: RawToken, line_number: u64) -> TokenSinkResult<()> {
        if self.failed {
            return TokenSinkResult::Continue;
        }

        match token {
            RawToken::CharacterTokens(text) => self.text.push_str(&text),
            RawToken::NullCharacterToken => self.text.push('\u{FFFD}'),
            RawToken::DoctypeToken(doctype) => self.push(Token::Doctype(render_doctype(&doctype))),
            RawToken::CommentToken(comment) => self.push(Token::Comment(comment.to_string())),
            RawToken::TagToken(tag) => {
                let raw_kind = raw_kind_after(&tag);
                self.push(convert_tag(tag));
                if let Some(kind) = raw_kind {
                    return TokenSinkResult::RawData(kind);
                }
            }
            RawToken::ParseError(message) => {
                if is_premature_eof(&message) {
                    self.flush_text();
                    self.tokens.push(Err(TokenizeError::UnexpectedEof {
                        line: line_number,
                        message: message.into_owned(),
                    }));
                    self.failed = true;
                } else {
                    trace!("Recoverable parse error on line {}: {}", line_number, message);
                }
            }
            RawToken::EOFToken => self.flush_text(),
        }

        TokenSinkResult::Continue
    }
}

/// html5ever reports truncated markup as "Unexpected EOF" (or "Saw EOF in state .." with exact
/// errors enabled).
fn is_premature_eof(message: &str) -> bool {
    message.starts_with("Unexpected EOF") || message.starts_with("Saw EOF")
}

/// Elements whose content a browser does not tokenize as markup.
fn raw_kind_after(tag: &RawTag) -> Option<RawKind> {
    if tag.kind != TagKind::StartTag {
        return None;
    }

    match &*tag.name {
        "title" | "textarea" => Some(RawKind::Rcdata),
        "style" | "xmp" | "iframe" | "noembed" | "noframes" => Some(RawKind::Rawtext),
        "script" => Some(RawKind::ScriptData),
        _ => None,
    }
}

fn convert_tag(tag: RawTag) -> Token {
    let converted = Tag {
        name: tag.name.to_string(),
        attrs: tag
            .attrs
            .into_iter()
            .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
            .collect(),
    };

    match tag.kind {
        TagKind::StartTag => Token::StartTag(converted),
        TagKind::EndTag => Token::EndTag(converted),
    }
}

/// Rebuild the doctype declaration payload, e.g. `html public "-//W3C//DTD HTML 4.01//EN"`.
fn render_doctype(doctype: &Doctype) -> String {
    let mut payload = doctype
        .name
        .as_ref()
        .map(|name| name.to_string())
        .unwrap_or_default();

    if let Some(public_id) = &doctype.public_id {
        payload.push_str(&format!(" public \"{}\"", public_id));
    }
    if let Some(system_id) = &doctype.system_id {
        if doctype.public_id.is_none() {
            payload.push_str(" system");
        }
        payload.push_str(&format!(" \"{}\"", system_id));
    }

    payload
}

#[cfg(test)]
mod tests {
    use super::{Html5Tokenizer, Tag, Token, TokenizeError, Tokenize};

    fn tokens(html: &str) -> Vec<Result<Token, TokenizeError>> {
        Html5Tokenizer.stream(html).collect()
    }

    #[test]
    fn test_tags_and_attributes() {
        let tokens = tokens(r#"<A HREF="/foo" href="/bar" class=x>Go</a>"#);

        assert_eq!(
            tokens,
            vec![
                Ok(Token::StartTag(Tag {
                    name: "a".into(),
                    attrs: vec![("href".into(), "/foo".into()), ("class".into(), "x".into())],
                })),
                Ok(Token::Text("Go".into())),
                Ok(Token::EndTag(Tag {
                    name: "a".into(),
                    attrs: vec![],
                })),
            ]
        );
    }

    #[test]
    fn test_first_attribute_wins() {
        let tag = Tag {
            name: "input".into(),
            attrs: vec![
                ("type".into(), "password".into()),
                ("type".into(), "submit".into()),
            ],
        };

        assert_eq!(tag.attr("type"), Some("password"));
        assert_eq!(tag.attr("name"), None);
    }

    #[test]
    fn test_text_is_coalesced() {
        let tokens = tokens("<p>fish &amp; chips</p>");
        assert_eq!(tokens[1], Ok(Token::Text("fish & chips".into())));
    }

    #[test]
    fn test_doctype_payload() {
        let tokens = tokens(
            r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 4.01//EN" "http://www.w3.org/TR/html4/strict.dtd">"#,
        );

        assert_eq!(
            tokens,
            vec![Ok(Token::Doctype(
                r#"html public "-//W3C//DTD HTML 4.01//EN" "http://www.w3.org/TR/html4/strict.dtd""#
                    .into()
            ))]
        );
    }

    #[test]
    fn test_script_content_is_text() {
        let tokens = tokens(r#"<script>if (a <b) { x("<a href='/nope'>") }</script>"#);

        assert_eq!(tokens.len(), 3);
        assert!(matches!(&tokens[1], Ok(Token::Text(t)) if t.contains("<a href='/nope'>")));
    }

    #[test]
    fn test_tokens_after_script_are_kept() {
        let tokens = tokens("<script>run()</script><h1>After</h1>");

        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[4], Ok(Token::Text("After".into())));
    }

    #[test]
    fn test_truncated_markup_fails() {
        let tokens = tokens(r#"<html><body><a href="/foo""#);

        assert!(matches!(
            tokens.last(),
            Some(Err(TokenizeError::UnexpectedEof { .. }))
        ));
        assert_eq!(tokens.iter().filter(|t| t.is_err()).count(), 1);
    }

    #[test]
    fn test_streams_are_independent() {
        let html = "<h1>a</h1><h2>b</h2>";
        let mut first = Html5Tokenizer.stream(html);
        first.next();

        let second: Vec<_> = Html5Tokenizer.stream(html).collect();
        assert_eq!(second.len(), 6);
        assert_eq!(first.count(), 5);
    }
}
