//! Reduce fetched HTML to the visible text of its body.
//!
//! Parsing follows HTML5 rules (html5ever, into a `scraper` tree) with
//! scripting disabled, so `<noscript>` content is ordinary markup. Markup
//! errors never fail; they only change which text survives.
use std::fmt;

use html5ever::driver::{self, ParseOpts};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::{LocalName, Namespace, QualName};
use scraper::{ElementRef, Html, Node};
use tracing::debug;

use crate::fetch::RawDocument;

/// Elements whose text never reaches the output.
const SKIPPED_ELEMENTS: [&str; 2] = ["script", "style"];
const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Newline-separated, trimmed, non-empty text lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CleanedText(String);

impl CleanedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for CleanedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CleanedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Outer HTML of the document's `<body>`, or `""` when the source has no
/// `<body>` start tag.
///
/// The tree builder would synthesise a body for any document, so presence
/// is decided from the token stream instead.
pub fn extract_body(doc: &RawDocument) -> String {
    if !has_body_tag(doc.as_str()) {
        return String::new();
    }
    let document = parse_document(doc.as_str());
    document
        .tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "body")
        .map(|body| body.html())
        .unwrap_or_default()
}

/// Strip markup from `body_html`, dropping `<script>` and `<style>` content.
///
/// ```
/// use gleaner_web::normalize::clean;
///
/// let text = clean("<body><script>x=1</script><p>Hello   world</p></body>");
/// assert_eq!(text.as_str(), "Hello   world");
/// ```
pub fn clean(body_html: &str) -> CleanedText {
    let fragment = parse_fragment(body_html);

    let mut pieces: Vec<&str> = Vec::new();
    for node in fragment.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !skipped {
            pieces.push(text);
        }
    }

    let joined = pieces.join("\n");
    let lines: Vec<&str> = joined
        .split(is_line_boundary)
        .map(|line| line.trim_matches(is_strippable))
        .filter(|line| !line.is_empty())
        .collect();

    CleanedText(lines.join("\n"))
}

fn parse_opts() -> ParseOpts {
    ParseOpts {
        tree_builder: TreeBuilderOpts {
            scripting_enabled: false,
            ..TreeBuilderOpts::default()
        },
        ..ParseOpts::default()
    }
}

fn parse_document(html: &str) -> Html {
    driver::parse_document(Html::new_document(), parse_opts()).one(html)
}

fn parse_fragment(html: &str) -> Html {
    let context = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from("body"));
    driver::parse_fragment(Html::new_fragment(), parse_opts(), context, Vec::new()).one(html)
}

/// Watches start tags for `body`, switching to raw text where the tree
/// builder would so that tags inside scripts and comments are not counted.
#[derive(Default)]
struct BodyTagScan {
    seen: bool,
}

impl TokenSink for BodyTagScan {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        let Token::TagToken(Tag {
            kind: TagKind::StartTag,
            name,
            ..
        }) = token
        else {
            return TokenSinkResult::Continue;
        };
        match &*name {
            "body" => {
                self.seen = true;
                TokenSinkResult::Continue
            }
            "script" => TokenSinkResult::RawData(RawKind::ScriptData),
            "style" | "xmp" | "iframe" | "noembed" | "noframes" => {
                TokenSinkResult::RawData(RawKind::Rawtext)
            }
            "title" | "textarea" => TokenSinkResult::RawData(RawKind::Rcdata),
            "plaintext" => TokenSinkResult::Plaintext,
            _ => TokenSinkResult::Continue,
        }
    }
}

fn has_body_tag(html: &str) -> bool {
    let mut tokenizer = Tokenizer::new(BodyTagScan::default(), TokenizerOpts::default());
    let mut input = BufferQueue::new();
    input.push_back(StrTendril::from_slice(html));
    let _ = tokenizer.feed(&mut input);
    tokenizer.end();
    tokenizer.sink.seen
}

/// `clean(extract_body(doc))`.
pub fn normalize(doc: &RawDocument) -> CleanedText {
    let body = extract_body(doc);
    let text = clean(&body);
    debug!(
        target: "gleaner.normalize",
        url = doc.url(),
        html_bytes = doc.as_str().len(),
        body_bytes = body.len(),
        chars = text.char_count(),
        "document normalized"
    );
    text
}

// LF, CR, VT, FF, FS, GS, RS, NEL, LS and PS all end a line. `\r\n` splits
// twice, leaving an empty line that the caller drops.
fn is_line_boundary(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

fn is_strippable(c: char) -> bool {
    c.is_whitespace() || ('\x1c'..='\x1f').contains(&c)
}
