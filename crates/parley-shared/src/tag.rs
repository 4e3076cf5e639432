//! The tag wire format.
//!
//! One tag is `<name key="base64(value)" ...>post`. Attribute values are
//! always Base64 on the wire; the post runs to the end of the buffer and is
//! never encoded. Callers that embed tags in a larger stream find the end of
//! the post themselves (an end marker, or a length known out of band).

use std::collections::BTreeMap;
use std::fmt;

use crate::codec;
use crate::error::TagError;

/// A parsed or constructed tag.
///
/// Keeps both the human-readable head (decoded values, no post) and the
/// encoded wire form, so logging and sending never re-encode.
#[derive(Debug, Clone)]
pub struct Tag {
    name: String,
    attributes: BTreeMap<String, String>,
    post: Vec<u8>,
    decoded: String,
    encoded: Vec<u8>,
    head_len: usize,
}

impl Tag {
    /// Create a tag with no attributes and no post.
    pub fn new(name: impl Into<String>) -> Self {
        let mut tag = Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            post: Vec::new(),
            decoded: String::new(),
            encoded: Vec::new(),
            head_len: 0,
        };
        tag.render();
        tag
    }

    /// Build a tag from an interleaved key/value list. If the list has odd
    /// length the last element is the post, not a key.
    pub fn construct(name: impl Into<String>, parts: &[&str]) -> Self {
        let mut tag = Self::new(name);
        let mut pairs = parts.chunks_exact(2);
        for pair in &mut pairs {
            tag.attributes.insert(pair[0].to_string(), pair[1].to_string());
        }
        if let [post] = pairs.remainder() {
            tag.post = post.as_bytes().to_vec();
        }
        tag.render();
        tag
    }

    /// Add or replace an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self.render();
        self
    }

    pub fn with_post(mut self, post: impl Into<Vec<u8>>) -> Self {
        self.post = post.into();
        self.render();
        self
    }

    /// Parse a complete tag, decoding every attribute value.
    ///
    /// Values that are not valid Base64 are kept as their raw text.
    pub fn parse(input: &[u8]) -> Result<Self, TagError> {
        let head = TagHead::parse(input)?;

        let attributes: BTreeMap<String, String> = head
            .raw
            .iter()
            .map(|(k, v)| (k.clone(), codec::decode_or_raw(v)))
            .collect();

        let mut tag = Self {
            name: head.name,
            attributes,
            post: input[head.len..].to_vec(),
            decoded: String::new(),
            encoded: input.to_vec(),
            head_len: head.len,
        };
        tag.decoded = tag.render_decoded();
        Ok(tag)
    }

    /// Scan only the head of a tag, without decoding anything.
    pub fn parse_basic(input: &[u8]) -> Result<TagHead, TagError> {
        TagHead::parse(input)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// `true` when the attribute is `"true"` or `"1"`.
    pub fn attr_flag(&self, key: &str) -> bool {
        matches!(self.attr(key), Some("true") | Some("1"))
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn post(&self) -> &[u8] {
        &self.post
    }

    pub fn has_post(&self) -> bool {
        !self.post.is_empty()
    }

    /// The post as text, if it is UTF-8.
    pub fn post_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.post).ok()
    }

    /// Human-readable head with decoded values. Never includes the post.
    pub fn decoded(&self) -> &str {
        &self.decoded
    }

    pub fn decoded_len(&self) -> usize {
        self.decoded.len()
    }

    /// Wire form: encoded head followed by the post.
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    pub fn encoded_len(&self) -> usize {
        self.encoded.len()
    }

    /// Length of the encoded head, up to and including `>`.
    pub fn head_len(&self) -> usize {
        self.head_len
    }

    pub fn into_encoded(self) -> Vec<u8> {
        self.encoded
    }

    /// The same tag with its post dropped. The encoded head is reused as is.
    pub fn without_post(&self) -> Self {
        Self {
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            post: Vec::new(),
            decoded: self.decoded.clone(),
            encoded: self.encoded[..self.head_len].to_vec(),
            head_len: self.head_len,
        }
    }

    fn render(&mut self) {
        let mut head = String::with_capacity(self.name.len() + 2);
        head.push('<');
        head.push_str(&self.name);
        for (key, value) in &self.attributes {
            head.push(' ');
            head.push_str(key);
            head.push_str("=\"");
            head.push_str(&codec::encode(value));
            head.push('"');
        }
        head.push('>');

        self.head_len = head.len();
        let mut encoded = head.into_bytes();
        encoded.extend_from_slice(&self.post);
        self.encoded = encoded;
        self.decoded = self.render_decoded();
    }

    fn render_decoded(&self) -> String {
        let mut out = format!("<{}", self.name);
        for (key, value) in &self.attributes {
            out.push_str(&format!(" {key}=\"{value}\""));
        }
        out.push('>');
        out
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.attributes == other.attributes && self.post == other.post
    }
}

impl Eq for Tag {}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.decoded)
    }
}

/// The structural head of a tag: name, still-encoded attribute values, and
/// how many bytes the head occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagHead {
    pub name: String,
    pub raw: Vec<(String, String)>,
    pub len: usize,
}

impl TagHead {
    fn parse(input: &[u8]) -> Result<Self, TagError> {
        if input.first() != Some(&b'<') {
            return Err(TagError::NotATag);
        }

        let mut tokens: Vec<&[u8]> = Vec::new();
        let mut in_quotes = false;
        let mut token_start = 1;
        let mut head_len = None;

        for (i, &byte) in input.iter().enumerate().skip(1) {
            match byte {
                b'"' => in_quotes = !in_quotes,
                b' ' if !in_quotes => {
                    if i > token_start {
                        tokens.push(&input[token_start..i]);
                    }
                    token_start = i + 1;
                }
                b'>' if !in_quotes => {
                    if i > token_start {
                        tokens.push(&input[token_start..i]);
                    }
                    head_len = Some(i + 1);
                    break;
                }
                _ => {}
            }
        }

        let len = head_len.ok_or(TagError::Truncated)?;
        let mut tokens = tokens.into_iter();

        let name = match tokens.next() {
            Some(token) => token_str(token)?,
            None => return Err(TagError::Malformed("empty tag name".into())),
        };
        if name.contains(['=', '"', '<']) {
            return Err(TagError::Malformed(format!("invalid tag name {name:?}")));
        }

        let mut raw: Vec<(String, String)> = Vec::new();
        for token in tokens {
            let (key, value) = split_attribute(token_str(token)?)?;
            match raw.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => raw.push((key, value)),
            }
        }

        Ok(Self {
            name: name.to_string(),
            raw,
            len,
        })
    }

    /// The encoded value of an attribute.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.raw
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Decode a single attribute on demand.
    pub fn decoded(&self, key: &str) -> Option<String> {
        self.raw(key).map(codec::decode_or_raw)
    }
}

fn token_str(token: &[u8]) -> Result<&str, TagError> {
    std::str::from_utf8(token).map_err(|_| TagError::Malformed("non UTF-8 tag head".into()))
}

fn split_attribute(token: &str) -> Result<(String, String), TagError> {
    let (key, quoted) = token
        .split_once('=')
        .ok_or_else(|| TagError::Malformed(format!("attribute without value: {token:?}")))?;

    let value = quoted
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or_else(|| TagError::Malformed(format!("unquoted attribute value: {token:?}")))?;

    if key.is_empty() {
        return Err(TagError::Malformed("empty attribute key".into()));
    }

    Ok((key.to_string(), value.to_string()))
}
