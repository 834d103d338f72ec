//! Route patterns: compilation, matching and reverse generation.
//!
//! A pattern is a path template made of literal text and `{name}` or
//! `{name:type}` placeholders:
//!
//! | Type | Aliases | Matches | Extracted as |
//! |---|---|---|---|
//! | `str` | `string`, *(none)* | one segment, no `/` | [`Param::Str`] |
//! | `int` | `d` | `-?[0-9]+` fitting an `i64` | [`Param::Int`] |
//! | `float` | `f` | `-?[0-9]+(.[0-9]+)?` | [`Param::Float`] |
//! | `path` | | the rest, `/` included | [`Param::Path`] |
//!
//! Matching is anchored to the whole path. A segment that fails its type
//! conversion is a mismatch, not an error: `/items/abc` simply does not match
//! `/items/{id:int}`. Numbers are plain decimals, so `inf` and `NaN` are not
//! floats.
//!
//! Paths are matched percent-encoded, as they arrive. Extracted values are
//! decoded (`/greet/John%20Doe` gives `"John Doe"`) and [`Pattern::url`]
//! encodes what it substitutes, so generated URLs always match their own
//! pattern.

use std::fmt;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use regex::Regex;

use crate::error::Error;

/// A single typed value extracted from a path.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    Str(String),
    Int(i64),
    Float(f64),
    Path(String),
}

impl Param {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Path(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) | Self::Path(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self { Self::Str(s.to_owned()) }
}

impl From<String> for Param {
    fn from(s: String) -> Self { Self::Str(s) }
}

impl From<i64> for Param {
    fn from(n: i64) -> Self { Self::Int(n) }
}

impl From<i32> for Param {
    fn from(n: i32) -> Self { Self::Int(n.into()) }
}

impl From<f64> for Param {
    fn from(n: f64) -> Self { Self::Float(n) }
}

/// Path parameters, in the order their placeholders appear in the pattern.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params(Vec<(String, Param)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter and returns `self`, for building reverse-URL inputs:
    /// `Params::new().with("id", 42)`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Param>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets `name`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Param>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// The parameter as text. `Str` and `Path` values only.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Param::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Param::as_int)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Param::as_float)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Converter {
    Str,
    Int,
    Float,
    Path,
}

impl Converter {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "" | "str" | "string" => Some(Self::Str),
            "int" | "d"           => Some(Self::Int),
            "float" | "f"         => Some(Self::Float),
            "path"                => Some(Self::Path),
            _                     => None,
        }
    }

    fn regex(self) -> &'static str {
        match self {
            Self::Str   => "[^/]+",
            Self::Int   => "-?[0-9]+",
            Self::Float => r"-?[0-9]+(?:\.[0-9]+)?",
            Self::Path  => ".+",
        }
    }

    /// Decodes a matched, still percent-encoded value.
    fn convert(self, raw: &str) -> Option<Param> {
        let text = percent_decode_str(raw).decode_utf8().ok()?;
        match self {
            Self::Str   => Some(Param::Str(text.into_owned())),
            Self::Int   => text.parse().ok().map(Param::Int),
            Self::Float => text.parse().ok().map(Param::Float),
            Self::Path  => Some(Param::Path(text.into_owned())),
        }
    }

    fn encode(self, text: &str) -> String {
        match self {
            Self::Path => utf8_percent_encode(text, PATH).to_string(),
            _ => utf8_percent_encode(text, SEGMENT).to_string(),
        }
    }
}

/// Bytes escaped inside one path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/');

/// Same as [`SEGMENT`], `/` kept.
const PATH: &AsciiSet = &SEGMENT.remove(b'/');

#[derive(Clone, Debug)]
enum Segment {
    Literal(String),
    Param { name: String, converter: Converter, check: Regex },
}

/// A compiled route pattern.
#[derive(Clone, Debug)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
    regex: Regex,
}

impl Pattern {
    /// Compiles `pattern`.
    ///
    /// Fails with [`Error::Route`] on unbalanced braces, empty or repeated
    /// placeholder names, and unknown placeholder types.
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        let segments = parse(pattern)?;

        let mut re = String::from("^");
        for segment in &segments {
            match segment {
                Segment::Literal(text) => re.push_str(&regex::escape(&Converter::Path.encode(text))),
                Segment::Param { converter, .. } => {
                    re.push('(');
                    re.push_str(converter.regex());
                    re.push(')');
                }
            }
        }
        re.push('$');

        let regex = Regex::new(&re).map_err(|e| Error::route(pattern, e.to_string()))?;
        Ok(Self { source: pattern.to_owned(), segments, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names, in order of appearance.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Matches the whole of `path`, returning the typed parameters.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        let mut params = Params::new();
        let placeholders = self.segments.iter().filter_map(|s| match s {
            Segment::Param { name, converter, .. } => Some((name, *converter)),
            Segment::Literal(_) => None,
        });
        for (i, (name, converter)) in placeholders.enumerate() {
            let raw = captures.get(i + 1)?.as_str();
            params.insert(name.as_str(), converter.convert(raw)?);
        }
        Some(params)
    }

    /// Builds a concrete path by substituting `params` into the placeholders.
    /// Extra parameters are ignored.
    ///
    /// Values are percent-encoded. A value its placeholder would not match
    /// back (`"abc"` for an `int`, an empty string) is an
    /// [`Error::InvalidParam`].
    pub fn url(&self, params: &Params) -> Result<String, Error> {
        let mut url = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => url.push_str(&Converter::Path.encode(text)),
                Segment::Param { name, converter, check } => {
                    let value = params.get(name).ok_or_else(|| Error::MissingParam {
                        pattern: self.source.clone(),
                        param: name.clone(),
                    })?;
                    let text = converter.encode(&value.to_string());
                    if !check.is_match(&text) || converter.convert(&text).is_none() {
                        return Err(Error::InvalidParam {
                            pattern: self.source.clone(),
                            param: name.clone(),
                            value: value.to_string(),
                        });
                    }
                    url.push_str(&text);
                }
            }
        }
        Ok(url)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

fn parse(pattern: &str) -> Result<Vec<Segment>, Error> {
    let mut segments = Vec::new();
    let mut names: Vec<String> = Vec::new();
    let mut rest = pattern;

    while !rest.is_empty() {
        match rest.find(['{', '}']) {
            None => {
                segments.push(Segment::Literal(rest.to_owned()));
                break;
            }
            Some(i) if rest.as_bytes()[i] == b'}' => {
                return Err(Error::route(pattern, "unmatched `}`"));
            }
            Some(open) => {
                if open > 0 {
                    segments.push(Segment::Literal(rest[..open].to_owned()));
                }
                let close = rest[open..]
                    .find('}')
                    .map(|i| open + i)
                    .ok_or_else(|| Error::route(pattern, "unclosed `{`"))?;
                let inner = &rest[open + 1..close];
                if inner.contains('{') {
                    return Err(Error::route(pattern, "nested `{`"));
                }

                let (name, ty) = inner.split_once(':').unwrap_or((inner, ""));
                let name = name.trim();
                if name.is_empty() {
                    return Err(Error::route(pattern, "placeholder without a name"));
                }
                if names.iter().any(|n| n == name) {
                    return Err(Error::route(pattern, format!("duplicate placeholder `{name}`")));
                }
                let converter = Converter::parse(ty.trim()).ok_or_else(|| {
                    Error::route(pattern, format!("unknown placeholder type `{}`", ty.trim()))
                })?;

                let check = Regex::new(&format!("^(?:{})$", converter.regex()))
                    .map_err(|e| Error::route(pattern, e.to_string()))?;
                names.push(name.to_owned());
                segments.push(Segment::Param { name: name.to_owned(), converter, check });
                rest = &rest[close + 1..];
            }
        }
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(p: &str) -> Pattern {
        Pattern::compile(p).unwrap()
    }

    #[test]
    fn literal_pattern_is_anchored() {
        let p = compile("/about");
        assert_eq!(p.matches("/about"), Some(Params::new()));
        assert_eq!(p.matches("/about/"), None);
        assert_eq!(p.matches("/aboutx"), None);
        assert_eq!(p.matches("/x/about"), None);
    }

    #[test]
    fn int_placeholder_extracts_integer() {
        let p = compile("/items/{item_id:int}");
        let params = p.matches("/items/42").unwrap();
        assert_eq!(params.get("item_id"), Some(&Param::Int(42)));
        assert_eq!(params.int("item_id"), Some(42));
        assert_eq!(p.matches("/items/abc"), None);
        assert_eq!(p.matches("/items/4.2"), None);
    }

    #[test]
    fn str_placeholder_excludes_slash() {
        let p = compile("/greet/{person}");
        assert_eq!(p.matches("/greet/ada").unwrap().str("person"), Some("ada"));
        assert_eq!(p.matches("/greet/ada/lovelace"), None);
    }

    #[test]
    fn float_and_path_placeholders() {
        let p = compile("/scale/{factor:float}/{rest:path}");
        let params = p.matches("/scale/1.5/a/b/c.txt").unwrap();
        assert_eq!(params.float("factor"), Some(1.5));
        assert_eq!(params.get("rest"), Some(&Param::Path("a/b/c.txt".into())));
    }

    #[test]
    fn short_type_aliases() {
        let p = compile("/add/{x:d}/{y:d}");
        let params = p.matches("/add/2/-3").unwrap();
        assert_eq!((params.int("x"), params.int("y")), (Some(2), Some(-3)));
    }

    #[test]
    fn placeholders_inside_a_segment() {
        let p = compile("/files/{name}.{ext}");
        let params = p.matches("/files/report.pdf").unwrap();
        assert_eq!(params.str("ext"), Some("pdf"));
        assert_eq!(params.iter().map(|(k, _)| k).collect::<Vec<_>>(), ["name", "ext"]);
    }

    #[test]
    fn literal_regex_characters_are_escaped() {
        let p = compile("/v1.0/(x)");
        assert!(p.matches("/v1.0/(x)").is_some());
        assert!(p.matches("/v1x0/(x)").is_none());
    }

    #[test]
    fn url_substitutes_params() {
        let p = compile("/users/{id:int}/posts/{slug}");
        let url = p.url(&Params::new().with("slug", "hello").with("id", 7)).unwrap();
        assert_eq!(url, "/users/7/posts/hello");
        assert_eq!(p.matches(&url).unwrap().int("id"), Some(7));
    }

    #[test]
    fn url_requires_every_placeholder() {
        let p = compile("/users/{id}");
        let err = p.url(&Params::new()).unwrap_err();
        assert!(matches!(err, Error::MissingParam { param, .. } if param == "id"));
    }

    #[test]
    fn numbers_are_plain_decimals() {
        let p = compile("/scale/{factor:float}");
        assert_eq!(p.matches("/scale/-2").unwrap().float("factor"), Some(-2.0));
        for odd in ["/scale/inf", "/scale/NaN", "/scale/1e3", "/scale/.5", "/scale/+1"] {
            assert_eq!(p.matches(odd), None, "{odd}");
        }
        assert!(matches!(p.url(&Params::new().with("factor", f64::NAN)), Err(Error::InvalidParam { .. })));
        assert!(matches!(p.url(&Params::new().with("factor", f64::INFINITY)), Err(Error::InvalidParam { .. })));
    }

    #[test]
    fn extracted_values_are_percent_decoded() {
        let p = compile("/greet/{person}");
        assert_eq!(p.matches("/greet/John%20Doe").unwrap().str("person"), Some("John Doe"));
        assert_eq!(p.matches("/greet/a%2Fb").unwrap().str("person"), Some("a/b"));
        assert_eq!(p.matches("/greet/%FF"), None);
    }

    #[test]
    fn url_encodes_values() {
        let p = compile("/greet/{person}/{rest:path}");
        let params = Params::new().with("person", "a/b c").with("rest", Param::Path("x y/z".into()));
        let url = p.url(&params).unwrap();
        assert_eq!(url, "/greet/a%2Fb%20c/x%20y/z");
        assert_eq!(p.matches(&url), Some(params));

        let p = compile("/my files/{name}");
        let url = p.url(&Params::new().with("name", "100%")).unwrap();
        assert_eq!(url, "/my%20files/100%25");
        assert_eq!(p.matches(&url).unwrap().str("name"), Some("100%"));
    }

    #[test]
    fn url_rejects_values_the_route_would_not_match() {
        let p = compile("/items/{id:int}");
        let err = p.url(&Params::new().with("id", "abc")).unwrap_err();
        assert!(matches!(err, Error::InvalidParam { param, value, .. } if param == "id" && value == "abc"));
        assert_eq!(p.url(&Params::new().with("id", "12")).unwrap(), "/items/12");

        let p = compile("/greet/{person}");
        assert!(matches!(p.url(&Params::new().with("person", "")), Err(Error::InvalidParam { .. })));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        for bad in ["/a/{id", "/a/id}", "/a/{}", "/a/{x}/{x}", "/a/{x:uuid}", "/a/{{x}}"] {
            assert!(matches!(Pattern::compile(bad), Err(Error::Route { .. })), "{bad}");
        }
    }
}
