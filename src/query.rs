//! Search query (DSL) understood by post sources, with the scraper's string syntax:
//! `"phrase" word lang:en since:2022-05-01 until:2022-05-05 conversation_id:123`.

use std::fmt;
use std::str::FromStr;
use time::macros::format_description;
use time::Date;

/// Filter for `PostSource::fetch_by_query`.
/// Keywords are stored lowercase and every one must appear in the post text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostQuery {
    pub keywords: Vec<String>,
    pub language: Option<String>,
    pub conversation_id: Option<String>,
    /// Inclusive, UTC day.
    pub since: Option<Date>,
    /// Exclusive, UTC day.
    pub until: Option<Date>,
}

impl PostQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyword(mut self, kw: impl AsRef<str>) -> Self {
        self.keywords.push(kw.as_ref().to_string());
        self.normalize()
    }
    pub fn language(mut self, lang: impl AsRef<str>) -> Self {
        self.language = Some(lang.as_ref().to_string());
        self.normalize()
    }
    pub fn conversation(mut self, id: impl AsRef<str>) -> Self {
        self.conversation_id = Some(id.as_ref().to_string());
        self.normalize()
    }
    pub fn since(mut self, d: Date) -> Self {
        self.since = Some(d);
        self
    }
    pub fn until(mut self, d: Date) -> Self {
        self.until = Some(d);
        self
    }

    /// Lowercase, trim, sort and dedup keywords; lowercase the language.
    pub fn normalize(mut self) -> Self {
        for k in self.keywords.iter_mut() {
            *k = k.trim().to_lowercase();
        }
        self.keywords.retain(|k| !k.is_empty());
        self.keywords.sort();
        self.keywords.dedup();
        self.language = self.language.map(|l| l.trim().to_lowercase()).filter(|l| !l.is_empty());
        self.conversation_id = self.conversation_id.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
        self
    }

    /// Same keywords and language, restricted to one conversation and without date bounds.
    /// Replies can land after the seed's window, so the window is dropped.
    pub fn narrowed_to(&self, conversation_id: &str) -> Self {
        Self {
            keywords: self.keywords.clone(),
            language: self.language.clone(),
            conversation_id: Some(conversation_id.to_string()),
            since: None,
            until: None,
        }
    }
}

impl fmt::Display for PostQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.keywords.iter().map(|k| format!("\"{k}\"")).collect();
        if let Some(l) = &self.language {
            parts.push(format!("lang:{l}"));
        }
        if let Some(c) = &self.conversation_id {
            parts.push(format!("conversation_id:{c}"));
        }
        if let Some(d) = self.since {
            parts.push(format!("since:{}", format_day(d)?));
        }
        if let Some(d) = self.until {
            parts.push(format!("until:{}", format_day(d)?));
        }
        f.write_str(&parts.join(" "))
    }
}

impl FromStr for PostQuery {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut q = PostQuery::default();
        for token in tokenize(s)? {
            let (phrase, quoted) = token;
            if quoted {
                q.keywords.push(phrase);
                continue;
            }
            match phrase.split_once(':') {
                Some(("lang", v)) => q.language = Some(v.to_string()),
                Some(("conversation_id", v)) => q.conversation_id = Some(v.to_string()),
                Some(("since", v)) => q.since = Some(parse_day(v)?),
                Some(("until", v)) => q.until = Some(parse_day(v)?),
                _ => q.keywords.push(phrase),
            }
        }
        Ok(q.normalize())
    }
}

fn format_day(d: Date) -> Result<String, fmt::Error> {
    d.format(format_description!("[year]-[month]-[day]")).map_err(|_| fmt::Error)
}

pub fn parse_day(s: &str) -> Result<Date, String> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]")).map_err(|e| format!("invalid date {s:?} (expected YYYY-MM-DD): {e}"))
}

/// Split on whitespace, keeping `"quoted phrases"` together. Returns `(text, was_quoted)`.
fn tokenize(s: &str) -> Result<Vec<(String, bool)>, String> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut phrase = String::new();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(ch) => phrase.push(ch),
                    None => return Err(format!("unterminated quote in query {s:?}")),
                }
            }
            out.push((phrase, true));
        } else {
            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            out.push((word, false));
        }
    }
    Ok(out)
}
