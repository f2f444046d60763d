use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One highlight or note recovered from the clippings export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clipping {
    pub title: String,
    pub content: String,
    #[serde(rename = "pageAt")]
    pub location: String,
    #[serde(rename = "createdAt", with = "rfc3339")]
    pub created_at: DateTime<Utc>,
}

/// Wire shape of a clipping for the `createClippings` mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClippingInput {
    pub title: String,
    pub content: String,
    #[serde(rename = "bookID")]
    pub book_id: &'static str,
    #[serde(rename = "pageAt")]
    pub page_at: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub source: &'static str,
}

impl From<&Clipping> for ClippingInput {
    fn from(c: &Clipping) -> Self {
        ClippingInput {
            title: c.title.clone(),
            content: c.content.clone(),
            book_id: "0",
            page_at: c.location.clone(),
            created_at: rfc3339::format(&c.created_at),
            source: "kindle",
        }
    }
}

/// RFC3339 in UTC with whole seconds and a `Z` suffix.
pub mod rfc3339 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
