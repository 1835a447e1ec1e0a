use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// A persisted transcript keyed by a caller-chosen id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Thread {
    pub thread_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
    #[serde(serialize_with = "millis_rfc3339")]
    pub timestamp: DateTime<Utc>,
}

fn millis_rfc3339<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_is_written_with_milliseconds() {
        let timestamp = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(903_761_474);
        let msg = Message {
            role: "user".into(),
            content: "hi".into(),
            timestamp,
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["timestamp"], "2026-01-01T00:00:00.903Z");
    }
}
