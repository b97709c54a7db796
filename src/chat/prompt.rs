//! The fixed system prompt that opens every generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Approximate answer length the model is asked to stay within.
pub const TARGET_TOKENS: u32 = 512;
pub const TARGET_WORDS: u32 = 300;

/// Caller location hints supplied by the edge in front of the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestGeo {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub timezone: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl RequestGeo {
    /// `"City, Region, Country"` from whichever parts are known.
    pub fn place(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.city, &self.region, &self.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

/// Build the system prompt for one turn.
pub fn build_system_prompt(geo: &RequestGeo, now: DateTime<Utc>) -> String {
    let mut prompt = String::from(
        "You are a helpful assistant in a chat application. \
         Answer clearly and concisely.\n",
    );

    prompt.push_str(&format!(
        "\nGuidelines:\n\
         - Keep answers under roughly {TARGET_TOKENS} tokens ({TARGET_WORDS} words) unless the user asks for more detail.\n\
         - Use plain text or Markdown. Never output HTML.\n\
         - Do not share personal opinions; stay factual and neutral.\n"
    ));

    prompt.push_str("\nContext about the user's request:\n");
    prompt.push_str(&format!(
        "- Current time (UTC): {}\n",
        now.format("%Y-%m-%d %H:%M")
    ));
    if let Some(place) = geo.place() {
        prompt.push_str(&format!("- Approximate location: {place}\n"));
    }
    if let Some(tz) = geo.timezone.as_deref().filter(|t| !t.is_empty()) {
        prompt.push_str(&format!("- Timezone: {tz}\n"));
    }
    if let (Some(lat), Some(lon)) = (geo.latitude.as_deref(), geo.longitude.as_deref()) {
        prompt.push_str(&format!("- Coordinates: {lat}, {lon}\n"));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn includes_policy_and_time() {
        let prompt = build_system_prompt(&RequestGeo::default(), now());
        assert!(prompt.contains("Never output HTML"));
        assert!(prompt.contains("personal opinions"));
        assert!(prompt.contains("512 tokens"));
        assert!(prompt.contains("2026-05-01 12:30"));
        assert!(!prompt.contains("Approximate location"));
    }

    #[test]
    fn embeds_location_hints() {
        let geo = RequestGeo {
            city: Some("Lisbon".into()),
            country: Some("PT".into()),
            timezone: Some("Europe/Lisbon".into()),
            latitude: Some("38.72".into()),
            longitude: Some("-9.14".into()),
            ..Default::default()
        };
        let prompt = build_system_prompt(&geo, now());
        assert!(prompt.contains("Approximate location: Lisbon, PT"));
        assert!(prompt.contains("Timezone: Europe/Lisbon"));
        assert!(prompt.contains("Coordinates: 38.72, -9.14"));
    }
}
