//! Rich presence payload.
//!
//! [`RichPresence`] is what callers fill in; [`RichPresence::to_activity`]
//! shapes it into the `activity` object of a `SET_ACTIVITY` command. Blank
//! strings and zero numbers are left out of the payload entirely.

use crate::config::PresenceConfig;
use serde::Serialize;
use std::str::FromStr;

/// Kind of activity shown, sent as its ordinal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ActivityType {
    #[default]
    Playing,
    Streaming,
    Listening,
    Watching,
    Custom,
    Competing,
}

impl ActivityType {
    pub fn ordinal(&self) -> u8 {
        match self {
            ActivityType::Playing => 0,
            ActivityType::Streaming => 1,
            ActivityType::Listening => 2,
            ActivityType::Watching => 3,
            ActivityType::Custom => 4,
            ActivityType::Competing => 5,
        }
    }
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "playing" => Ok(ActivityType::Playing),
            "streaming" => Ok(ActivityType::Streaming),
            "listening" => Ok(ActivityType::Listening),
            "watching" => Ok(ActivityType::Watching),
            "custom" => Ok(ActivityType::Custom),
            "competing" => Ok(ActivityType::Competing),
            other => Err(format!("unknown activity type: {}", other)),
        }
    }
}

/// Party visibility, sent as its ordinal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PartyPrivacy {
    #[default]
    Private,
    Public,
}

impl PartyPrivacy {
    pub fn ordinal(&self) -> u8 {
        match self {
            PartyPrivacy::Private => 0,
            PartyPrivacy::Public => 1,
        }
    }
}

/// A link button shown under the activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub url: String,
}

impl Button {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }

    /// Both label and url are set.
    pub fn is_valid(&self) -> bool {
        !self.label.is_empty() && !self.url.is_empty()
    }
}

/// Presence shown for the current user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RichPresence {
    pub state: Option<String>,
    pub details: Option<String>,
    /// Unix seconds; 0 leaves it out.
    pub start_timestamp: i64,
    pub end_timestamp: i64,

    pub large_image_key: Option<String>,
    pub large_image_text: Option<String>,
    pub small_image_key: Option<String>,
    pub small_image_text: Option<String>,

    pub party_id: Option<String>,
    pub party_size: u32,
    pub party_max: u32,
    pub party_privacy: PartyPrivacy,

    pub match_secret: Option<String>,
    pub join_secret: Option<String>,
    pub spectate_secret: Option<String>,

    pub instance: bool,
    pub activity_type: ActivityType,
    pub buttons: Vec<Button>,
}

impl RichPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_timestamps(mut self, start: i64, end: i64) -> Self {
        self.start_timestamp = start;
        self.end_timestamp = end;
        self
    }

    pub fn with_large_image(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.large_image_key = Some(key.into());
        self.large_image_text = Some(text.into());
        self
    }

    pub fn with_small_image(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.small_image_key = Some(key.into());
        self.small_image_text = Some(text.into());
        self
    }

    pub fn with_party(mut self, id: impl Into<String>, size: u32, max: u32) -> Self {
        self.party_id = Some(id.into());
        self.party_size = size;
        self.party_max = max;
        self
    }

    pub fn with_party_privacy(mut self, privacy: PartyPrivacy) -> Self {
        self.party_privacy = privacy;
        self
    }

    pub fn with_secrets(
        mut self,
        match_secret: Option<String>,
        join_secret: Option<String>,
        spectate_secret: Option<String>,
    ) -> Self {
        self.match_secret = match_secret;
        self.join_secret = join_secret;
        self.spectate_secret = spectate_secret;
        self
    }

    pub fn with_instance(mut self, instance: bool) -> Self {
        self.instance = instance;
        self
    }

    pub fn with_activity_type(mut self, activity_type: ActivityType) -> Self {
        self.activity_type = activity_type;
        self
    }

    pub fn with_button(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.add_button(label, url);
        self
    }

    /// Add a button. Returns false (and adds nothing) once two are present.
    pub fn add_button(&mut self, label: impl Into<String>, url: impl Into<String>) -> bool {
        if self.buttons.len() >= PresenceConfig::MAX_BUTTONS {
            return false;
        }
        self.buttons.push(Button::new(label, url));
        true
    }

    pub fn clear_buttons(&mut self) {
        self.buttons.clear();
    }

    /// The `activity` object for a `SET_ACTIVITY` command.
    pub fn to_activity(&self) -> serde_json::Value {
        let activity = ActivityPayload {
            state: non_blank(&self.state),
            details: non_blank(&self.details),
            timestamps: self.timestamps(),
            assets: self.assets(),
            party: self.party(),
            secrets: self.secrets(),
            buttons: self.button_payloads(),
            kind: self.activity_type.ordinal(),
            instance: self.instance,
        };

        serde_json::to_value(activity).unwrap_or(serde_json::Value::Null)
    }

    fn timestamps(&self) -> Option<Timestamps> {
        if self.start_timestamp == 0 && self.end_timestamp == 0 {
            return None;
        }

        Some(Timestamps {
            start: (self.start_timestamp != 0).then_some(self.start_timestamp),
            end: (self.end_timestamp != 0).then_some(self.end_timestamp),
        })
    }

    fn assets(&self) -> Option<Assets<'_>> {
        let assets = Assets {
            large_image: non_blank(&self.large_image_key),
            large_text: non_blank(&self.large_image_text),
            small_image: non_blank(&self.small_image_key),
            small_text: non_blank(&self.small_image_text),
        };

        let empty = assets.large_image.is_none()
            && assets.large_text.is_none()
            && assets.small_image.is_none()
            && assets.small_text.is_none();

        (!empty).then_some(assets)
    }

    fn party(&self) -> Option<Party<'_>> {
        let id = non_blank(&self.party_id);
        if id.is_none() && self.party_size == 0 && self.party_max == 0 {
            return None;
        }

        let size = (self.party_size != 0).then(|| {
            let mut size = vec![self.party_size];
            if self.party_max > 0 {
                size.push(self.party_max);
            }
            size
        });

        Some(Party {
            id,
            size,
            privacy: self.party_privacy.ordinal(),
        })
    }

    fn secrets(&self) -> Option<Secrets<'_>> {
        let secrets = Secrets {
            match_secret: non_blank(&self.match_secret),
            join: non_blank(&self.join_secret),
            spectate: non_blank(&self.spectate_secret),
        };

        let empty =
            secrets.match_secret.is_none() && secrets.join.is_none() && secrets.spectate.is_none();

        (!empty).then_some(secrets)
    }

    fn button_payloads(&self) -> Option<Vec<ButtonPayload<'_>>> {
        let buttons: Vec<ButtonPayload<'_>> = self
            .buttons
            .iter()
            .filter(|b| b.is_valid())
            .take(PresenceConfig::MAX_BUTTONS)
            .map(|b| ButtonPayload {
                label: b
                    .label
                    .chars()
                    .take(PresenceConfig::MAX_BUTTON_LABEL_CHARS)
                    .collect(),
                url: &b.url,
            })
            .collect();

        (!buttons.is_empty()).then_some(buttons)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

#[derive(Serialize)]
struct ActivityPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamps: Option<Timestamps>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assets: Option<Assets<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    party: Option<Party<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    secrets: Option<Secrets<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    buttons: Option<Vec<ButtonPayload<'a>>>,
    #[serde(rename = "type")]
    kind: u8,
    instance: bool,
}

#[derive(Serialize)]
struct Timestamps {
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<i64>,
}

#[derive(Serialize)]
struct Assets<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    large_image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    large_text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    small_image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    small_text: Option<&'a str>,
}

#[derive(Serialize)]
struct Party<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<Vec<u32>>,
    privacy: u8,
}

#[derive(Serialize)]
struct Secrets<'a> {
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    match_secret: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    join: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spectate: Option<&'a str>,
}

#[derive(Serialize)]
struct ButtonPayload<'a> {
    label: String,
    url: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_presence_only_carries_type_and_instance() {
        let activity = RichPresence::new().to_activity();
        assert_eq!(activity, json!({"type": 0, "instance": false}));
    }

    #[test]
    fn test_blank_strings_are_omitted() {
        let activity = RichPresence::new()
            .with_state("   ")
            .with_details("In a match")
            .to_activity();

        assert!(activity.get("state").is_none());
        assert_eq!(activity["details"], "In a match");
    }

    #[test]
    fn test_full_presence_shape() {
        let activity = RichPresence::new()
            .with_state("Solo")
            .with_timestamps(1_700_000_000, 0)
            .with_large_image("gear", "")
            .with_party("party-1", 2, 4)
            .with_party_privacy(PartyPrivacy::Public)
            .with_secrets(Some("m".into()), Some("j".into()), None)
            .with_activity_type(ActivityType::Watching)
            .with_instance(true)
            .to_activity();

        assert_eq!(
            activity,
            json!({
                "state": "Solo",
                "timestamps": {"start": 1_700_000_000i64},
                "assets": {"large_image": "gear"},
                "party": {"id": "party-1", "size": [2, 4], "privacy": 1},
                "secrets": {"match": "m", "join": "j"},
                "type": 3,
                "instance": true
            })
        );
    }

    #[test]
    fn test_party_size_without_max() {
        let activity = RichPresence::new().with_party("", 3, 0).to_activity();
        assert_eq!(activity["party"], json!({"size": [3], "privacy": 0}));
    }

    #[test]
    fn test_buttons_filtered_truncated_and_capped() {
        let mut presence = RichPresence::new();
        presence.buttons = vec![
            Button::new("", "https://example.com/missing-label"),
            Button::new("a".repeat(40), "https://example.com/one"),
            Button::new("No url", ""),
            Button::new("Two", "https://example.com/two"),
            Button::new("Three", "https://example.com/three"),
        ];

        let activity = presence.to_activity();
        let buttons = activity["buttons"].as_array().unwrap();

        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0]["label"].as_str().unwrap().chars().count(), 32);
        assert_eq!(buttons[1], json!({"label": "Two", "url": "https://example.com/two"}));
    }

    #[test]
    fn test_add_button_stops_at_two() {
        let mut presence = RichPresence::new();
        assert!(presence.add_button("One", "https://a"));
        assert!(presence.add_button("Two", "https://b"));
        assert!(!presence.add_button("Three", "https://c"));
        assert_eq!(presence.buttons.len(), 2);

        presence.clear_buttons();
        assert!(presence.buttons.is_empty());
    }

    #[test]
    fn test_activity_type_from_str() {
        assert_eq!("Watching".parse::<ActivityType>(), Ok(ActivityType::Watching));
        assert!("dancing".parse::<ActivityType>().is_err());
    }
}
