//! Upstream record types and their redacted views.
//!
//! Each raw record converts into a view with every field the user's
//! capabilities forbid left empty. Media and recording URLs are never shown
//! directly; they become local paths carrying the sealed upstream URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewError};
use crate::token::{TokenCodec, TokenPurpose};
use crate::views::{Capabilities, Capability, Resource, ResourceKind, ViewRecord};

/// Local path prefix for proxied message media.
pub const MEDIA_PATH_PREFIX: &str = "/images/";

/// Local path prefix for proxied call recordings.
pub const RECORDING_PATH_PREFIX: &str = "/audio/";

/// Seals `url` behind the local path for `purpose`.
pub fn sealed_path(codec: &TokenCodec, purpose: TokenPurpose, url: &str) -> Result<String> {
    let prefix = match purpose {
        TokenPurpose::Media => MEDIA_PATH_PREFIX,
        TokenPurpose::Recording => RECORDING_PATH_PREFIX,
        TokenPurpose::Cursor => {
            return Err(ViewError::Internal(
                "cursors are not served as local paths".to_string(),
            ))
        }
    };
    Ok(format!("{}{}", prefix, codec.seal(purpose, url)?))
}

/// Splits a local path into the purpose its token was sealed for and the
/// token itself.
pub fn split_sealed_path(path: &str) -> Option<(TokenPurpose, &str)> {
    path.strip_prefix(MEDIA_PATH_PREFIX)
        .map(|token| (TokenPurpose::Media, token))
        .or_else(|| {
            path.strip_prefix(RECORDING_PATH_PREFIX)
                .map(|token| (TokenPurpose::Recording, token))
        })
}

fn allow<T>(caps: &Capabilities, capability: Capability, value: T) -> Option<T> {
    caps.allows(capability).then_some(value)
}

// == Message ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sid: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub body: String,
    pub status: String,
    pub direction: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub price_unit: Option<String>,
    #[serde(default)]
    pub num_media: u32,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageView {
    pub sid: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub body: Option<String>,
    pub status: String,
    pub direction: String,
    pub price: Option<String>,
    pub price_unit: Option<String>,
    pub num_media: Option<u32>,
    /// Whether the user may follow up with a media lookup
    pub can_view_media: bool,
    pub date_created: Option<DateTime<Utc>>,
}

impl Resource for Message {
    type View = MessageView;
    const KIND: ResourceKind = ResourceKind::Messages;

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.date_created
    }

    fn redact(self, caps: &Capabilities, _codec: &TokenCodec) -> Result<MessageView> {
        let can_view_price = caps.allows(Capability::ViewMessagePrice);
        Ok(MessageView {
            sid: self.sid,
            from: allow(caps, Capability::ViewMessageFrom, self.from),
            to: allow(caps, Capability::ViewMessageTo, self.to),
            body: allow(caps, Capability::ViewMessageBody, self.body),
            status: self.status,
            direction: self.direction,
            price: self.price.filter(|_| can_view_price),
            price_unit: self.price_unit.filter(|_| can_view_price),
            num_media: allow(caps, Capability::ViewNumMedia, self.num_media),
            can_view_media: caps.allows(Capability::ViewMedia) && self.num_media > 0,
            date_created: self.date_created,
        })
    }
}

impl ViewRecord for MessageView {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.date_created
    }
}

// == Call ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub sid: String,
    pub from: String,
    pub to: String,
    pub status: String,
    pub direction: String,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub price_unit: Option<String>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallView {
    pub sid: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub status: String,
    pub direction: String,
    pub duration: Option<u32>,
    pub price: Option<String>,
    pub price_unit: Option<String>,
    /// Whether the user may list this call's recordings
    pub can_view_recordings: bool,
    pub date_created: Option<DateTime<Utc>>,
}

impl Resource for Call {
    type View = CallView;
    const KIND: ResourceKind = ResourceKind::Calls;

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.date_created
    }

    fn redact(self, caps: &Capabilities, _codec: &TokenCodec) -> Result<CallView> {
        let can_view_price = caps.allows(Capability::ViewCallPrice);
        Ok(CallView {
            sid: self.sid,
            from: allow(caps, Capability::ViewCallFrom, self.from),
            to: allow(caps, Capability::ViewCallTo, self.to),
            status: self.status,
            direction: self.direction,
            duration: self.duration,
            price: self.price.filter(|_| can_view_price),
            price_unit: self.price_unit.filter(|_| can_view_price),
            can_view_recordings: caps.allows(Capability::ViewCallRecordings),
            date_created: self.date_created,
        })
    }
}

impl ViewRecord for CallView {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.date_created
    }
}

// == Alert ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub sid: String,
    pub error_code: String,
    pub log_level: String,
    #[serde(default)]
    pub alert_text: String,
    #[serde(default)]
    pub resource_sid: Option<String>,
    #[serde(default)]
    pub more_info: Option<String>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertView {
    pub sid: String,
    pub error_code: String,
    pub log_level: String,
    pub alert_text: String,
    pub resource_sid: Option<String>,
    pub more_info: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
}

impl Resource for Alert {
    type View = AlertView;
    const KIND: ResourceKind = ResourceKind::Alerts;

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.date_created
    }

    fn redact(self, _caps: &Capabilities, _codec: &TokenCodec) -> Result<AlertView> {
        Ok(AlertView {
            sid: self.sid,
            error_code: self.error_code,
            log_level: self.log_level,
            alert_text: self.alert_text,
            resource_sid: self.resource_sid,
            more_info: self.more_info,
            date_created: self.date_created,
        })
    }
}

impl ViewRecord for AlertView {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.date_created
    }
}

// == Recording ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub sid: String,
    pub call_sid: String,
    #[serde(default)]
    pub duration: Option<u32>,
    /// Upstream URL of the audio
    pub media_url: String,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingView {
    pub sid: String,
    pub call_sid: String,
    pub duration: Option<u32>,
    /// Local path to play the recording, when allowed
    pub media_path: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
}

impl Resource for Recording {
    type View = RecordingView;
    const KIND: ResourceKind = ResourceKind::Recordings;

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.date_created
    }

    fn redact(self, caps: &Capabilities, codec: &TokenCodec) -> Result<RecordingView> {
        let media_path = if caps.allows(Capability::PlayCallRecordings) {
            Some(sealed_path(codec, TokenPurpose::Recording, &self.media_url)?)
        } else {
            None
        };
        Ok(RecordingView {
            sid: self.sid,
            call_sid: self.call_sid,
            duration: self.duration,
            media_path,
            date_created: self.date_created,
        })
    }
}

impl ViewRecord for RecordingView {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.date_created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message {
            sid: "SM123".to_string(),
            from: "+14105551234".to_string(),
            to: "+14105556789".to_string(),
            body: "the gate code is 4321".to_string(),
            status: "delivered".to_string(),
            direction: "outbound-api".to_string(),
            price: Some("-0.00750".to_string()),
            price_unit: Some("USD".to_string()),
            num_media: 2,
            date_created: Some(Utc::now()),
        }
    }

    fn call() -> Call {
        Call {
            sid: "CA123".to_string(),
            from: "+14105551234".to_string(),
            to: "+14105556789".to_string(),
            status: "completed".to_string(),
            direction: "inbound".to_string(),
            duration: Some(42),
            price: Some("-0.01".to_string()),
            price_unit: Some("USD".to_string()),
            date_created: None,
        }
    }

    #[test]
    fn test_message_all_allowed() {
        let codec = TokenCodec::generate();
        let view = message().redact(&Capabilities::allow_all(), &codec).unwrap();

        assert_eq!(view.from.as_deref(), Some("+14105551234"));
        assert_eq!(view.to.as_deref(), Some("+14105556789"));
        assert_eq!(view.body.as_deref(), Some("the gate code is 4321"));
        assert_eq!(view.price.as_deref(), Some("-0.00750"));
        assert_eq!(view.num_media, Some(2));
        assert!(view.can_view_media);
    }

    #[test]
    fn test_message_fields_redacted() {
        let codec = TokenCodec::generate();
        let caps = Capabilities::default()
            .with(Capability::ViewMessageFrom, false)
            .with(Capability::ViewMessageTo, false)
            .with(Capability::ViewMessageBody, false)
            .with(Capability::ViewMessagePrice, false)
            .with(Capability::ViewNumMedia, false)
            .with(Capability::ViewMedia, false);
        let view = message().redact(&caps, &codec).unwrap();

        assert_eq!(view.sid, "SM123");
        assert_eq!(view.from, None);
        assert_eq!(view.to, None);
        assert_eq!(view.body, None);
        assert_eq!(view.price, None);
        assert_eq!(view.price_unit, None);
        assert_eq!(view.num_media, None);
        assert!(!view.can_view_media);

        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("gate code"));
        assert!(!json.contains("+1410555"));
    }

    #[test]
    fn test_call_fields_redacted() {
        let codec = TokenCodec::generate();
        let caps = Capabilities::default()
            .with(Capability::ViewCallFrom, false)
            .with(Capability::ViewCallPrice, false)
            .with(Capability::ViewCallRecordings, false);
        let view = call().redact(&caps, &codec).unwrap();

        assert_eq!(view.from, None);
        assert_eq!(view.to.as_deref(), Some("+14105556789"));
        assert_eq!(view.price, None);
        assert_eq!(view.duration, Some(42));
        assert!(!view.can_view_recordings);
    }

    #[test]
    fn test_recording_url_is_sealed() {
        let codec = TokenCodec::generate();
        let url = "https://media.example.com/Recordings/RE1.mp3";
        let recording = Recording {
            sid: "RE1".to_string(),
            call_sid: "CA123".to_string(),
            duration: Some(12),
            media_url: url.to_string(),
            date_created: None,
        };

        let view = recording
            .clone()
            .redact(&Capabilities::allow_all(), &codec)
            .unwrap();
        let path = view.media_path.unwrap();
        assert!(path.starts_with(RECORDING_PATH_PREFIX));
        assert!(!path.contains("media.example.com"));
        assert_eq!(
            codec
                .open(TokenPurpose::Recording, &path[RECORDING_PATH_PREFIX.len()..])
                .unwrap(),
            url
        );

        let caps = Capabilities::default().with(Capability::PlayCallRecordings, false);
        assert_eq!(recording.redact(&caps, &codec).unwrap().media_path, None);
    }

    #[test]
    fn test_split_sealed_path() {
        assert_eq!(
            split_sealed_path("/images/abc"),
            Some((TokenPurpose::Media, "abc"))
        );
        assert_eq!(
            split_sealed_path("/audio/abc"),
            Some((TokenPurpose::Recording, "abc"))
        );
        assert_eq!(split_sealed_path("/static/abc"), None);
    }

    #[test]
    fn test_cursors_are_not_sealed_as_paths() {
        let codec = TokenCodec::generate();
        assert!(matches!(
            sealed_path(&codec, TokenPurpose::Cursor, "https://api.example.com/v1/messages?Page=1"),
            Err(ViewError::Internal(_))
        ));
    }

    #[test]
    fn test_message_deserializes_with_defaults() {
        let json = r#"{
            "sid": "SM1", "from": "+1", "to": "+2", "status": "sent",
            "direction": "outbound-api", "date_created": "2026-10-01T12:00:00Z"
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();

        assert_eq!(message.num_media, 0);
        assert_eq!(message.body, "");
        assert!(message.created_at().is_some());
    }
}
