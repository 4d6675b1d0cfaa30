//! Views of stored documents handed to the UI.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use lovefinder_shared::profile::{age_on, gender_of, GalleryImage, InfoItem, TextCard};
use lovefinder_shared::{ChatId, PrincipalId};
use lovefinder_store::Document;

/// Body of `users/{uid}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDocument {
    pub display_name: String,
    pub email: Option<String>,
    pub profile_image: Option<String>,
    /// `Some(false)` once eradication has started; missing means active.
    pub active: Option<bool>,
    /// ISO date, derived from the birthday section.
    pub birthdate: Option<NaiveDate>,
    pub birthday_section: Vec<InfoItem>,
    pub multiple_questions: Vec<TextCard>,
    pub main_info: Vec<TextCard>,
    pub images: Vec<GalleryImage>,
}

impl UserDocument {
    pub fn is_active(&self) -> bool {
        self.active != Some(false)
    }

    pub fn gender(&self) -> Option<String> {
        gender_of(&self.birthday_section)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: PrincipalId,
    #[serde(flatten)]
    pub user: UserDocument,
    pub age: Option<u32>,
    pub gender: Option<String>,
}

impl Profile {
    pub fn from_document(id: PrincipalId, user: UserDocument, today: NaiveDate) -> Self {
        let age = user.birthdate.map(|b| age_on(b, today));
        let gender = user.gender();
        Self {
            id,
            user,
            age,
            gender,
        }
    }
}

/// A principal shown in a discovery listing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: PrincipalId,
    pub display_name: String,
    pub profile_image: Option<String>,
    pub gender: Option<String>,
    /// The viewer has already liked this principal.
    pub liked: bool,
}

impl Candidate {
    pub fn new(id: PrincipalId, user: &UserDocument, liked: bool) -> Self {
        Self {
            id,
            display_name: user.display_name.clone(),
            profile_image: user.profile_image.clone(),
            gender: user.gender(),
            liked,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub partner: PrincipalId,
    pub chat_id: ChatId,
    pub display_name: String,
    pub profile_image: Option<String>,
    pub unread_messages: i64,
}

/// Which principals a candidate listing shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GenderFilter {
    #[default]
    All,
    /// Lower-cased gender as written in the birthday section.
    Only(String),
}

impl GenderFilter {
    /// `"all"` (or empty) means no filter.
    pub fn parse(value: &str) -> Self {
        let value = value.trim().to_lowercase();
        if value.is_empty() || value == "all" {
            GenderFilter::All
        } else {
            GenderFilter::Only(value)
        }
    }

    pub fn accepts(&self, gender: Option<&str>) -> bool {
        match self {
            GenderFilter::All => true,
            GenderFilter::Only(wanted) => gender == Some(wanted.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum MessagePayload {
    Text(String),
    Image(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender: PrincipalId,
    pub created_at: Option<DateTime<Utc>>,
    pub payload: MessagePayload,
    /// Principals who reacted to the message.
    pub likes: Vec<PrincipalId>,
}

impl ChatMessage {
    /// Decode a stored message; `None` for documents that are not valid
    /// messages.
    pub fn from_document(doc: &Document) -> Option<Self> {
        let sender = PrincipalId::parse(doc.get_str("senderId")?).ok()?;
        let payload = match (doc.get_str("text"), doc.get_str("imageUrl")) {
            (_, Some(url)) => MessagePayload::Image(url.to_string()),
            (Some(text), None) => MessagePayload::Text(text.to_string()),
            (None, None) => return None,
        };
        let likes = doc
            .get("likes")
            .and_then(|v| v.as_array())
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str())
                    .filter_map(|s| PrincipalId::parse(s).ok())
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            id: doc.id().to_string(),
            sender,
            created_at: doc.get_timestamp("createdAt"),
            payload,
            likes,
        })
    }
}

/// Badge counts for the navigation bar.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NavCounters {
    pub matches: usize,
    /// Likes received from principals the viewer has not skipped.
    pub likes: usize,
}
