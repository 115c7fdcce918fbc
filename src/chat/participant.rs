use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};

pub type ParticipantId = Uuid;
pub type ConnId = Uuid;

const MAX_NAME_CHARS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        use Gender::*;
        match self {
            Male => "male",
            Female => "female",
            Other => "other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a participant is willing to be paired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderFilter {
    Male,
    Female,
    Other,
    #[default]
    Any,
}

impl GenderFilter {
    pub fn accepts(&self, gender: Gender) -> bool {
        match self {
            GenderFilter::Any => true,
            GenderFilter::Male => gender == Gender::Male,
            GenderFilter::Female => gender == Gender::Female,
            GenderFilter::Other => gender == Gender::Other,
        }
    }
}

/// Profile fields as they arrive with a `join` event, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub display_name: Option<String>,
    pub gender: Option<String>,
    pub is_guest: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub gender: Gender,
    pub is_guest: bool,
}

impl JoinRequest {
    /// Checks the request and fills in a guest name when none was given.
    pub fn validate(self) -> ChatResult<Profile> {
        let gender = match self.gender.as_deref().map(str::trim) {
            Some("male") => Gender::Male,
            Some("female") => Gender::Female,
            Some("other") => Gender::Other,
            Some(other) => return Err(ChatError::Validation(format!("unknown gender {other:?}"))),
            None => return Err(ChatError::Validation("gender is required".to_owned())),
        };

        let name = match self.display_name.as_deref().map(str::trim) {
            None | Some("") => guest_name(),
            Some(name) => sanitize_name(name)?,
        };

        Ok(Profile {
            name,
            gender,
            is_guest: self.is_guest.unwrap_or(true),
        })
    }
}

fn guest_name() -> String {
    format!("Guest{}", rand::rng().random_range(0..10_000))
}

fn sanitize_name(name: &str) -> ChatResult<String> {
    let chars = name.chars().count();
    if chars > MAX_NAME_CHARS {
        return Err(ChatError::Validation(format!(
            "display name is {chars} characters, limit is {MAX_NAME_CHARS}"
        )));
    }

    let allowed = |c: char| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.');
    if !name.chars().all(allowed) {
        return Err(ChatError::Validation(
            "display name may only contain letters, digits, spaces, '_', '-' and '.'".to_owned(),
        ));
    }

    // collapse runs of inner whitespace
    Ok(name.split_whitespace().collect::<Vec<_>>().join(" "))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub gender: Gender,
    pub is_guest: bool,
    pub online: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    /// Only set while the participant sits in the matchmaking queue.
    #[serde(skip)]
    pub filter: Option<GenderFilter>,
}

impl Participant {
    pub fn new(profile: Profile) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::now_v7(),
            name: profile.name,
            gender: profile.gender,
            is_guest: profile.is_guest,
            online: true,
            created_at: now,
            last_seen: now,
            filter: None,
        }
    }
}

/// Public view of a participant, as shown in the online users list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: ParticipantId,
    pub name: String,
    pub gender: Gender,
    pub is_guest: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

impl From<&Participant> for UserSummary {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            gender: p.gender,
            is_guest: p.is_guest,
            joined_at: p.created_at,
        }
    }
}
