use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

use crate::model::ids::UserId;
use crate::scoring;

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("user id cannot be empty")]
    EmptyId,

    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),

    #[error("invalid photo url: {0:?}")]
    InvalidPhotoUrl(String),

    #[error("user level must be at least 1")]
    InvalidLevel,
}

//
// ─── RANK ──────────────────────────────────────────────────────────────────────
//

/// Seven ordered tiers derived from cumulative XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    CyberNewbie,
    CodeRunner,
    CyberJunior,
    DigitalSamurai,
    Netrunner,
    CyberPsycho,
    DigitalGod,
}

impl Rank {
    /// Exclusive upper XP bound per tier, in ascending order. `DigitalGod` is open-ended.
    pub const THRESHOLDS: [(Rank, u64); 6] = [
        (Rank::CyberNewbie, 1_000),
        (Rank::CodeRunner, 2_500),
        (Rank::CyberJunior, 5_000),
        (Rank::DigitalSamurai, 10_000),
        (Rank::Netrunner, 20_000),
        (Rank::CyberPsycho, 50_000),
    ];

    #[must_use]
    pub fn for_xp(xp: u64) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(_, below)| xp < *below)
            .map_or(Rank::DigitalGod, |(rank, _)| *rank)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Rank::CyberNewbie => "Cyber-Newbie",
            Rank::CodeRunner => "Code-Runner",
            Rank::CyberJunior => "Cyber-Junior",
            Rank::DigitalSamurai => "Digital-Samurai",
            Rank::Netrunner => "Netrunner",
            Rank::CyberPsycho => "Cyber-Psycho",
            Rank::DigitalGod => "Digital-God",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

/// Serialized form of a `User`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProps {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub level: u32,
    pub xp: u64,
}

/// Authenticated user with progress tracking. Rank is derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    email: String,
    display_name: String,
    photo_url: Option<String>,
    created_at: DateTime<Utc>,
    level: u32,
    xp: u64,
}

impl User {
    /// # Errors
    ///
    /// Returns `UserError` for a blank id, a malformed email or photo URL, or level 0.
    pub fn create(props: UserProps) -> Result<Self, UserError> {
        let id = UserId::new(props.id).map_err(|_| UserError::EmptyId)?;
        if !EMAIL_SHAPE.is_match(&props.email) {
            return Err(UserError::InvalidEmail(props.email));
        }
        if let Some(photo) = props.photo_url.as_deref() {
            Url::parse(photo).map_err(|_| UserError::InvalidPhotoUrl(photo.to_owned()))?;
        }
        if props.level < 1 {
            return Err(UserError::InvalidLevel);
        }

        Ok(Self {
            id,
            email: props.email,
            display_name: props.display_name,
            photo_url: props.photo_url,
            created_at: props.created_at,
            level: props.level,
            xp: props.xp,
        })
    }

    #[must_use]
    pub fn to_props(&self) -> UserProps {
        UserProps {
            id: self.id.to_string(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            created_at: self.created_at,
            level: self.level,
            xp: self.xp,
        }
    }

    /// New user with the given progress values.
    ///
    /// # Errors
    ///
    /// Returns `UserError::InvalidLevel` if `level` is 0.
    pub fn with_progress(&self, xp: u64, level: u32) -> Result<Self, UserError> {
        Self::create(UserProps {
            xp,
            level,
            ..self.to_props()
        })
    }

    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn photo_url(&self) -> Option<&str> {
        self.photo_url.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub fn xp(&self) -> u64 {
        self.xp
    }

    #[must_use]
    pub fn rank(&self) -> Rank {
        Rank::for_xp(self.xp)
    }

    #[must_use]
    pub fn xp_for_next_level(&self) -> u64 {
        u64::from(self.level) * scoring::XP_PER_LEVEL
    }

    /// Progress toward the next level, clamped to 0..=100.
    #[must_use]
    pub fn progress_percentage(&self) -> u32 {
        scoring::progress_toward_next_level(self.xp, self.level)
    }
}
