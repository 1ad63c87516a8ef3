use std::fmt;
use std::str::FromStr;

use sqlx::FromRow;

use crate::db::models::Timestamp;
use crate::error::Error;

/// What is being muted: one table per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MuteKind {
    Keyword,
    Account,
}

impl MuteKind {
    pub const ALL: [MuteKind; 2] = [MuteKind::Keyword, MuteKind::Account];

    pub fn as_str(&self) -> &'static str {
        match self {
            MuteKind::Keyword => "keyword",
            MuteKind::Account => "account",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            MuteKind::Keyword => "mute_words",
            MuteKind::Account => "mute_users",
        }
    }
}

impl fmt::Display for MuteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MuteKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keyword" | "word" | "kw" => Ok(MuteKind::Keyword),
            "account" | "user" | "acct" => Ok(MuteKind::Account),
            other => Err(Error::invalid(format!(
                "unknown target kind '{}', expected keyword or account",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteStatus {
    Unmuted,
    Muted,
}

impl MuteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MuteStatus::Unmuted => "unmuted",
            MuteStatus::Muted => "muted",
        }
    }
}

impl FromStr for MuteStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unmuted" => Ok(MuteStatus::Unmuted),
            "muted" => Ok(MuteStatus::Muted),
            other => Err(Error::invalid(format!("unknown mute status '{}'", other))),
        }
    }
}

/// A keyword or account tracked by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuteTarget {
    pub kind: MuteKind,
    pub key: String,
    pub status: MuteStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Scheduled (not actual) time to unmute; `None` mutes indefinitely
    pub unmuted_at: Option<Timestamp>,
    /// Bumped by every write; timers compare it to detect re-mutes
    pub generation: i64,
}

impl MuteTarget {
    /// A fresh muted record, stamped `now` for both creation and update
    pub fn muted(kind: MuteKind, key: &str, unmuted_at: Option<Timestamp>) -> Self {
        let now = Timestamp::now();
        Self {
            kind,
            key: key.to_string(),
            status: MuteStatus::Muted,
            created_at: now,
            updated_at: now,
            unmuted_at,
            generation: 0,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.status == MuteStatus::Muted
    }

    /// Muted with a deadline, i.e. something a timer must eventually reverse
    pub fn pending_deadline(&self) -> Option<Timestamp> {
        if self.is_muted() {
            self.unmuted_at
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.key.trim().is_empty() {
            return Err(Error::invalid(format!("{} key must not be empty", self.kind)));
        }
        if self.status == MuteStatus::Unmuted && self.unmuted_at.is_some() {
            return Err(Error::invalid(format!(
                "unmuted {} '{}' cannot carry an unmute deadline",
                self.kind, self.key
            )));
        }
        if self.updated_at < self.created_at {
            return Err(Error::invalid(format!(
                "{} '{}' updated_at {} precedes created_at {}",
                self.kind, self.key, self.updated_at, self.created_at
            )));
        }
        Ok(())
    }
}

/// Raw persisted row; timestamps stay as text until validated
#[derive(Debug, Clone, FromRow)]
pub struct MuteTargetRow {
    pub key: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub unmuted_at: String,
    pub generation: i64,
}

impl MuteTargetRow {
    pub fn into_target(self, kind: MuteKind) -> Result<MuteTarget, Error> {
        Ok(MuteTarget {
            kind,
            status: self.status.parse()?,
            created_at: Timestamp::parse(&self.created_at)?,
            updated_at: Timestamp::parse(&self.updated_at)?,
            unmuted_at: Timestamp::parse_optional(&self.unmuted_at)?,
            generation: self.generation,
            key: self.key,
        })
    }
}
