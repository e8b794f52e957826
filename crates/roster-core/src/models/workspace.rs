//! Workspace users and channels as delivered by the source of truth

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::record::DesiredRecord;
use super::value::{FieldMap, FieldValue};
use crate::util::normalize_text_option;

/// Channel field carrying member domain ids before link resolution.
pub const MEMBERS_ID_FIELD: &str = "Members Id";

/// A workspace member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceUser {
    pub id: String,
    pub display_name: String,
    pub real_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub updated: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Channels the user belongs to. Only counted; the link lives on Channels.
    #[serde(default)]
    pub channel_ids: Vec<String>,
}

impl WorkspaceUser {
    #[must_use]
    pub fn to_desired(&self) -> DesiredRecord {
        let mut fields = FieldMap::new();
        fields.insert("Display Name".into(), FieldValue::text(&self.display_name));
        fields.insert("Real Name".into(), FieldValue::text(&self.real_name));
        fields.insert(
            "Email".into(),
            FieldValue::optional_text(normalize_text_option(self.email.clone())),
        );
        fields.insert("Updated".into(), FieldValue::Text(iso_instant(self.updated)));
        fields.insert(
            "Num Channels".into(),
            FieldValue::count(self.channel_ids.len()),
        );
        fields.insert("Is Active".into(), FieldValue::Bool(self.is_active));
        fields.insert("Role".into(), FieldValue::list(self.roles.iter().cloned()));
        DesiredRecord::new(&self.id, fields)
    }
}

/// A public or private channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceChannel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_archived: bool,
    pub creator_id: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

impl WorkspaceChannel {
    /// Desired record whose `Members Id` still holds user domain ids.
    #[must_use]
    pub fn to_desired(&self) -> DesiredRecord {
        let mut fields = FieldMap::new();
        fields.insert("Name".into(), FieldValue::text(&self.name));
        fields.insert(
            "Topic".into(),
            FieldValue::optional_text(normalize_text_option(self.topic.clone())),
        );
        fields.insert(
            "Purpose".into(),
            FieldValue::optional_text(normalize_text_option(self.purpose.clone())),
        );
        fields.insert("Is Private".into(), FieldValue::Bool(self.is_private));
        fields.insert("Is Archived".into(), FieldValue::Bool(self.is_archived));
        fields.insert("Creator Id".into(), FieldValue::text(&self.creator_id));
        fields.insert("Created".into(), FieldValue::Text(iso_instant(self.created)));
        fields.insert(
            "Num Members".into(),
            FieldValue::count(self.member_ids.len()),
        );
        fields.insert(
            MEMBERS_ID_FIELD.into(),
            FieldValue::list(self.member_ids.iter().cloned()),
        );
        DesiredRecord::new(&self.id, fields)
    }
}

/// Everything one sync run pushes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceDump {
    #[serde(default)]
    pub users: Vec<WorkspaceUser>,
    #[serde(default)]
    pub channels: Vec<WorkspaceChannel>,
}

impl WorkspaceDump {
    #[must_use]
    pub fn desired_users(&self) -> Vec<DesiredRecord> {
        self.users.iter().map(WorkspaceUser::to_desired).collect()
    }

    #[must_use]
    pub fn desired_channels(&self) -> Vec<DesiredRecord> {
        self.channels
            .iter()
            .map(WorkspaceChannel::to_desired)
            .collect()
    }
}

/// Second-precision UTC timestamp with a `Z` suffix.
#[must_use]
pub fn iso_instant(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

const fn default_true() -> bool {
    true
}
