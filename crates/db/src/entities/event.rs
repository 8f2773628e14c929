//! Event entity (one photo wall session).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How the live wall orders approved uploads.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "kebab-case")]
pub enum OrderingMode {
    /// New uploads are played right after the current one.
    #[sea_orm(string_value = "insertion")]
    #[default]
    Insertion,
    /// Every completed round resets to newest first.
    #[sea_orm(string_value = "newest-first")]
    NewestFirst,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning organizer
    pub owner_id: String,

    pub name: String,

    /// Join code guests type or scan, upper case
    #[sea_orm(unique)]
    pub code: String,

    /// Storage key of the cover image
    #[sea_orm(nullable)]
    pub cover_image_key: Option<String>,

    /// Signed URL of the cover image
    #[sea_orm(column_type = "Text", nullable)]
    pub cover_image_url: Option<String>,

    /// New uploads are approved on insert
    #[sea_orm(default_value = true)]
    pub auto_approval: bool,

    /// Obfuscated event password, see `photowall_common::crypto`
    #[sea_orm(nullable)]
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// Seconds each item stays on the live wall
    pub image_display_duration: i32,

    pub background_theme: String,

    pub header_theme: String,

    pub ordering_mode: OrderingMode,

    /// Maximum number of uploads
    pub upload_limit: i32,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organizer::Entity",
        from = "Column::OwnerId",
        to = "super::organizer::Column::Id",
        on_delete = "Cascade"
    )]
    Owner,

    #[sea_orm(has_many = "super::upload::Entity")]
    Upload,

    #[sea_orm(has_many = "super::challenge::Entity")]
    Challenge,
}

impl Related<super::organizer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::upload::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Upload.def()
    }
}

impl Related<super::challenge::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Challenge.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
