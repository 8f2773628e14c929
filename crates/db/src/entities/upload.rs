//! Upload entity (a guest-submitted photo or video).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "upload")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub event_id: String,

    /// Signed media URL
    #[sea_orm(column_type = "Text")]
    pub url: String,

    /// Storage key of the media object
    pub storage_key: String,

    pub mime_type: String,

    #[sea_orm(nullable)]
    pub uploader_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub caption: Option<String>,

    #[sea_orm(nullable)]
    pub challenge_id: Option<String>,

    /// Visible on the live wall and in the public gallery
    #[sea_orm(default_value = false)]
    pub approved: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::event::Entity",
        from = "Column::EventId",
        to = "super::event::Column::Id"
    )]
    Event,

    #[sea_orm(
        belongs_to = "super::challenge::Entity",
        from = "Column::ChallengeId",
        to = "super::challenge::Column::Id",
        on_delete = "SetNull"
    )]
    Challenge,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl Related<super::challenge::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Challenge.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
