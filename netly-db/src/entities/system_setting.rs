//! `system_settings` table — key/value settings store, e.g. the Cloudflare
//! quick-tunnel token the (out-of-scope) control-plane-exposure bootstrap
//! reads. The control plane only persists and locks these by key; the
//! settings editor itself is out of scope (§1).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "system_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub key: String,
    #[sea_orm(column_type = "Json")]
    pub value: serde_json::Value,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
