//! System setting repository — §3 SystemSetting, locked via `setting:<key>`.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use crate::entities::system_setting;
use crate::error::DbResult;

#[async_trait]
pub trait SettingRepository: Send + Sync {
    async fn get(&self, key: &str) -> DbResult<Option<serde_json::Value>>;
    async fn set(&self, key: &str, value: serde_json::Value) -> DbResult<()>;
}

pub struct SeaOrmSettingRepository {
    db: DatabaseConnection,
}

impl SeaOrmSettingRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SettingRepository for SeaOrmSettingRepository {
    async fn get(&self, key: &str) -> DbResult<Option<serde_json::Value>> {
        let row = system_setting::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?;
        Ok(row.map(|r| r.value))
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> DbResult<()> {
        let existing = system_setting::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?;
        let am = match existing {
            Some(row) => {
                let mut am: system_setting::ActiveModel = row.into();
                am.value = Set(value);
                am.updated_at = Set(Utc::now());
                am
            }
            None => system_setting::ActiveModel {
                key: Set(key.to_string()),
                value: Set(value),
                updated_at: Set(Utc::now()),
            },
        };
        am.save(&self.db).await?;
        Ok(())
    }
}
