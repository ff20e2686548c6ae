use chrono::Utc;
use sea_orm::{ActiveValue, IntoActiveModel, QueryFilter, TransactionTrait, prelude::*};
use tracing::debug;
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, User, users,
    util::{normalize_optional_text, normalize_required_text},
};

use super::{Engine, with_tx};

impl Engine {
    /// Register a user. Usernames are unique.
    pub async fn create_user(&self, username: &str, device_token: Option<&str>) -> ResultEngine<User> {
        let username = normalize_required_text(username, "username")?;
        let device_token = normalize_optional_text(device_token);

        let user = with_tx!(self, |db_tx| {
            let taken = users::Entity::find()
                .filter(users::Column::Username.eq(username.clone()))
                .one(&db_tx)
                .await?
                .is_some();
            if taken {
                return Err(EngineError::Conflict(format!(
                    "username {username} is already taken"
                )));
            }
            let model = users::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4().to_string()),
                username: ActiveValue::Set(username.clone()),
                device_token: ActiveValue::Set(device_token),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;
            Ok(User::from(model))
        })?;

        debug!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub async fn user(&self, user_id: &str) -> ResultEngine<User> {
        with_tx!(self, |db_tx| {
            Ok(User::from(self.require_user(&db_tx, user_id).await?))
        })
    }

    /// Register or clear the device reminders are delivered to.
    pub async fn set_device_token(
        &self,
        user_id: &str,
        device_token: Option<&str>,
    ) -> ResultEngine<User> {
        let device_token = normalize_optional_text(device_token);
        with_tx!(self, |db_tx| {
            let mut active = self.require_user(&db_tx, user_id).await?.into_active_model();
            active.device_token = ActiveValue::Set(device_token);
            Ok(User::from(active.update(&db_tx).await?))
        })
    }
}
