use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use tracing::{debug, info};

use crate::{
    ActivityContext, ActivityKind, EngineError, Group, LeaveOutcome, Member, ResultEngine,
    group_members, groups,
    groups::{generate_join_code, normalize_join_code},
    util::{normalize_optional_text, normalize_required_text, normalize_text},
};

use super::{Engine, with_tx};

/// Random codes tried before giving up on a unique one.
const JOIN_CODE_ATTEMPTS: usize = 16;

impl Engine {
    /// Create a group owned by `creator_id`, who becomes its first member.
    pub async fn create_group(
        &self,
        creator_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> ResultEngine<Group> {
        let name = normalize_required_text(name, "group name")?;
        let description = description.map(normalize_text).unwrap_or_default();

        let (group, entry) = with_tx!(self, |db_tx| {
            self.require_user(&db_tx, creator_id).await?;
            let join_code = self.unique_join_code(&db_tx).await?;
            let group = Group::new(name, description, creator_id, join_code);
            groups::ActiveModel::from(&group).insert(&db_tx).await?;
            self.insert_member(&db_tx, &group.id, creator_id, group.created_at)
                .await?;

            let entry = self
                .record_activity(
                    &db_tx,
                    &group.id,
                    ActivityKind::CreateGroup,
                    creator_id,
                    &ActivityContext::group_name(group.name.clone()),
                    group.created_at,
                )
                .await;
            let group = self.group_view(&db_tx, &group.id).await?;
            Ok((group, entry))
        })?;

        debug!(group_id = %group.id, owner_id = %group.owner_id, "group created");
        self.broadcast(entry).await;
        Ok(group)
    }

    /// Join the group identified by `join_code` (case-insensitive).
    pub async fn join_group(&self, join_code: &str, user_id: &str) -> ResultEngine<Group> {
        let join_code = normalize_join_code(join_code);

        let (group, entry) = with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;
            let model = groups::Entity::find()
                .filter(groups::Column::JoinCode.eq(join_code.clone()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("group not exists".to_string()))?;
            if self.find_membership(&db_tx, &model.id, user_id).await?.is_some() {
                return Err(EngineError::AlreadyMember(format!(
                    "user {user_id} already belongs to the group"
                )));
            }

            let now = Utc::now();
            self.insert_member(&db_tx, &model.id, user_id, now).await?;
            let entry = self
                .record_activity(
                    &db_tx,
                    &model.id,
                    ActivityKind::JoinGroup,
                    user_id,
                    &ActivityContext::default(),
                    now,
                )
                .await;
            let group = self.group_view(&db_tx, &model.id).await?;
            Ok((group, entry))
        })?;

        debug!(group_id = %group.id, user_id, "member joined");
        self.broadcast(entry).await;
        Ok(group)
    }

    /// Leave a group.
    ///
    /// When the owner leaves, ownership passes to the remaining member who
    /// joined first. When the last member leaves, the group and everything it
    /// owns is deleted.
    pub async fn leave_group(&self, group_id: &str, user_id: &str) -> ResultEngine<LeaveOutcome> {
        let (outcome, entry) = with_tx!(self, |db_tx| {
            let group = self.require_group(&db_tx, group_id).await?;
            self.require_member(&db_tx, group_id, user_id).await?;

            group_members::Entity::delete_by_id((group_id.to_string(), user_id.to_string()))
                .exec(&db_tx)
                .await?;

            let next = group_members::Entity::find()
                .filter(group_members::Column::GroupId.eq(group_id.to_string()))
                .order_by_asc(group_members::Column::JoinedAt)
                .order_by_asc(group_members::Column::UserId)
                .one(&db_tx)
                .await?;

            let now = Utc::now();
            match next {
                None => {
                    self.purge_group(&db_tx, group_id).await?;
                    Ok((LeaveOutcome::GroupDeleted, None))
                }
                Some(next) if group.owner_id == user_id => {
                    groups::ActiveModel {
                        id: ActiveValue::Set(group.id.clone()),
                        owner_id: ActiveValue::Set(next.user_id.clone()),
                        ..Default::default()
                    }
                    .update(&db_tx)
                    .await?;
                    let new_owner = self.require_user(&db_tx, &next.user_id).await?;
                    let entry = self
                        .record_activity(
                            &db_tx,
                            group_id,
                            ActivityKind::TransferOwnership,
                            user_id,
                            &ActivityContext::new_owner(new_owner.username),
                            now,
                        )
                        .await;
                    let outcome = LeaveOutcome::OwnershipTransferred {
                        new_owner_id: next.user_id,
                    };
                    Ok((outcome, entry))
                }
                Some(_) => {
                    let entry = self
                        .record_activity(
                            &db_tx,
                            group_id,
                            ActivityKind::LeaveGroup,
                            user_id,
                            &ActivityContext::default(),
                            now,
                        )
                        .await;
                    Ok((LeaveOutcome::Left, entry))
                }
            }
        })?;

        match &outcome {
            LeaveOutcome::GroupDeleted => info!(group_id, "last member left, group deleted"),
            LeaveOutcome::OwnershipTransferred { new_owner_id } => {
                info!(group_id, new_owner_id = %new_owner_id, "group ownership transferred");
            }
            LeaveOutcome::Left => debug!(group_id, user_id, "member left"),
        }
        self.broadcast(entry).await;
        Ok(outcome)
    }

    /// Change the name and/or description of a group.
    ///
    /// Only fields that actually change produce an activity entry.
    pub async fn rename_group(
        &self,
        group_id: &str,
        user_id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> ResultEngine<Group> {
        let (group, entries) = with_tx!(self, |db_tx| {
            let model = self.require_group(&db_tx, group_id).await?;
            self.require_member(&db_tx, group_id, user_id).await?;

            if name.is_none() && description.is_none() {
                return Err(EngineError::Validation("no fields to update".to_string()));
            }
            let name = name
                .map(|n| normalize_required_text(n, "group name"))
                .transpose()?
                .filter(|n| *n != model.name);
            let description = description
                .map(normalize_text)
                .filter(|d| *d != model.description);
            let mut entries = Vec::new();

            if name.is_some() || description.is_some() {
                let mut active = groups::ActiveModel {
                    id: ActiveValue::Set(model.id.clone()),
                    ..Default::default()
                };
                if let Some(name) = &name {
                    active.name = ActiveValue::Set(name.clone());
                }
                if let Some(description) = &description {
                    active.description = ActiveValue::Set(description.clone());
                }
                active.update(&db_tx).await?;
            }

            let now = Utc::now();
            if let Some(name) = name {
                entries.push(
                    self.record_activity(
                        &db_tx,
                        group_id,
                        ActivityKind::ChangeGroupName,
                        user_id,
                        &ActivityContext::new_name(name),
                        now,
                    )
                    .await,
                );
            }
            if description.is_some() {
                entries.push(
                    self.record_activity(
                        &db_tx,
                        group_id,
                        ActivityKind::ChangeGroupDescription,
                        user_id,
                        &ActivityContext::default(),
                        now,
                    )
                    .await,
                );
            }
            Ok((self.group_view(&db_tx, group_id).await?, entries))
        })?;

        for entry in entries {
            self.broadcast(entry).await;
        }
        Ok(group)
    }

    /// Replace the group image reference; `None` clears it.
    ///
    /// Returns the previous reference so the caller can release the blob.
    pub async fn set_group_image(
        &self,
        group_id: &str,
        user_id: &str,
        image: Option<&str>,
    ) -> ResultEngine<Option<String>> {
        let image = normalize_optional_text(image);

        let (previous, entry) = with_tx!(self, |db_tx| {
            let model = self.require_group(&db_tx, group_id).await?;
            self.require_member(&db_tx, group_id, user_id).await?;
            let mut entry = None;
            if model.image != image {
                groups::ActiveModel {
                    id: ActiveValue::Set(model.id.clone()),
                    image: ActiveValue::Set(image.clone()),
                    ..Default::default()
                }
                .update(&db_tx)
                .await?;
                entry = self
                    .record_activity(
                        &db_tx,
                        group_id,
                        ActivityKind::ChangeGroupImage,
                        user_id,
                        &ActivityContext::default(),
                        Utc::now(),
                    )
                    .await;
            }
            Ok((model.image, entry))
        })?;

        self.broadcast(entry).await;
        Ok(previous)
    }

    /// Delete a group with all its expenses and activity. Owner only.
    pub async fn delete_group(&self, group_id: &str, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_group(&db_tx, group_id).await?;
            self.require_member(&db_tx, group_id, user_id).await?;
            if model.owner_id != user_id {
                return Err(EngineError::Forbidden(
                    "only the owner can delete the group".to_string(),
                ));
            }
            self.purge_group(&db_tx, group_id).await
        })?;
        info!(group_id, user_id, "group deleted");
        Ok(())
    }

    /// Return a group with its members. The caller must be a member.
    pub async fn group(&self, group_id: &str, user_id: &str) -> ResultEngine<Group> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            self.require_member(&db_tx, group_id, user_id).await?;
            self.group_view(&db_tx, group_id).await
        })
    }

    /// Groups `user_id` belongs to, in the order they were joined.
    pub async fn groups(&self, user_id: &str) -> ResultEngine<Vec<Group>> {
        with_tx!(self, |db_tx| {
            let memberships = group_members::Entity::find()
                .filter(group_members::Column::UserId.eq(user_id.to_string()))
                .order_by_asc(group_members::Column::JoinedAt)
                .order_by_asc(group_members::Column::GroupId)
                .all(&db_tx)
                .await?;
            let mut out = Vec::with_capacity(memberships.len());
            for membership in memberships {
                out.push(self.group_view(&db_tx, &membership.group_id).await?);
            }
            Ok(out)
        })
    }

    /// Members of a group ordered by join time. The caller must be a member.
    pub async fn members(&self, group_id: &str, user_id: &str) -> ResultEngine<Vec<Member>> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            self.require_member(&db_tx, group_id, user_id).await?;
            self.members_of(&db_tx, group_id).await
        })
    }

    /// Whether `user_id` currently belongs to the group. A missing group has
    /// no members.
    pub async fn is_member(&self, group_id: &str, user_id: &str) -> ResultEngine<bool> {
        with_tx!(self, |db_tx| {
            Ok(self
                .find_membership(&db_tx, group_id, user_id)
                .await?
                .is_some())
        })
    }

    async fn unique_join_code(&self, db: &DatabaseTransaction) -> ResultEngine<String> {
        for _ in 0..JOIN_CODE_ATTEMPTS {
            let code = generate_join_code();
            let taken = groups::Entity::find()
                .filter(groups::Column::JoinCode.eq(code.clone()))
                .one(db)
                .await?
                .is_some();
            if !taken {
                return Ok(code);
            }
        }
        Err(EngineError::Conflict(
            "could not allocate a unique join code".to_string(),
        ))
    }

    async fn insert_member(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        user_id: &str,
        joined_at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        group_members::ActiveModel {
            group_id: ActiveValue::Set(group_id.to_string()),
            user_id: ActiveValue::Set(user_id.to_string()),
            joined_at: ActiveValue::Set(joined_at),
            last_notification_date: ActiveValue::Set(None),
        }
        .insert(db)
        .await?;
        Ok(())
    }
}
