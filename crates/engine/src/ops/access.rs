use std::collections::HashSet;

use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, Statement, prelude::*};

use crate::{EngineError, Group, Member, ResultEngine, group_members, groups, users};

use super::Engine;

impl Engine {
    pub(super) async fn require_group(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
    ) -> ResultEngine<groups::Model> {
        groups::Entity::find_by_id(group_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("group not exists".to_string()))
    }

    pub(super) async fn find_membership(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<Option<group_members::Model>> {
        group_members::Entity::find_by_id((group_id.to_string(), user_id.to_string()))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn require_member(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<group_members::Model> {
        self.find_membership(db, group_id, user_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotMember(format!("user {user_id} is not a member of the group"))
            })
    }

    pub(super) async fn require_user(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<users::Model> {
        users::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("user not exists".to_string()))
    }

    /// Every id must be a current member, unless it is listed in `known`.
    pub(super) async fn require_participants<'a, I>(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        participants: I,
        known: &HashSet<String>,
    ) -> ResultEngine<()>
    where
        I: IntoIterator<Item = &'a String>,
    {
        for user_id in participants {
            if known.contains(user_id) {
                continue;
            }
            if self.find_membership(db, group_id, user_id).await?.is_none() {
                return Err(EngineError::InvalidSplit(format!(
                    "participant {user_id} is not a member of the group"
                )));
            }
        }
        Ok(())
    }

    /// Members ordered by join time, ties by user id.
    pub(super) async fn members_of(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
    ) -> ResultEngine<Vec<Member>> {
        let rows = group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(group_id.to_string()))
            .order_by_asc(group_members::Column::JoinedAt)
            .order_by_asc(group_members::Column::UserId)
            .find_also_related(users::Entity)
            .all(db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(membership, user)| Member {
                username: user.map(|u| u.username).unwrap_or_default(),
                user_id: membership.user_id,
                joined_at: membership.joined_at,
                last_notification_date: membership.last_notification_date,
            })
            .collect())
    }

    pub(super) async fn group_view(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
    ) -> ResultEngine<Group> {
        let model = self.require_group(db, group_id).await?;
        let members = self.members_of(db, group_id).await?;
        Ok(model.into_group(members))
    }

    /// Remove a group and everything it owns.
    pub(super) async fn purge_group(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
    ) -> ResultEngine<()> {
        // Children first; SQLite only honours ON DELETE CASCADE with foreign
        // keys enabled on the connection.
        let backend = db.get_database_backend();
        let statements = [
            "DELETE FROM expense_splits WHERE expense_id IN (SELECT id FROM expenses WHERE group_id = ?);",
            "DELETE FROM expenses WHERE group_id = ?;",
            "DELETE FROM activity_entries WHERE group_id = ?;",
            "DELETE FROM group_members WHERE group_id = ?;",
            "DELETE FROM groups WHERE id = ?;",
        ];
        for sql in statements {
            db.execute(Statement::from_sql_and_values(
                backend,
                sql,
                vec![group_id.to_string().into()],
            ))
            .await?;
        }
        Ok(())
    }
}
