use chrono::{DateTime, Utc};
use sea_orm::{
    DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    ActivityContext, ActivityEntry, ActivityKind, Destination, EngineError, Notification,
    ResultEngine, activity, group_members, groups, users,
};

use super::{Engine, with_tx};

impl Engine {
    /// Activity of a group, newest first.
    ///
    /// `limit` caps the number of returned entries.
    pub async fn activity(
        &self,
        group_id: &str,
        user_id: &str,
        limit: Option<u64>,
    ) -> ResultEngine<Vec<ActivityEntry>> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            self.require_member(&db_tx, group_id, user_id).await?;

            let mut query = activity::Entity::find()
                .filter(activity::Column::GroupId.eq(group_id.to_string()))
                .order_by_desc(activity::Column::Date)
                .order_by_desc(activity::Column::Id);
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            let rows = query.all(&db_tx).await?;
            rows.into_iter().map(ActivityEntry::try_from).collect()
        })
    }

    /// Append an entry inside the caller's transaction.
    ///
    /// Never fails the caller: unusable context or a store error are logged
    /// and yield `None`.
    pub(super) async fn record_activity(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        kind: ActivityKind,
        author_id: &str,
        ctx: &ActivityContext,
        date: DateTime<Utc>,
    ) -> Option<ActivityEntry> {
        match self
            .try_record_activity(db, group_id, kind, author_id, ctx, date)
            .await
        {
            Ok(Some(entry)) => Some(entry),
            Ok(None) => {
                warn!(group_id, kind = kind.as_str(), "activity skipped: missing context");
                None
            }
            Err(err) => {
                warn!(group_id, kind = kind.as_str(), "activity not recorded: {err}");
                None
            }
        }
    }

    async fn try_record_activity(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        kind: ActivityKind,
        author_id: &str,
        ctx: &ActivityContext,
        date: DateTime<Utc>,
    ) -> ResultEngine<Option<ActivityEntry>> {
        let Some(author) = users::Entity::find_by_id(author_id.to_string())
            .one(db)
            .await?
        else {
            return Ok(None);
        };
        let Some(content) = kind.render(&author.username, ctx) else {
            return Ok(None);
        };

        let entry = ActivityEntry {
            id: Uuid::now_v7(),
            group_id: group_id.to_string(),
            kind,
            author_id: author_id.to_string(),
            content,
            date,
        };
        activity::ActiveModel::from(&entry).insert(db).await?;
        Ok(Some(entry))
    }

    /// Tell the other members of the group about `entry`, after commit.
    pub(super) async fn broadcast(&self, entry: Option<ActivityEntry>) {
        let Some(entry) = entry else {
            return;
        };
        if let Err(err) = self.try_broadcast(&entry).await {
            warn!(
                group_id = %entry.group_id,
                kind = entry.kind.as_str(),
                "activity broadcast failed: {err}"
            );
        }
    }

    async fn try_broadcast(&self, entry: &ActivityEntry) -> ResultEngine<()> {
        let Some(group) = groups::Entity::find_by_id(entry.group_id.clone())
            .one(&self.database)
            .await?
        else {
            return Ok(());
        };
        let recipients = group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(entry.group_id.clone()))
            .filter(group_members::Column::UserId.ne(entry.author_id.clone()))
            .find_also_related(users::Entity)
            .all(&self.database)
            .await?;
        let author = users::Entity::find_by_id(entry.author_id.clone())
            .one(&self.database)
            .await?;

        let tokens: Vec<String> = recipients
            .iter()
            .filter_map(|(_, user)| user.as_ref()?.device().map(ToString::to_string))
            .collect();
        if tokens.is_empty() {
            return Ok(());
        }

        let body = match author {
            Some(author) => format!("{}: {}", author.username, entry.plain_content()),
            None => entry.plain_content(),
        };
        let notification = Notification {
            title: group.name,
            body,
            destination: Destination::Many(tokens),
        };
        self.notifier
            .send(&notification)
            .await
            .map_err(|err| EngineError::Notification(err.to_string()))
    }
}
