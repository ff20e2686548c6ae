//! Group activity log.
//!
//! An append-only, human readable record of what happened in a group. Entry
//! content is rendered from a fixed template per [`ActivityKind`]; values
//! interpolated into a template are wrapped in `{}` so clients can highlight
//! them.
//!
//! Rendering is best effort: when the context lacks a value a template
//! needs, no entry is produced.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::format_amount};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    CreateGroup,
    JoinGroup,
    LeaveGroup,
    TransferOwnership,
    ChangeGroupName,
    ChangeGroupDescription,
    ChangeGroupImage,
    AddExpense,
    EditExpense,
    DeleteExpense,
    Reminder,
}

/// Renders entry content from the author's username and the context.
type Template = fn(&str, &ActivityContext) -> Option<String>;

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateGroup => "createGroup",
            Self::JoinGroup => "joinGroup",
            Self::LeaveGroup => "leaveGroup",
            Self::TransferOwnership => "transferOwnership",
            Self::ChangeGroupName => "changeGroupName",
            Self::ChangeGroupDescription => "changeGroupDescription",
            Self::ChangeGroupImage => "changeGroupImage",
            Self::AddExpense => "addExpense",
            Self::EditExpense => "editExpense",
            Self::DeleteExpense => "deleteExpense",
            Self::Reminder => "reminder",
        }
    }

    fn template(self) -> Template {
        match self {
            Self::CreateGroup => |_, ctx| {
                Some(format!(
                    "I just created the group {{{}}}!",
                    present(&ctx.group_name)?
                ))
            },
            Self::JoinGroup => |_, _| Some("I just joined the group!".to_string()),
            Self::LeaveGroup => |author, _| Some(format!("{{{author}}} left the group.")),
            Self::TransferOwnership => |author, ctx| {
                Some(format!(
                    "{{{author}}} left the group. {{{}}} is now the owner.",
                    present(&ctx.new_owner)?
                ))
            },
            Self::ChangeGroupName => |_, ctx| {
                Some(format!(
                    "I just changed the group name to {{{}}}!",
                    present(&ctx.new_name)?
                ))
            },
            Self::ChangeGroupDescription => {
                |_, _| Some("I just changed the group description.".to_string())
            }
            Self::ChangeGroupImage => |_, _| Some("I just changed the group image.".to_string()),
            Self::AddExpense => |_, ctx| {
                Some(format!(
                    "I just added the expense {{{}}}.",
                    present(&ctx.expense_label)?
                ))
            },
            Self::EditExpense => |_, ctx| {
                Some(format!(
                    "I just edited the expense {{{}}}.",
                    present(&ctx.expense_label)?
                ))
            },
            Self::DeleteExpense => |_, ctx| {
                Some(format!(
                    "I just deleted the expense {{{}}}.",
                    present(&ctx.expense_label)?
                ))
            },
            Self::Reminder => |_, ctx| {
                let amount = ctx.amount.filter(|a| a.is_finite() && *a > 0.0)?;
                Some(format!(
                    "I just reminded {{{}}} of a total of {{{}}} owed.",
                    present(&ctx.debtor)?,
                    format_amount(amount)
                ))
            },
        }
    }

    /// Render content, `None` when the context is unusable.
    pub fn render(self, author: &str, ctx: &ActivityContext) -> Option<String> {
        if author.trim().is_empty() {
            return None;
        }
        (self.template())(author, ctx)
    }
}

impl TryFrom<&str> for ActivityKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "createGroup" => Ok(Self::CreateGroup),
            "joinGroup" => Ok(Self::JoinGroup),
            "leaveGroup" => Ok(Self::LeaveGroup),
            "transferOwnership" => Ok(Self::TransferOwnership),
            "changeGroupName" => Ok(Self::ChangeGroupName),
            "changeGroupDescription" => Ok(Self::ChangeGroupDescription),
            "changeGroupImage" => Ok(Self::ChangeGroupImage),
            "addExpense" => Ok(Self::AddExpense),
            "editExpense" => Ok(Self::EditExpense),
            "deleteExpense" => Ok(Self::DeleteExpense),
            "reminder" => Ok(Self::Reminder),
            other => Err(EngineError::Validation(format!(
                "invalid activity kind: {other}"
            ))),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Values a template may interpolate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivityContext {
    pub group_name: Option<String>,
    pub new_name: Option<String>,
    pub expense_label: Option<String>,
    pub new_owner: Option<String>,
    pub debtor: Option<String>,
    pub amount: Option<f64>,
}

impl ActivityContext {
    pub fn group_name(name: impl Into<String>) -> Self {
        Self {
            group_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn new_name(name: impl Into<String>) -> Self {
        Self {
            new_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn expense(label: impl Into<String>) -> Self {
        Self {
            expense_label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn new_owner(username: impl Into<String>) -> Self {
        Self {
            new_owner: Some(username.into()),
            ..Default::default()
        }
    }

    pub fn reminder(debtor: impl Into<String>, amount: f64) -> Self {
        Self {
            debtor: Some(debtor.into()),
            amount: Some(amount),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub group_id: String,
    pub kind: ActivityKind,
    pub author_id: String,
    pub content: String,
    pub date: DateTime<Utc>,
}

impl ActivityEntry {
    /// Content without the highlight braces, for plain-text channels.
    pub fn plain_content(&self) -> String {
        self.content.replace(['{', '}'], "")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "activity_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub kind: String,
    pub author_id: String,
    pub content: String,
    pub date: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Groups,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ActivityEntry> for ActiveModel {
    fn from(entry: &ActivityEntry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id.to_string()),
            group_id: ActiveValue::Set(entry.group_id.clone()),
            kind: ActiveValue::Set(entry.kind.as_str().to_string()),
            author_id: ActiveValue::Set(entry.author_id.clone()),
            content: ActiveValue::Set(entry.content.clone()),
            date: ActiveValue::Set(entry.date),
        }
    }
}

impl TryFrom<Model> for ActivityEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("activity entry not exists".to_string()))?,
            group_id: model.group_id,
            kind: ActivityKind::try_from(model.kind.as_str())?,
            author_id: model.author_id,
            content: model.content,
            date: model.date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_expense_templates() {
        let ctx = ActivityContext::expense("Dinner");
        assert_eq!(
            ActivityKind::AddExpense.render("alice", &ctx).as_deref(),
            Some("I just added the expense {Dinner}.")
        );
        assert_eq!(
            ActivityKind::DeleteExpense.render("alice", &ctx).as_deref(),
            Some("I just deleted the expense {Dinner}.")
        );
    }

    #[test]
    fn leave_mentions_the_author() {
        assert_eq!(
            ActivityKind::LeaveGroup
                .render("bob", &ActivityContext::default())
                .as_deref(),
            Some("{bob} left the group.")
        );
    }

    #[test]
    fn missing_context_yields_no_content() {
        let empty = ActivityContext::default();
        assert_eq!(ActivityKind::AddExpense.render("alice", &empty), None);
        assert_eq!(ActivityKind::ChangeGroupName.render("alice", &empty), None);
        assert_eq!(ActivityKind::TransferOwnership.render("alice", &empty), None);
        assert_eq!(
            ActivityKind::AddExpense.render("alice", &ActivityContext::expense("   ")),
            None
        );
        assert_eq!(
            ActivityKind::Reminder.render("alice", &ActivityContext::reminder("bob", -3.0)),
            None
        );
    }

    #[test]
    fn blank_author_yields_no_content() {
        assert_eq!(
            ActivityKind::JoinGroup.render(" ", &ActivityContext::default()),
            None
        );
    }

    #[test]
    fn kinds_round_trip_through_str() {
        for kind in [
            ActivityKind::CreateGroup,
            ActivityKind::JoinGroup,
            ActivityKind::LeaveGroup,
            ActivityKind::TransferOwnership,
            ActivityKind::ChangeGroupName,
            ActivityKind::ChangeGroupDescription,
            ActivityKind::ChangeGroupImage,
            ActivityKind::AddExpense,
            ActivityKind::EditExpense,
            ActivityKind::DeleteExpense,
            ActivityKind::Reminder,
        ] {
            assert_eq!(ActivityKind::try_from(kind.as_str()).unwrap(), kind);
        }
        assert!(ActivityKind::try_from("reimbursement").is_err());
    }

    #[test]
    fn plain_content_drops_braces() {
        let entry = ActivityEntry {
            id: Uuid::now_v7(),
            group_id: "g".to_string(),
            kind: ActivityKind::AddExpense,
            author_id: "a".to_string(),
            content: "I just added the expense {Dinner}.".to_string(),
            date: Utc::now(),
        };
        assert_eq!(entry.plain_content(), "I just added the expense Dinner.");
    }
}
