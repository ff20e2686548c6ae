use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{
    AddExpenseCmd, AmountOwed, Currency, Engine, EngineError, ExpenseOrder, ReminderCmd,
    SplitSpec, SplitType, UpdateExpenseCmd,
};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "spleet")]
#[command(about = "Shared-expense ledger: groups, expense splits and debt reminders")]
pub struct Cli {
    /// Settings file (TOML, extension optional).
    #[arg(long)]
    pub config: Option<String>,

    /// Database connection string, overrides the configured database.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    User(UserArgs),
    Group(GroupArgs),
    Expense(ExpenseArgs),
    /// Latest activity of a group, newest first.
    Activity(ActivityArgs),
    /// Remind a member of what they owe.
    Remind(RemindArgs),
}

// ─── users ──────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        device_token: Option<String>,
    },
    Show {
        #[arg(long)]
        user: String,
    },
    /// Register the device reminders go to. Omit `--token` to clear it.
    Device {
        #[arg(long)]
        user: String,
        #[arg(long)]
        token: Option<String>,
    },
}

// ─── groups ─────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct GroupArgs {
    #[command(subcommand)]
    command: GroupCommand,
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    Create {
        #[arg(long)]
        user: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Join {
        #[arg(long)]
        user: String,
        #[arg(long)]
        code: String,
    },
    Leave {
        #[arg(long)]
        user: String,
        #[arg(long)]
        group: String,
    },
    Show {
        #[arg(long)]
        user: String,
        #[arg(long)]
        group: String,
    },
    /// Groups the user belongs to.
    List {
        #[arg(long)]
        user: String,
    },
    Rename {
        #[arg(long)]
        user: String,
        #[arg(long)]
        group: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Set or clear the group image reference.
    Image {
        #[arg(long)]
        user: String,
        #[arg(long)]
        group: String,
        #[arg(long)]
        image: Option<String>,
    },
    Delete {
        #[arg(long)]
        user: String,
        #[arg(long)]
        group: String,
    },
}

// ─── expenses ───────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ExpenseArgs {
    #[command(subcommand)]
    command: ExpenseCommand,
}

/// Participants of a split. At most one flavour may be given.
#[derive(Args, Debug, Default)]
struct SplitArgs {
    /// Split equally between these user ids.
    #[arg(long, num_args = 1.., conflicts_with_all = ["shares", "amounts"])]
    equal: Vec<String>,
    /// `user_id=weight`, repeatable.
    #[arg(long = "share", value_parser = parse_pair, conflicts_with = "amounts")]
    shares: Vec<(String, f64)>,
    /// `user_id=amount`, repeatable.
    #[arg(long = "amount-of", value_parser = parse_pair)]
    amounts: Vec<(String, f64)>,
}

impl SplitArgs {
    fn into_split(self) -> Option<(SplitType, SplitSpec)> {
        if !self.equal.is_empty() {
            Some((SplitType::Equal, SplitSpec::participants(self.equal)))
        } else if !self.shares.is_empty() {
            Some((SplitType::Shares, SplitSpec::with_values(self.shares)))
        } else if !self.amounts.is_empty() {
            Some((SplitType::Amounts, SplitSpec::with_values(self.amounts)))
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Order {
    Insertion,
    DateAsc,
    DateDesc,
}

impl From<Order> for ExpenseOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Insertion => ExpenseOrder::Insertion,
            Order::DateAsc => ExpenseOrder::DateAscending,
            Order::DateDesc => ExpenseOrder::DateDescending,
        }
    }
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
    Add {
        #[arg(long)]
        group: String,
        #[arg(long)]
        payer: String,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        label: String,
        #[arg(long, default_value = "EUR")]
        currency: String,
        #[arg(long)]
        kind: Option<String>,
        /// RFC 3339 timestamp, defaults to now.
        #[arg(long)]
        date: Option<DateTime<Utc>>,
        #[arg(long)]
        image: Option<String>,
        #[command(flatten)]
        split: SplitArgs,
    },
    Update {
        #[arg(long)]
        user: String,
        #[arg(long)]
        group: String,
        #[arg(long)]
        expense: Uuid,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        /// Switch strategy without new participants (only `equal` makes sense).
        #[arg(long)]
        split_type: Option<String>,
        #[arg(long)]
        date: Option<DateTime<Utc>>,
        #[command(flatten)]
        split: SplitArgs,
    },
    List {
        #[arg(long)]
        user: String,
        #[arg(long)]
        group: String,
        #[arg(long, value_enum, default_value = "insertion")]
        order: Order,
    },
    Show {
        #[arg(long)]
        user: String,
        #[arg(long)]
        group: String,
        #[arg(long)]
        expense: Uuid,
    },
    /// Set or clear the expense image reference.
    Image {
        #[arg(long)]
        user: String,
        #[arg(long)]
        group: String,
        #[arg(long)]
        expense: Uuid,
        #[arg(long)]
        image: Option<String>,
    },
    Delete {
        #[arg(long)]
        user: String,
        #[arg(long)]
        group: String,
        #[arg(long)]
        expense: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct ActivityArgs {
    #[arg(long)]
    user: String,
    #[arg(long)]
    group: String,
    #[arg(long)]
    limit: Option<u64>,
}

#[derive(Args, Debug)]
pub struct RemindArgs {
    #[arg(long)]
    group: String,
    /// Member sending the reminder.
    #[arg(long)]
    from: String,
    /// Member being reminded.
    #[arg(long)]
    to: String,
    /// `creditor=amount`, repeatable.
    #[arg(long = "owe", value_parser = parse_pair, required = true)]
    owed: Vec<(String, f64)>,
}

fn parse_pair(raw: &str) -> Result<(String, f64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid number `{value}`: {err}"))?;
    Ok((key.trim().to_string(), value))
}

fn to_json<T: Serialize>(value: T) -> Result<Value, EngineError> {
    serde_json::to_value(value).map_err(|err| EngineError::Validation(err.to_string()))
}

/// Run one subcommand and return what should be printed.
pub async fn run(engine: &Engine, command: Command) -> Result<Value, EngineError> {
    match command {
        Command::User(UserArgs { command }) => match command {
            UserCommand::Create {
                username,
                device_token,
            } => to_json(engine.create_user(&username, device_token.as_deref()).await?),
            UserCommand::Show { user } => to_json(engine.user(&user).await?),
            UserCommand::Device { user, token } => {
                to_json(engine.set_device_token(&user, token.as_deref()).await?)
            }
        },
        Command::Group(GroupArgs { command }) => run_group(engine, command).await,
        Command::Expense(ExpenseArgs { command }) => run_expense(engine, command).await,
        Command::Activity(ActivityArgs { user, group, limit }) => {
            to_json(engine.activity(&group, &user, limit).await?)
        }
        Command::Remind(RemindArgs {
            group,
            from,
            to,
            owed,
        }) => {
            let owed = owed
                .into_iter()
                .map(|(creditor, amount)| AmountOwed::new(creditor, amount))
                .collect();
            to_json(
                engine
                    .send_reminder(ReminderCmd::new(group, from, to, owed))
                    .await?,
            )
        }
    }
}

async fn run_group(engine: &Engine, command: GroupCommand) -> Result<Value, EngineError> {
    match command {
        GroupCommand::Create {
            user,
            name,
            description,
        } => to_json(
            engine
                .create_group(&user, &name, description.as_deref())
                .await?,
        ),
        GroupCommand::Join { user, code } => to_json(engine.join_group(&code, &user).await?),
        GroupCommand::Leave { user, group } => to_json(engine.leave_group(&group, &user).await?),
        GroupCommand::Show { user, group } => to_json(engine.group(&group, &user).await?),
        GroupCommand::List { user } => to_json(engine.groups(&user).await?),
        GroupCommand::Rename {
            user,
            group,
            name,
            description,
        } => to_json(
            engine
                .rename_group(&group, &user, name.as_deref(), description.as_deref())
                .await?,
        ),
        GroupCommand::Image { user, group, image } => {
            let previous = engine
                .set_group_image(&group, &user, image.as_deref())
                .await?;
            Ok(json!({ "previous": previous }))
        }
        GroupCommand::Delete { user, group } => {
            engine.delete_group(&group, &user).await?;
            Ok(json!({ "deleted": group }))
        }
    }
}

async fn run_expense(engine: &Engine, command: ExpenseCommand) -> Result<Value, EngineError> {
    match command {
        ExpenseCommand::Add {
            group,
            payer,
            amount,
            label,
            currency,
            kind,
            date,
            image,
            split,
        } => {
            let date = date.unwrap_or_else(Utc::now);
            let mut cmd = AddExpenseCmd::new(group, payer, amount, label, date)
                .currency(Currency::try_from(currency.as_str())?);
            if let Some(kind) = kind {
                cmd = cmd.kind(kind);
            }
            if let Some(image) = image {
                cmd = cmd.image(image);
            }
            if let Some((split_type, spec)) = split.into_split() {
                cmd = cmd.split(split_type, spec);
            }
            to_json(engine.add_expense(cmd).await?)
        }
        ExpenseCommand::Update {
            user,
            group,
            expense,
            amount,
            label,
            currency,
            kind,
            split_type,
            date,
            split,
        } => {
            let mut cmd = UpdateExpenseCmd::new(group, expense, user);
            if let Some(amount) = amount {
                cmd = cmd.amount(amount);
            }
            if let Some(label) = label {
                cmd = cmd.label(label);
            }
            if let Some(currency) = currency {
                cmd = cmd.currency(Currency::try_from(currency.as_str())?);
            }
            if let Some(kind) = kind {
                cmd = cmd.kind(kind);
            }
            if let Some(split_type) = split_type {
                cmd = cmd.split_type(SplitType::try_from(split_type.as_str())?);
            }
            if let Some(date) = date {
                cmd = cmd.date(date);
            }
            if let Some((split_type, spec)) = split.into_split() {
                cmd = cmd.split(split_type, spec);
            }
            to_json(engine.update_expense(cmd).await?)
        }
        ExpenseCommand::List { user, group, order } => {
            to_json(engine.expenses(&group, &user, order.into()).await?)
        }
        ExpenseCommand::Show {
            user,
            group,
            expense,
        } => to_json(engine.expense(&group, expense, &user).await?),
        ExpenseCommand::Image {
            user,
            group,
            expense,
            image,
        } => {
            let previous = engine
                .set_expense_image(&group, expense, &user, image.as_deref())
                .await?;
            Ok(json!({ "previous": previous }))
        }
        ExpenseCommand::Delete {
            user,
            group,
            expense,
        } => {
            engine.delete_expense(&group, expense, &user).await?;
            Ok(json!({ "deleted": expense }))
        }
    }
}

/// Process exit code for a failed command.
pub fn exit_code(err: &EngineError) -> u8 {
    match err {
        EngineError::Database(_) => 1,
        EngineError::Validation(_) | EngineError::InvalidSplit(_) => 2,
        EngineError::NotFound(_) => 3,
        EngineError::NotMember(_) | EngineError::Forbidden(_) => 4,
        EngineError::AlreadyMember(_) | EngineError::Conflict(_) => 5,
        EngineError::Cooldown(_) => 6,
        EngineError::NoDevice(_) | EngineError::Notification(_) => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_parsed() {
        assert_eq!(parse_pair("carol=17.5"), Ok(("carol".to_string(), 17.5)));
        assert_eq!(parse_pair(" bob = 2 "), Ok(("bob".to_string(), 2.0)));
        assert!(parse_pair("carol").is_err());
        assert!(parse_pair("carol=lots").is_err());
    }

    #[test]
    fn split_flags_pick_the_strategy() {
        let cli = Cli::try_parse_from([
            "spleet", "expense", "add", "--group", "g", "--payer", "a", "--amount", "30",
            "--label", "Taxi", "--share", "a=2", "--share", "b=1",
        ])
        .unwrap();
        let Command::Expense(ExpenseArgs {
            command: ExpenseCommand::Add { split, .. },
        }) = cli.command
        else {
            panic!("expected expense add");
        };
        let (split_type, spec) = split.into_split().unwrap();
        assert_eq!(split_type, SplitType::Shares);
        assert_eq!(spec.participants, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn mixed_split_flags_are_rejected() {
        let parsed = Cli::try_parse_from([
            "spleet", "expense", "add", "--group", "g", "--payer", "a", "--amount", "30",
            "--label", "Taxi", "--equal", "a", "b", "--share", "a=2",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn reminders_need_at_least_one_debt() {
        let parsed = Cli::try_parse_from([
            "spleet", "remind", "--group", "g", "--from", "a", "--to", "b",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn errors_map_to_distinct_exit_codes() {
        assert_eq!(exit_code(&EngineError::Validation("x".into())), 2);
        assert_eq!(exit_code(&EngineError::Cooldown("x".into())), 6);
        assert_ne!(
            exit_code(&EngineError::NotFound("x".into())),
            exit_code(&EngineError::NotMember("x".into()))
        );
    }
}
