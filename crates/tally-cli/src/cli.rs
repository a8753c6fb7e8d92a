use clap::{Args, Parser, Subcommand, ValueEnum};
use tally_core::models::{CounterKind, NotificationTimeUnit, RecurrenceType, TimeUnit};

/// Tally: routines, counters and reminders from the terminal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage tasks and routines
    #[command(subcommand)]
    Task(TaskCommand),
    /// Manage counters
    #[command(subcommand)]
    Counter(CounterCommand),
    /// Show the tasks and counters of a day
    Today(TodayCommand),
    /// Show a month with per-day activity
    Calendar(CalendarCommand),
    /// Manage in-app notifications
    #[command(subcommand)]
    Notifications(NotificationCommand),
    /// Roll counters over into the current period
    Reset,
    /// Delete every task and counter
    Wipe(ForceFlag),
    /// Keep resetting counters and firing reminders until interrupted
    Watch,
}

#[derive(Args, Debug, Clone)]
pub struct ForceFlag {
    /// Skip the confirmation prompt
    #[clap(short, long)]
    pub force: bool,
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    /// Add a one-time task or a routine
    Add(AddTaskCommand),
    /// List all tasks
    List,
    /// Toggle completion of a task for a day
    Done(TaskDateCommand),
    /// Remove one occurrence of a routine
    Skip(TaskDateCommand),
    /// Show the next occurrences of a routine
    Upcoming(UpcomingCommand),
    /// Delete a task and all its occurrences
    Delete(DeleteCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct AddTaskCommand {
    /// The title of the task
    pub title: String,
    /// The description of the task
    #[clap(short, long)]
    pub description: Option<String>,
    /// Day of a one-time task (e.g. 'tomorrow', '2025-03-14'); defaults to today
    #[clap(long, conflicts_with_all = ["days", "month_day", "every"])]
    pub on: Option<String>,
    /// Time of day (e.g. '9:00', '6pm')
    #[clap(long)]
    pub at: Option<String>,
    /// Weekdays of a routine (e.g. 'mon,wed,fri', 'weekdays')
    #[clap(long)]
    pub days: Option<String>,
    /// Day of the month of a routine (1-31)
    #[clap(long)]
    pub month_day: Option<u32>,
    /// Interval cadence of a routine
    #[clap(long, value_enum)]
    pub every: Option<RecurrenceArg>,
    /// Interval for '--every custom'
    #[clap(long, requires = "every")]
    pub interval: Option<u32>,
    /// Unit for '--every custom'
    #[clap(long, value_enum, requires = "every")]
    pub unit: Option<UnitArg>,
    /// First day of a routine; defaults to today
    #[clap(long)]
    pub from: Option<String>,
    /// Last day of a routine
    #[clap(long)]
    pub until: Option<String>,
    /// Remind before the task
    #[clap(long)]
    pub remind: bool,
    /// How far ahead to remind
    #[clap(long, requires = "remind")]
    pub remind_before: Option<u32>,
    /// Unit of '--remind-before'
    #[clap(long, value_enum, default_value = "minutes")]
    pub remind_unit: ReminderUnitArg,
    /// Ask for feedback on the reminder
    #[clap(long)]
    pub feedback: bool,
}

impl AddTaskCommand {
    pub fn is_routine(&self) -> bool {
        self.days.is_some() || self.month_day.is_some() || self.every.is_some()
    }
}

#[derive(Parser, Debug, Clone)]
pub struct TaskDateCommand {
    /// The ID of the task
    pub id: String,
    /// Day of the occurrence; defaults to today
    #[clap(long)]
    pub date: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct UpcomingCommand {
    /// The ID of the task
    pub id: String,
    /// How many occurrences to show
    #[clap(short = 'n', long, default_value = "5")]
    pub count: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// The ID of the item to delete
    pub id: String,
    /// Force deletion without confirmation
    #[clap(short, long)]
    pub force: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceArg {
    Weekly,
    Biweekly,
    Monthly,
    Custom,
}

impl From<RecurrenceArg> for RecurrenceType {
    fn from(arg: RecurrenceArg) -> Self {
        match arg {
            RecurrenceArg::Weekly => RecurrenceType::Weekly,
            RecurrenceArg::Biweekly => RecurrenceType::Biweekly,
            RecurrenceArg::Monthly => RecurrenceType::Monthly,
            RecurrenceArg::Custom => RecurrenceType::Custom,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitArg {
    Days,
    Weeks,
    Months,
}

impl From<UnitArg> for TimeUnit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::Days => TimeUnit::Days,
            UnitArg::Weeks => TimeUnit::Weeks,
            UnitArg::Months => TimeUnit::Months,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderUnitArg {
    Minutes,
    Hours,
}

impl From<ReminderUnitArg> for NotificationTimeUnit {
    fn from(arg: ReminderUnitArg) -> Self {
        match arg {
            ReminderUnitArg::Minutes => NotificationTimeUnit::Minutes,
            ReminderUnitArg::Hours => NotificationTimeUnit::Hours,
        }
    }
}

// ============================================================================
// Counters
// ============================================================================

#[derive(Subcommand, Debug, Clone)]
pub enum CounterCommand {
    /// Add a counter
    Add(AddCounterCommand),
    /// List counters, rolling them into the current period first
    List,
    /// Add one to a counter
    Inc(CounterIdCommand),
    /// Subtract one from a counter
    Dec(CounterIdCommand),
    /// Show the archived periods of a counter
    History(CounterIdCommand),
    /// Show archived entries of all counters between two days
    Entries(EntriesCommand),
    /// Store the current value of a counter
    Snapshot(SnapshotCommand),
    /// Delete a counter; its history is kept
    Delete(DeleteCommand),
    /// Delete every counter
    Clear(ForceFlag),
    /// Drop history older than the retention window
    Purge(PurgeCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct AddCounterCommand {
    /// The name of the counter
    pub name: String,
    /// The description of the counter
    #[clap(short, long)]
    pub description: Option<String>,
    /// How often the counter resets
    #[clap(short, long, value_enum, default_value = "daily")]
    pub kind: CounterKindArg,
    /// Target value
    #[clap(short, long)]
    pub goal: Option<u32>,
    /// First active day; defaults to today
    #[clap(long)]
    pub start: Option<String>,
    /// Last active day
    #[clap(long)]
    pub end: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKindArg {
    Daily,
    Weekly,
    Monthly,
    Cumulative,
}

impl From<CounterKindArg> for CounterKind {
    fn from(arg: CounterKindArg) -> Self {
        match arg {
            CounterKindArg::Daily => CounterKind::Daily,
            CounterKindArg::Weekly => CounterKind::Weekly,
            CounterKindArg::Monthly => CounterKind::Monthly,
            CounterKindArg::Cumulative => CounterKind::Cumulative,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct CounterIdCommand {
    /// The ID of the counter
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct EntriesCommand {
    /// First day of the range
    #[clap(long)]
    pub from: String,
    /// Last day of the range; defaults to today
    #[clap(long)]
    pub to: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct SnapshotCommand {
    /// The ID of the counter
    pub id: String,
    /// A note stored with the snapshot
    #[clap(short, long)]
    pub note: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct PurgeCommand {
    /// Keep this many days; defaults to the configured retention
    #[clap(long)]
    pub days: Option<u32>,
}

// ============================================================================
// Views
// ============================================================================

#[derive(Parser, Debug, Clone)]
pub struct TodayCommand {
    /// Day to show (e.g. 'yesterday', '2025-03-14'); defaults to today
    #[clap(long)]
    pub date: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct CalendarCommand {
    /// Any day of the month to show; defaults to this month
    #[clap(long)]
    pub month: Option<String>,
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Subcommand, Debug, Clone)]
pub enum NotificationCommand {
    /// List notifications, newest first
    List,
    /// Mark one or all notifications as read
    Read(ReadCommand),
    /// Delete a notification
    Delete(DeleteCommand),
    /// Delete every notification
    Clear(ForceFlag),
    /// Delete notifications older than the retention window
    Purge(PurgeCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct ReadCommand {
    /// The ID of the notification
    #[clap(required_unless_present = "all")]
    pub id: Option<String>,
    /// Mark every notification as read
    #[clap(long, conflicts_with = "id")]
    pub all: bool,
}
