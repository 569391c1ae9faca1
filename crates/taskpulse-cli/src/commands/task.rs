//! Task management commands for CLI.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use taskpulse_core::model::{Task, TaskPriority, TaskStatus};
use taskpulse_core::storage::Database;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Add {
        /// Task title
        title: String,
        /// Priority: low, medium, high or urgent (default: medium)
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Due date (RFC 3339)
        #[arg(long)]
        due: Option<String>,
        /// Project ID to associate with
        #[arg(long)]
        project_id: Option<String>,
    },
    /// List tasks
    List {
        /// Include completed and cancelled tasks
        #[arg(long)]
        all: bool,
    },
    /// Get task details
    Get {
        /// Task ID
        id: String,
    },
    /// Update a task's status
    SetStatus {
        /// Task ID
        id: String,
        /// New status: pending, in_progress, completed or cancelled
        status: String,
    },
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        TaskAction::Add {
            title,
            priority,
            due,
            project_id,
        } => {
            let priority: TaskPriority = priority.parse()?;
            let due_date = due
                .map(|d| DateTime::parse_from_rfc3339(&d).map(|t| t.with_timezone(&Utc)))
                .transpose()?;
            let now = Utc::now();
            let task = Task {
                id: Uuid::new_v4().to_string(),
                title,
                status: TaskStatus::Pending,
                priority,
                due_date,
                created_at: now,
                updated_at: now,
                last_worked_at: None,
                project_id,
            };
            db.insert_task(&task)?;
            println!("Task created: {}", task.id);
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::List { all } => {
            let tasks = db.list_tasks(all)?;
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        TaskAction::Get { id } => {
            let task = db.get_task(&id)?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::SetStatus { id, status } => {
            let status: TaskStatus = status.parse()?;
            db.set_task_status(&id, status, Utc::now())?;
            println!("Task {id} -> {}", status.as_str());
        }
    }
    Ok(())
}
