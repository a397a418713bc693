//! §4.9 Task/command registry — in-memory, process-local bookkeeping for
//! orchestration-level tasks (e.g. "create tunnel 7") and the individual
//! agent [`Command`]s they dispatch. Generalizes the teacher's
//! `DashMap<String, Arc<RwLock<AgentState>>>` connection registry
//! (`state.rs`) from "one entry per live connection" to "one entry per
//! in-flight task/command", including the teacher's pattern of an
//! `AtomicU64` id counter for monotonically increasing ids.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use netly_protocol::{Command, CommandStatus, CommandType};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub kind: String,
    pub status: TaskStatus,
    pub meta: Value,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CommandRecord {
    pub command: Command,
    pub task_id: String,
    pub status: CommandStatus,
    pub output: Option<String>,
}

/// Tracks tasks and their dispatched commands. One instance is shared
/// across the whole server process (`Arc<TaskRegistry>`).
pub struct TaskRegistry {
    tasks: DashMap<String, Task>,
    commands: DashMap<u64, CommandRecord>,
    /// Commands awaiting delivery to a node, in dispatch order; drained by
    /// `pending_commands` on the node's next heartbeat.
    pending_by_node: DashMap<u64, VecDeque<u64>>,
    next_command_id: AtomicU64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            commands: DashMap::new(),
            pending_by_node: DashMap::new(),
            next_command_id: AtomicU64::new(1),
        }
    }

    pub fn create_task(&self, kind: impl Into<String>, meta: Value) -> Task {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            kind: kind.into(),
            status: TaskStatus::Pending,
            meta,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.tasks.insert(task.id.clone(), task.clone());
        task
    }

    pub fn update_task(&self, task_id: &str, status: TaskStatus) {
        if let Some(mut t) = self.tasks.get_mut(task_id) {
            t.status = status;
            t.updated_at = Utc::now();
        }
    }

    pub fn fail_task(&self, task_id: &str, error: impl Into<String>) {
        if let Some(mut t) = self.tasks.get_mut(task_id) {
            t.status = TaskStatus::Failed;
            t.error = Some(error.into());
            t.updated_at = Utc::now();
        }
    }

    pub fn get_task(&self, task_id: &str) -> Option<Task> {
        self.tasks.get(task_id).map(|t| t.clone())
    }

    /// Queues a command for `node_id` under `task_id`, returning the wire
    /// [`Command`] that will be handed back on the node's next heartbeat.
    pub fn create_command(
        &self,
        task_id: &str,
        node_id: u64,
        command_type: CommandType,
        payload: String,
        priority: i32,
    ) -> Command {
        let id = self.next_command_id.fetch_add(1, Ordering::Relaxed);
        let command = Command {
            id,
            node_id,
            command_type,
            payload,
            priority,
            created_at: Utc::now().timestamp(),
        };
        self.commands.insert(
            id,
            CommandRecord {
                command: command.clone(),
                task_id: task_id.to_string(),
                status: CommandStatus::Pending,
                output: None,
            },
        );
        self.pending_by_node.entry(node_id).or_default().push_back(id);
        command
    }

    /// Drains every command still `Pending` for `node_id`, flipping each to
    /// `Delivered` as it's handed back — the heartbeat response doubles as
    /// the delivery transport (§4.9 / external interfaces).
    pub fn pending_commands(&self, node_id: u64) -> Vec<Command> {
        let Some(mut queue) = self.pending_by_node.get_mut(&node_id) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(queue.len());
        while let Some(id) = queue.pop_front() {
            if let Some(mut record) = self.commands.get_mut(&id) {
                record.status = CommandStatus::Delivered;
                out.push(record.command.clone());
            }
        }
        out
    }

    pub fn update_command_status(&self, command_id: u64, status: CommandStatus, output: Option<String>) {
        if let Some(mut record) = self.commands.get_mut(&command_id) {
            record.status = status;
            record.output = output;
        }
    }

    pub fn get_command(&self, command_id: u64) -> Option<CommandRecord> {
        self.commands.get(&command_id).map(|c| c.clone())
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedTaskRegistry = Arc<TaskRegistry>;
