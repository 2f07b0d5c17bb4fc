//! Tasks announced by an instance and routed to whichever one is focused.

use crate::{ClientId, ModelError};

use common::ErrorLocation;

use std::panic::Location;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkTaskStatus {
    Pending,
    Assigned,
    Completed,
    Failed,
}

impl MarkTaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MarkTaskStatus::Completed | MarkTaskStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkTask {
    pub task_id: String,
    pub description: String,
    pub received_at: DateTime<Utc>,
    pub status: MarkTaskStatus,
    pub assigned_to: Option<ClientId>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub result_message: Option<String>,
}

impl MarkTask {
    pub fn new(task_id: impl Into<String>, description: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            task_id: task_id.into(),
            description: description.into(),
            received_at: at,
            status: MarkTaskStatus::Pending,
            assigned_to: None,
            assigned_at: None,
            result_message: None,
        }
    }

    /// `pending -> assigned`.
    #[track_caller]
    pub fn assign(&mut self, client: ClientId, at: DateTime<Utc>) -> Result<(), ModelError> {
        if self.status != MarkTaskStatus::Pending {
            return Err(ModelError::InvalidTransition {
                message: format!("Task {} cannot be assigned from {:?}", self.task_id, self.status),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        self.status = MarkTaskStatus::Assigned;
        self.assigned_to = Some(client);
        self.assigned_at = Some(at);
        Ok(())
    }

    /// `assigned -> completed | failed`.
    #[track_caller]
    pub fn finish(&mut self, success: bool, message: impl Into<String>) -> Result<(), ModelError> {
        if self.status != MarkTaskStatus::Assigned {
            return Err(ModelError::InvalidTransition {
                message: format!("Task {} cannot finish from {:?}", self.task_id, self.status),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        self.status = if success {
            MarkTaskStatus::Completed
        } else {
            MarkTaskStatus::Failed
        };
        self.result_message = Some(message.into());
        Ok(())
    }
}
