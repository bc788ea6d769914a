use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use super::{Reply, RequestHandler, Service, ServiceError};
use crate::models::tasks::{TaskHistoryEntry, TaskReward, TaskWithStatus};
use crate::repositories::tasks::TaskRepository;

pub enum TaskRequest {
    ListTasks {
        user_id: String,
        response: Reply<Vec<TaskWithStatus>>,
    },
    GetHistory {
        user_id: String,
        response: Reply<Vec<TaskHistoryEntry>>,
    },
    CompleteTask {
        user_id: String,
        task_id: String,
        response: Reply<TaskReward>,
    },
}

#[derive(Clone)]
pub struct TaskRequestHandler {
    repository: TaskRepository,
}

impl TaskRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = TaskRepository::new(sql_conn);

        Self { repository }
    }

    async fn list_tasks(&self, user_id: &str) -> Result<Vec<TaskWithStatus>, ServiceError> {
        let today = Utc::now().date_naive();

        Ok(self.repository.get_tasks(user_id, today).await?)
    }

    async fn get_history(&self, user_id: &str) -> Result<Vec<TaskHistoryEntry>, ServiceError> {
        Ok(self.repository.get_history(user_id).await?)
    }

    async fn complete_task(&self, user_id: &str, task_id: &str) -> Result<TaskReward, ServiceError> {
        let today = Utc::now().date_naive();
        let reward = self.repository.complete_task(user_id, task_id, today).await?;

        log::info!(
            "User {} completed task {} for {} cents ({} commissions paid).",
            user_id,
            task_id,
            reward.earned_in_cents,
            reward.commissions_paid
        );

        Ok(reward)
    }
}

#[async_trait]
impl RequestHandler<TaskRequest> for TaskRequestHandler {
    async fn handle_request(&self, request: TaskRequest) {
        match request {
            TaskRequest::ListTasks { user_id, response } => {
                let tasks = self.list_tasks(&user_id).await;
                let _ = response.send(tasks);
            }
            TaskRequest::GetHistory { user_id, response } => {
                let history = self.get_history(&user_id).await;
                let _ = response.send(history);
            }
            TaskRequest::CompleteTask {
                user_id,
                task_id,
                response,
            } => {
                let reward = self.complete_task(&user_id, &task_id).await;
                let _ = response.send(reward);
            }
        }
    }
}

pub struct TaskService;

impl TaskService {
    pub fn new() -> Self {
        TaskService {}
    }
}

#[async_trait]
impl Service<TaskRequest, TaskRequestHandler> for TaskService {}
