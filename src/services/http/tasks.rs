use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use serde_json::{json, Value};

use super::{auth::CurrentUser, AppState};
use crate::models::tasks::{TaskCompletion, TaskReward};
use crate::services::{call, tasks::TaskRequest, ServiceError};

pub async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ServiceError> {
    let tasks = call("Tasks", &state.task_channel, |response| TaskRequest::ListTasks {
        user_id: user.id,
        response,
    })
    .await?;

    Ok(Json(json!({ "tasks": tasks })))
}

pub async fn task_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ServiceError> {
    let history = call("Tasks", &state.task_channel, |response| {
        TaskRequest::GetHistory {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(json!({ "history": history })))
}

pub async fn complete_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<TaskCompletion>, JsonRejection>,
) -> Result<Json<TaskReward>, ServiceError> {
    let Json(completion) = payload?;

    let reward = call("Tasks", &state.task_channel, |response| {
        TaskRequest::CompleteTask {
            user_id: user.id,
            task_id: completion.task_id,
            response,
        }
    })
    .await?;

    Ok(Json(reward))
}
