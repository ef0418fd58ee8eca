use crate::db::{
    connection::Database,
    documents::{Direction, DocPath, Query, SetMode},
    error::RemoteError,
    models::{NewRemoteTask, RemoteTask, RemoteTaskPatch, UserTaskItem},
    TASKS, USERS, USER_TASKS,
};
use crate::{log_error, log_info};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "remote_tasks";

impl Database {
    pub async fn create_task(&self, owner_id: &str, task: NewRemoteTask) -> Result<String, RemoteError> {
        let owner_id = owner_id.to_string();
        let id = self
            .transaction(move |tx| {
                let fields = task.clone().into_fields(&owner_id, tx.now_ms());
                Ok(tx.create(TASKS, fields)?.id().to_string())
            })
            .await
            .inspect_err(|err| log_error!("create_task failed: {err}"))?;
        log_info!("task {id} created");
        Ok(id)
    }

    pub async fn get_task(&self, task_id: &str) -> Option<RemoteTask> {
        let path = DocPath::new(TASKS, task_id).ok()?;
        match self.transaction(move |tx| tx.get(&path)).await {
            Ok(doc) => doc.map(|doc| RemoteTask::from_document(doc.id(), &doc.data)),
            Err(err) => {
                log_error!("get_task failed: {err}");
                None
            }
        }
    }

    pub async fn update_task(&self, task_id: &str, patch: RemoteTaskPatch) -> Result<(), RemoteError> {
        let path = DocPath::new(TASKS, task_id)?;
        self.transaction(move |tx| {
            let fields = patch.clone().into_fields(tx.now_ms());
            tx.update(&path, fields)?;
            Ok(())
        })
        .await
        .inspect_err(|err| log_error!("update_task failed: {err}"))
    }

    /// Deletes a task owned by `owner_id`. Someone else's task is refused;
    /// an already-missing task is not an error.
    pub async fn delete_task(&self, owner_id: &str, task_id: &str) -> Result<(), RemoteError> {
        let path = DocPath::new(TASKS, task_id)?;
        let owner_id = owner_id.to_string();
        self.transaction(move |tx| {
            let Some(doc) = tx.get(&path)? else {
                return Ok(());
            };
            let task = RemoteTask::from_document(doc.id(), &doc.data);
            if task.owner_id != owner_id {
                return Err(RemoteError::PermissionDenied(format!(
                    "{path} is not owned by {owner_id}"
                )));
            }
            tx.delete(&path)?;
            Ok(())
        })
        .await
        .inspect_err(|err| log_error!("delete_task failed: {err}"))
    }

    /// Newest first; empty on error.
    pub async fn list_user_tasks(&self, user_id: &str) -> Vec<UserTaskItem> {
        let parent = match DocPath::new(USERS, user_id) {
            Ok(parent) => parent,
            Err(err) => {
                log_error!("list_user_tasks: {err}");
                return Vec::new();
            }
        };
        let query = Query::subcollection(&parent, USER_TASKS).order_by("createdAt", Direction::Desc);
        match self.transaction(move |tx| tx.query(&query)).await {
            Ok(docs) => docs
                .iter()
                .map(|doc| UserTaskItem::from_document(doc.id(), &doc.data))
                .collect(),
            Err(err) => {
                log_error!("list_user_tasks failed: {err}");
                Vec::new()
            }
        }
    }

    pub async fn add_user_task(&self, user_id: &str, title: &str) -> Result<String, RemoteError> {
        let parent = DocPath::new(USERS, user_id)?;
        let title = title.trim().to_string();
        self.transaction(move |tx| {
            let collection = format!("{parent}/{USER_TASKS}");
            let fields = crate::fields! { "title" => title.as_str(), "createdAt" => tx.now_ms() };
            Ok(tx.create(&collection, fields)?.id().to_string())
        })
        .await
        .inspect_err(|err| log_error!("add_user_task failed: {err}"))
    }

    pub async fn delete_user_task(&self, user_id: &str, task_id: &str) -> Result<(), RemoteError> {
        let path = DocPath::new(USERS, user_id)?.child(USER_TASKS, task_id)?;
        self.transaction(move |tx| {
            tx.delete(&path)?;
            Ok(())
        })
        .await
        .inspect_err(|err| log_error!("delete_user_task failed: {err}"))
    }

    /// Replaces a subcollection entry's title.
    pub async fn rename_user_task(&self, user_id: &str, task_id: &str, title: &str) -> Result<(), RemoteError> {
        let path = DocPath::new(USERS, user_id)?.child(USER_TASKS, task_id)?;
        let title = title.trim().to_string();
        self.transaction(move |tx| {
            tx.set(&path, crate::fields! { "title" => title.as_str() }, SetMode::Merge)?;
            Ok(())
        })
        .await
        .inspect_err(|err| log_error!("rename_user_task failed: {err}"))
    }
}
