use crate::db::{
    connection::Database,
    documents::{Direction, Query},
    error::RemoteError,
    models::{NewNotification, Notification},
    NOTIFICATIONS,
};
use crate::{log_error, log_info};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "notifications";

impl Database {
    /// Newest first; empty on error.
    pub async fn list_notifications(&self, user_id: &str) -> Vec<Notification> {
        let query = Query::collection(NOTIFICATIONS)
            .where_eq("userId", user_id)
            .order_by("createdAt", Direction::Desc);
        match self.transaction(move |tx| tx.query(&query)).await {
            Ok(docs) => docs
                .iter()
                .map(|doc| Notification::from_document(doc.id(), &doc.data))
                .collect(),
            Err(err) => {
                log_error!("list_notifications failed: {err}");
                Vec::new()
            }
        }
    }

    pub async fn add_notification(
        &self,
        user_id: &str,
        notification: NewNotification,
    ) -> Result<String, RemoteError> {
        let user_id = user_id.to_string();
        self.transaction(move |tx| {
            let fields = crate::fields! {
                "userId" => user_id.as_str(),
                "title" => notification.title.as_str(),
                "body" => notification.body.as_str(),
                "type" => notification.kind.as_deref(),
                "read" => false,
                "createdAt" => tx.now_ms(),
            };
            Ok(tx.create(NOTIFICATIONS, fields)?.id().to_string())
        })
        .await
        .inspect_err(|err| log_error!("add_notification failed: {err}"))
    }

    /// Flags every unread notification of the user in one transaction and
    /// returns how many changed.
    pub async fn mark_all_notifications_read(&self, user_id: &str) -> Result<usize, RemoteError> {
        let query = Query::collection(NOTIFICATIONS)
            .where_eq("userId", user_id)
            .where_eq("read", false);
        let changed = self
            .transaction(move |tx| {
                let unread = tx.query(&query)?;
                for doc in &unread {
                    tx.update(&doc.path, crate::fields! { "read" => true })?;
                }
                Ok(unread.len())
            })
            .await
            .inspect_err(|err| log_error!("mark_all_notifications_read failed: {err}"))?;
        if changed > 0 {
            log_info!("marked {changed} notifications read");
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::db::{models::NewNotification, Database};
    use crate::utils::SystemClock;

    #[tokio::test]
    async fn mark_all_read_only_touches_own_unread() {
        let db = Database::in_memory(Arc::new(SystemClock)).unwrap();
        for title in ["a", "b"] {
            db.add_notification(
                "u1",
                NewNotification {
                    title: title.into(),
                    body: "x".into(),
                    kind: Some("streak".into()),
                },
            )
            .await
            .unwrap();
        }
        db.add_notification("u2", NewNotification::default()).await.unwrap();

        assert_eq!(db.mark_all_notifications_read("u1").await.unwrap(), 2);
        assert_eq!(db.mark_all_notifications_read("u1").await.unwrap(), 0);

        let listed = db.list_notifications("u1").await;
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|n| n.read));
        assert_eq!(listed[0].kind.as_deref(), Some("streak"));
        assert!(!db.list_notifications("u2").await[0].read);
    }
}
