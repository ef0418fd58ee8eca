use crate::db::{
    connection::Database,
    documents::{Direction, DocPath, Query},
    error::RemoteError,
    models::{app_allowance_for, AllowAppOutcome, AppAllowance, FocusApp, User},
    ALLOWED_APPS, BLOCKED_APPS, USERS,
};
use crate::{log_error, log_info};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "apps";

fn apps_of(collection: &str, user_id: &str) -> Query {
    Query::collection(collection)
        .where_eq("userId", user_id)
        .order_by("createdAt", Direction::Asc)
}

impl Database {
    /// Oldest first; empty on error.
    pub async fn list_allowed_apps(&self, user_id: &str) -> Vec<FocusApp> {
        self.list_apps(ALLOWED_APPS, user_id).await
    }

    /// Oldest first; empty on error.
    pub async fn list_blocked_apps(&self, user_id: &str) -> Vec<FocusApp> {
        self.list_apps(BLOCKED_APPS, user_id).await
    }

    /// How many apps the user has allowed against the free-plan cap. Reads
    /// as an empty free allowance on error.
    pub async fn allowed_app_allowance(&self, user_id: &str) -> AppAllowance {
        let is_premium = self.get_user_premium(user_id).await;
        let allowed = self.list_allowed_apps(user_id).await.len();
        app_allowance_for(allowed, is_premium)
    }

    /// Allows `name` during focus and drops it from the blocked list. Free
    /// users stop at the cap; an app already allowed is left as is.
    pub async fn add_allowed_app(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<AllowAppOutcome, RemoteError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(RemoteError::InvalidPath("app name is empty".into()));
        }
        let user_path = DocPath::new(USERS, user_id)?;
        let user_id = user_id.to_string();

        let outcome = self
            .transaction(move |tx| {
                let allowed = tx.query(&apps_of(ALLOWED_APPS, &user_id))?;
                if let Some(existing) = allowed
                    .iter()
                    .find(|doc| FocusApp::from_document(doc.id(), &doc.data).name == name)
                {
                    return Ok(AllowAppOutcome::AlreadyAllowed(existing.id().to_string()));
                }

                let is_premium = tx
                    .get(&user_path)?
                    .map(|doc| User::from_document(&user_id, &doc.data).is_premium)
                    .unwrap_or(false);
                let allowance = app_allowance_for(allowed.len(), is_premium);
                if allowance.limit_reached {
                    return Ok(AllowAppOutcome::LimitReached(allowance));
                }

                let unblock = apps_of(BLOCKED_APPS, &user_id).where_eq("name", name.as_str());
                for blocked in tx.query(&unblock)? {
                    tx.delete(&blocked.path)?;
                }
                let fields = crate::fields! {
                    "userId" => user_id.as_str(),
                    "name" => name.as_str(),
                    "createdAt" => tx.now_ms(),
                };
                Ok(AllowAppOutcome::Added(tx.create(ALLOWED_APPS, fields)?.id().to_string()))
            })
            .await
            .inspect_err(|err| log_error!("add_allowed_app failed: {err}"))?;

        match &outcome {
            AllowAppOutcome::Added(id) => log_info!("allowed app {id}"),
            AllowAppOutcome::LimitReached(allowance) => {
                log_info!("allowed app cap reached at {}", allowance.allowed)
            }
            AllowAppOutcome::AlreadyAllowed(_) => {}
        }
        Ok(outcome)
    }

    pub async fn add_blocked_app(&self, user_id: &str, name: &str) -> Result<String, RemoteError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(RemoteError::InvalidPath("app name is empty".into()));
        }
        let user_id = user_id.to_string();
        self.transaction(move |tx| {
            let fields = crate::fields! {
                "userId" => user_id.as_str(),
                "name" => name.as_str(),
                "createdAt" => tx.now_ms(),
            };
            Ok(tx.create(BLOCKED_APPS, fields)?.id().to_string())
        })
        .await
        .inspect_err(|err| log_error!("add_blocked_app failed: {err}"))
    }

    async fn list_apps(&self, collection: &'static str, user_id: &str) -> Vec<FocusApp> {
        let query = apps_of(collection, user_id);
        match self.transaction(move |tx| tx.query(&query)).await {
            Ok(docs) => docs
                .iter()
                .map(|doc| FocusApp::from_document(doc.id(), &doc.data))
                .collect(),
            Err(err) => {
                log_error!("listing {collection} failed: {err}");
                Vec::new()
            }
        }
    }
}
