use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::AuthConfig;
use crate::mailer::Mailer;
use crate::sessions::LoginSession;
use crate::storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, LoginSession>>>,
    pub storage: Arc<dyn Storage>,
    pub mailer: Arc<dyn Mailer>,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, mailer: Arc<dyn Mailer>, auth: AuthConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            storage,
            mailer,
            auth: Arc::new(auth),
        }
    }
}
