use std::sync::Arc;

use bidhub_db::Database;

use crate::clock::Clock;
use crate::email::EmailSender;
use crate::images::ImageStore;

pub type AppState = Arc<AppStateInner>;

/// Everything a request handler may touch. Built once at startup from the
/// loaded configuration and passed to the router.
pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Base URL used when building links sent to users.
    pub public_url: String,
    pub clock: Arc<dyn Clock>,
    pub email: Arc<dyn EmailSender>,
    pub images: Arc<dyn ImageStore>,
}
