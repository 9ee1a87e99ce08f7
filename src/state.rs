use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::auth::repo::{PgUserRepo, UserRepo};
use crate::config::AppConfig;
use crate::mail::{Mailer, NotificationQueue, ResendMailer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub mailer: Arc<dyn Mailer>,
    pub notifications: NotificationQueue,
}

impl AppState {
    /// Connect to the database and mail provider. Returns the pool as well so
    /// the caller can run migrations on it.
    pub async fn init() -> anyhow::Result<(Self, PgPool)> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let users = Arc::new(PgUserRepo::new(db.clone())) as Arc<dyn UserRepo>;
        let mailer = Arc::new(ResendMailer::new(&config.mail)?) as Arc<dyn Mailer>;

        Ok((Self::from_parts(config, users, mailer), db))
    }

    /// Must be called inside a tokio runtime; spawns the notification task.
    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let notifications = NotificationQueue::spawn(mailer.clone());
        Self {
            config,
            users,
            mailer,
            notifications,
        }
    }
}
