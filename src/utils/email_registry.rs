//! In-memory view of registered account emails.
//!
//! Sign-up asks [`EmailRegistry::is_available`] before touching the `users`
//! table: a cuckoo filter answers "never registered" for most new emails, a
//! moka cache remembers emails known to be taken, and only the remaining
//! cases reach MySQL.

use anyhow::{Context, Result};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use moka::future::Cache;
use sqlx::MySqlPool;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{info, warn};

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;
const TAKEN_CAPACITY: u64 = 500_000;
const TAKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[inline]
pub fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct EmailRegistry {
    filter: RwLock<CuckooFilter<String>>,
    taken: Cache<String, ()>,
}

impl Default for EmailRegistry {
    fn default() -> Self {
        Self::new(FILTER_CAPACITY, TAKEN_CAPACITY, TAKEN_TTL)
    }
}

impl EmailRegistry {
    pub fn new(filter_capacity: usize, taken_capacity: u64, taken_ttl: Duration) -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(filter_capacity, FALSE_POSITIVE_RATE)),
            taken: Cache::builder()
                .max_capacity(taken_capacity)
                .time_to_live(taken_ttl)
                .build(),
        }
    }

    /// False positives possible. A poisoned lock answers "maybe".
    fn might_exist(&self, email: &str) -> bool {
        match self.filter.read() {
            Ok(filter) => filter.contains(email),
            Err(_) => {
                warn!("Email filter lock poisoned");
                true
            }
        }
    }

    fn add_to_filter<'a>(&self, emails: impl IntoIterator<Item = &'a String>) {
        let mut filter = match self.filter.write() {
            Ok(filter) => filter,
            Err(poisoned) => poisoned.into_inner(),
        };
        for email in emails {
            filter.add(email);
        }
    }

    /// Records a freshly created account.
    pub async fn record(&self, email: &str) {
        let email = normalize(email);
        self.add_to_filter([&email]);
        self.taken.insert(email, ()).await;
    }

    /// `true` when no account uses `email`. Database errors count as taken.
    pub async fn is_available(&self, email: &str, pool: &MySqlPool) -> bool {
        let email = normalize(email);

        if !self.might_exist(&email) {
            return true;
        }
        if self.taken.contains_key(&email) {
            return false;
        }

        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(&email)
            .fetch_one(pool)
            .await
            .map(|n| n > 0)
            .unwrap_or(true);

        if exists {
            self.taken.insert(email, ()).await;
        }
        !exists
    }

    /// Streams every account email into the filter in batches; accounts that
    /// signed in within `recent_days` also go into the taken cache.
    pub async fn warm_up(&self, pool: &MySqlPool, batch_size: usize, recent_days: u32) -> Result<()> {
        let mut stream = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT email,
                   (last_login_at IS NOT NULL AND last_login_at >= NOW() - INTERVAL ? DAY) AS recent
            FROM users
            "#,
        )
        .bind(recent_days)
        .fetch(pool);

        let batch_size = batch_size.max(1);
        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;
        let mut recent = 0usize;

        while let Some(row) = stream.next().await {
            let (email, is_recent) = row.context("Failed to read account email")?;
            let email = normalize(&email);
            if is_recent != 0 {
                self.taken.insert(email.clone(), ()).await;
                recent += 1;
            }
            batch.push(email);
            total += 1;

            if batch.len() == batch_size {
                self.add_to_filter(&batch);
                batch.clear();
            }
        }
        self.add_to_filter(&batch);

        info!(total, recent, "Email registry warm-up complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::mysql::MySqlPoolOptions;

    // never connects: every assertion below is answered from memory
    fn lazy_pool() -> MySqlPool {
        MySqlPoolOptions::new()
            .connect_lazy("mysql://localhost/hr_portal_test")
            .unwrap()
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Jane.Doe@Example.COM "), "jane.doe@example.com");
    }

    #[actix_web::test]
    async fn unknown_email_is_available_without_a_query() {
        let registry = EmailRegistry::default();
        assert!(registry.is_available("new.hire@example.com", &lazy_pool()).await);
    }

    #[actix_web::test]
    async fn recorded_email_is_taken_regardless_of_case() {
        let registry = EmailRegistry::default();
        registry.record("Jane.Doe@Example.com").await;

        assert!(registry.might_exist("jane.doe@example.com"));
        assert!(!registry.is_available("  JANE.DOE@example.com", &lazy_pool()).await);
    }
}
