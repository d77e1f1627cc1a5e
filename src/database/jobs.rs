use anyhow::Result;
use chrono::Utc;

use super::Database;

impl Database {
    pub async fn set_job_processing(&self, job_id: i64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE jobs SET status = 'processing', started_at = ? WHERE id = ?")
            .bind(&now)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_job_done(&self, job_id: i64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE jobs SET status = 'done', finished_at = ? WHERE id = ?")
            .bind(&now)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_job_failed(&self, job_id: i64, error_msg: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE jobs SET status = 'failed', finished_at = ?, error_msg = ? WHERE id = ?",
        )
        .bind(&now)
        .bind(error_msg)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
