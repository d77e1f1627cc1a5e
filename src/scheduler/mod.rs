//! Stateful policy engine that chooses the next track to play.
//!
//! `SchedulerService::next` is the single entry point; it dispatches to the
//! rotation or mood policy based on the `programming_mode` config value and
//! is logically serialized against itself via the store's transactions (no
//! in-process lock is held across the two policy implementations).

pub mod mood;
pub mod rotation;

use anyhow::Result;
use tracing::info;

use crate::database::Database;
use crate::models::{ProgrammingMode, Track};

#[derive(Clone)]
pub struct SchedulerService {
    database: Database,
}

impl SchedulerService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Select the next track per the active policy. Returns `Ok(None)` iff
    /// no track currently has status `ready` — this is not an error.
    pub async fn next(&self) -> Result<Option<Track>> {
        let mode = self.database.programming_mode().await?;
        info!(mode = mode.as_str(), "scheduler: selecting next track");

        let picked = match mode {
            ProgrammingMode::Rotation => rotation::pick(&self.database).await?,
            ProgrammingMode::Mood => mood::pick(&self.database).await?,
        };

        match &picked {
            Some(track) => info!(track_id = %track.id, submitter = %track.submitter, "scheduler: picked track"),
            None => info!("scheduler: no ready track available"),
        }

        Ok(picked)
    }
}
