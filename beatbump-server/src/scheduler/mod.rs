//! Scheduler: drains group and song work queues at configured concurrency
//! and cadence (spec §4.7).
//!
//! Two-tier per tick: fully drain pending groups (population), then claim
//! and dispatch pending songs through a `C=1` semaphore with a randomized
//! post-dispatch jitter sleep. The source has a second, single-tier
//! scheduler variant; this spec treats it as legacy (spec §9) and this is
//! the only implementation.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::database::models::{GroupTaskStatus, SongTaskStatus};
use crate::database::{GroupTaskRepository, SongTaskRepository};
use crate::pipeline::AcquisitionPipeline;
use crate::populator::GroupPopulator;

const TICK_INTERVAL: Duration = Duration::from_secs(5);
const SONG_CONCURRENCY: usize = 1;
const JITTER_MAX_SECS: u64 = 8;

pub struct Scheduler {
    group_repo: Arc<dyn GroupTaskRepository>,
    song_repo: Arc<dyn SongTaskRepository>,
    populator: Arc<GroupPopulator>,
    pipeline: Arc<AcquisitionPipeline>,
}

impl Scheduler {
    pub fn new(
        group_repo: Arc<dyn GroupTaskRepository>,
        song_repo: Arc<dyn SongTaskRepository>,
        populator: Arc<GroupPopulator>,
        pipeline: Arc<AcquisitionPipeline>,
    ) -> Self {
        Self { group_repo, song_repo, populator, pipeline }
    }

    /// Spawns the scheduler as a single long-lived background task. Returns
    /// immediately; the returned handle is joined on shutdown.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("scheduler shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_tick(cancel.clone()).await;
                    }
                }
            }
        })
    }

    async fn run_tick(&self, cancel: CancellationToken) {
        self.drain_group_phase().await;
        self.drain_song_phase(cancel).await;
    }

    async fn drain_group_phase(&self) {
        loop {
            let group = match self.group_repo.get_pending_user_group().await {
                Ok(Some(group)) => group,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "failed to query pending group");
                    break;
                }
            };

            if let Err(e) = self.group_repo.update_status(group.id, GroupTaskStatus::Processing).await {
                error!(group_id = group.id, error = %e, "failed to mark group processing");
                break;
            }

            info!(group_id = group.id, r#type = %group.r#type, "populating group");
            if let Err(e) = self.populator.populate(&group).await {
                warn!(group_id = group.id, error = %e, "group population failed");
                let _ = self.group_repo.update_status(group.id, GroupTaskStatus::Failed).await;
            } else {
                let _ = self.group_repo.update_status(group.id, GroupTaskStatus::Pending).await;
            }
        }
    }

    async fn drain_song_phase(&self, cancel: CancellationToken) {
        let songs = match self.song_repo.claim_pending(i64::MAX).await {
            Ok(songs) => songs,
            Err(e) => {
                error!(error = %e, "failed to query pending songs");
                return;
            }
        };
        if songs.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(SONG_CONCURRENCY));
        for song in songs {
            let Ok(_permit) = semaphore.clone().acquire_owned().await else { break };

            let group = match self.group_repo.get(song.group_task_id).await {
                Ok(group) => group,
                Err(e) => {
                    error!(group_id = song.group_task_id, error = %e, "failed to load parent group for song");
                    continue;
                }
            };
            if group.status == GroupTaskStatus::Paused {
                continue;
            }

            self.pipeline.run(&group, &song, cancel.clone()).await;

            if self.song_repo.get(group.id, &song.video_id).await.ok().flatten().map(|s| s.status) == Some(SongTaskStatus::Failed) {
                warn!(group_id = group.id, video_id = %song.video_id, "song task ended failed");
            }

            let jitter = rand::rng().random_range(0..JITTER_MAX_SECS);
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_secs(jitter)) => {}
            }
        }
    }
}
