mod edit;
mod helpers;
mod reorder;
mod view;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use platter_core::api::MealPlanApi;
use platter_core::cache::{PlanCacheStore, lock};
use platter_core::error::{Reporter, SyncError};
use platter_core::models::MealPlanDay;
use platter_core::session::{PlanSession, settle};
use platter_core::window::SlidingWindowController;

use crate::config::Config;

pub(crate) use edit::{cmd_amount, cmd_clear, cmd_duplicate, cmd_eat, cmd_remove};
pub(crate) use reorder::{DropEdge, cmd_move};
pub(crate) use view::{cmd_show, cmd_window};

/// A mounted viewing window plus an editing session over the same store.
pub(crate) struct Workspace {
    pub controller: SlidingWindowController,
    pub session: PlanSession,
    notices: UnboundedReceiver<SyncError>,
}

impl Workspace {
    /// Build the store around `date` and run the initial range load.
    pub(crate) async fn open(
        config: &Config,
        api: Arc<dyn MealPlanApi>,
        date: NaiveDate,
    ) -> Result<Self> {
        let store = PlanCacheStore::new(config.window_size, date)?.into_shared();
        let (reporter, notices) = Reporter::channel();
        let mut controller = SlidingWindowController::new(
            store.clone(),
            api.clone(),
            &config.user_id,
            reporter.clone(),
        );
        let session = PlanSession::new(store, api, reporter, config.auto_deduct);

        controller.mount(date).await?;
        Ok(Self {
            controller,
            session,
            notices,
        })
    }

    pub(crate) fn day(&self, date: NaiveDate) -> Option<MealPlanDay> {
        lock(self.session.store()).latest(date)
    }

    /// Load `date` if it has never been fetched, e.g. the far side of a
    /// cross-day move.
    pub(crate) async fn ensure_loaded(&self, date: NaiveDate) -> Result<()> {
        let known = lock(self.session.store()).cached(date).is_some();
        if !known {
            self.controller.prefetch(date).await?;
        }
        Ok(())
    }

    /// Wait for background saves and fail if any of them, or anything
    /// reported earlier, went wrong.
    pub(crate) async fn finish(&mut self, tasks: Vec<JoinHandle<()>>) -> Result<()> {
        settle(tasks).await;
        let mut failures = Vec::new();
        while let Ok(err) = self.notices.try_recv() {
            failures.push(err.to_string());
        }
        if !failures.is_empty() {
            let diverged = self.session.diverged_dates();
            if !diverged.is_empty() {
                eprintln!(
                    "Unsaved changes for: {}",
                    diverged
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            bail!("{}", failures.join("; "));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::demo_api;
    use platter_core::models::MealSlot;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[tokio::test]
    async fn test_open_mounts_window() {
        let api = Arc::new(demo_api(today()));
        let ws = Workspace::open(&Config::default(), api, today()).await.unwrap();
        assert!(ws.controller.is_mounted());
        assert_eq!(ws.controller.selected_date(), today());
        assert_eq!(ws.day(today()).unwrap().slots.dinner.len(), 3);
        assert!(ws.day(today() + chrono::Duration::days(3)).is_none());
    }

    #[tokio::test]
    async fn test_open_fails_when_backend_down() {
        let api = Arc::new(demo_api(today()));
        api.set_fail_fetch(true);
        assert!(Workspace::open(&Config::default(), api, today()).await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_loaded_outside_window() {
        let api = Arc::new(demo_api(today()));
        let ws = Workspace::open(&Config::default(), api.clone(), today()).await.unwrap();
        let far = today() + chrono::Duration::days(20);
        ws.ensure_loaded(far).await.unwrap();
        ws.ensure_loaded(far).await.unwrap();
        assert_eq!(
            api.single_calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn test_finish_reports_failed_save() {
        let api = Arc::new(demo_api(today()));
        let mut ws = Workspace::open(&Config::default(), api.clone(), today()).await.unwrap();
        api.set_fail_persist(true);
        let tasks = ws.session.clear_slot(today(), MealSlot::Lunch);
        let err = ws.finish(tasks).await.unwrap_err();
        assert!(err.to_string().contains("Failed to save"));
        assert!(ws.day(today()).unwrap().slots.lunch.is_empty());
    }
}
