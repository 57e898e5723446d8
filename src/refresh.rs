use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::RefreshError;
use crate::loader::{load_all, LoadPolicy, Source};
use crate::logging::log_refresh;
use crate::state::DashboardData;
use crate::view::DashboardView;

/// Owns the current snapshot and runs load cycles against one source.
///
/// At most one cycle runs at a time. A failed cycle leaves the previous
/// snapshot in place.
pub struct Dashboard {
    source: Box<dyn Source>,
    policy: LoadPolicy,
    scale_max: f64,
    current: RwLock<Option<Arc<DashboardData>>>,
    in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Dashboard {
    pub fn new(source: Box<dyn Source>, policy: LoadPolicy, scale_max: f64) -> Self {
        Self {
            source,
            policy,
            scale_max,
            current: RwLock::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn source_name(&self) -> String {
        self.source.describe()
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn refresh(&self) -> Result<Arc<DashboardData>, RefreshError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log_refresh("rejected_in_flight", 0, Some("refresh already running"));
            return Err(RefreshError::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        match load_all(self.source.as_ref(), &self.policy).await {
            Ok(data) => {
                let data = Arc::new(data);
                let mut slot = self.current.write().unwrap_or_else(|e| e.into_inner());
                *slot = Some(data.clone());
                log_refresh("swapped", data.total_rows(), None);
                Ok(data)
            }
            Err(err) => {
                let kept = self.snapshot().map(|d| d.total_rows()).unwrap_or(0);
                log_refresh("kept_previous", kept, Some(&err.to_string()));
                Err(err.into())
            }
        }
    }

    pub fn snapshot(&self) -> Option<Arc<DashboardData>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn view(&self) -> Option<DashboardView> {
        self.snapshot()
            .map(|data| DashboardView::build(&data, self.scale_max))
    }
}
