use std::sync::Arc;

use async_std::channel::Receiver;
use async_std::future;

use crate::error::LocationError;
use crate::location::{ now_ms, GpsSample, LocationProvider, PermissionStatus, PositionOptions, PositionUpdate, WatchId, WatchOptions };

/// Permission-gated access to the device location capability. Holds at most
/// one watch subscription at a time.
pub struct LocationSampler {
    provider: Arc<dyn LocationProvider>,
    watch: Option<WatchId>,
}

impl LocationSampler {
    pub fn new(provider: Arc<dyn LocationProvider>) -> LocationSampler {
        LocationSampler { provider, watch: None }
    }

    pub async fn request_permission(&self) -> PermissionStatus {
        let status = self.provider.request_permission().await;
        if !status.is_granted() {
            warn!["Location permission is {}", status];
        }
        status
    }

    pub async fn get_current_sample(&self, options: &PositionOptions) -> Result<GpsSample, LocationError> {
        let sample = future::timeout(options.timeout, self.provider.current_position(options))
            .await
            .map_err(|_| LocationError::Timeout(options.timeout))??;

        let age = sample.age_at(now_ms());
        if age > options.maximum_age {
            return Err(LocationError::PositionUnavailable(format![
                "last fix is {:.1}s old, maximum is {:.1}s",
                age.as_secs_f64(),
                options.maximum_age.as_secs_f64()
            ]));
        }

        Ok(sample)
    }

    /// Starts a subscription, replacing any previous one.
    pub fn start_watching(&mut self, options: &WatchOptions) -> Result<Receiver<PositionUpdate>, LocationError> {
        self.stop_watching();

        let watch = self.provider.watch_position(options)?;
        debug!["Watching location as {:?} with {:?}", watch.id, options];
        self.watch = Some(watch.id);

        Ok(watch.updates)
    }

    pub fn stop_watching(&mut self) {
        if let Some(id) = self.watch.take() {
            debug!["Clearing location watch {:?}", id];
            self.provider.clear_watch(id);
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }
}

impl Drop for LocationSampler {
    fn drop(&mut self) {
        self.stop_watching();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::SimulatedProvider;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[async_std::test]
    async fn denied_permission_is_reported_not_thrown() {
        let provider = Arc::new(SimulatedProvider::new(PermissionStatus::Denied));
        let sampler = LocationSampler::new(provider);

        assert_eq!(PermissionStatus::Denied, sampler.request_permission().await);
        assert_eq!(
            Err(LocationError::PermissionDenied(PermissionStatus::Denied)),
            sampler.get_current_sample(&PositionOptions::default()).await
        );
    }

    #[async_std::test]
    async fn one_shot_returns_last_fix() {
        let provider = Arc::new(SimulatedProvider::granted());
        let fix = GpsSample::new(47.58, 19.25, now_ms());
        provider.push_fix(fix.clone());

        let sampler = LocationSampler::new(provider);
        assert_eq!(Ok(fix), sampler.get_current_sample(&PositionOptions::default()).await);
    }

    #[async_std::test]
    async fn one_shot_without_fix_is_unavailable() {
        let sampler = LocationSampler::new(Arc::new(SimulatedProvider::granted()));
        match sampler.get_current_sample(&PositionOptions::default()).await {
            Err(LocationError::PositionUnavailable(_)) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[async_std::test]
    async fn one_shot_rejects_stale_fix() {
        let provider = Arc::new(SimulatedProvider::granted());
        provider.push_fix(GpsSample::new(47.58, 19.25, now_ms() - 60_000));

        let sampler = LocationSampler::new(provider);
        let options = PositionOptions {
            maximum_age: Duration::from_secs(10),
            ..PositionOptions::default()
        };
        match sampler.get_current_sample(&options).await {
            Err(LocationError::PositionUnavailable(reason)) => assert!(reason.contains("old")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[async_std::test]
    async fn one_shot_times_out() {
        let provider = Arc::new(SimulatedProvider::granted().with_fix_latency(Duration::from_millis(500)));
        provider.push_fix(GpsSample::new(47.58, 19.25, now_ms()));

        let sampler = LocationSampler::new(provider);
        let options = PositionOptions {
            timeout: Duration::from_millis(20),
            ..PositionOptions::default()
        };
        assert_eq!(
            Err(LocationError::Timeout(Duration::from_millis(20))),
            sampler.get_current_sample(&options).await
        );
    }

    #[async_std::test]
    async fn restarting_a_watch_replaces_the_previous_one() {
        let provider = Arc::new(SimulatedProvider::granted());
        let mut sampler = LocationSampler::new(provider.clone());

        let first = sampler.start_watching(&WatchOptions::racing()).unwrap();
        let second = sampler.start_watching(&WatchOptions::racing()).unwrap();
        assert_eq!(1, provider.active_watches());

        provider.push_fix(GpsSample::new(47.58, 19.25, 1_000));
        assert!(first.recv().await.is_err());
        assert_eq!(Ok(GpsSample::new(47.58, 19.25, 1_000)), second.recv().await.unwrap());
    }

    #[async_std::test]
    async fn errors_travel_on_the_watch_channel() {
        let provider = Arc::new(SimulatedProvider::granted());
        let mut sampler = LocationSampler::new(provider.clone());
        let updates = sampler.start_watching(&WatchOptions::racing()).unwrap();

        provider.push_error(LocationError::PositionUnavailable("tunnel".to_string()));
        provider.push_fix(GpsSample::new(47.58, 19.25, 1_000));

        assert_eq!(
            Err(LocationError::PositionUnavailable("tunnel".to_string())),
            updates.recv().await.unwrap()
        );
        assert!(updates.recv().await.unwrap().is_ok());
        assert!(sampler.is_watching());
    }

    #[async_std::test]
    async fn dropping_the_sampler_clears_its_watch() {
        let provider = Arc::new(SimulatedProvider::granted());
        {
            let mut sampler = LocationSampler::new(provider.clone());
            let _updates = sampler.start_watching(&WatchOptions::racing()).unwrap();
            assert_eq!(1, provider.active_watches());
        }
        assert_eq!(0, provider.active_watches());
    }
}
