//! Bounded acquisition of a device location fix.

use std::time::Duration;

use tracing::{debug, warn};

use crate::model::GeoPoint;
use crate::ports::{LocationError, LocationSensor};

/// Default upper bound for waiting on the location sensor.
pub const DEFAULT_LOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Ask `sensor` for a fix and give up after `timeout`.
///
/// There is no retry; callers fall back to manual zone selection.
///
/// # Errors
///
/// Returns the sensor's [`LocationError`], or [`LocationError::Timeout`] when the
/// sensor does not answer in time.
pub async fn acquire(
    sensor: &dyn LocationSensor,
    timeout: Duration,
) -> Result<GeoPoint, LocationError> {
    match tokio::time::timeout(timeout, sensor.current_position()).await {
        Ok(Ok(point)) => {
            debug!(%point, "location fix acquired");
            Ok(point)
        }
        Ok(Err(error)) => {
            warn!(%error, "location sensor failed");
            Err(error)
        }
        Err(_elapsed) => {
            warn!(?timeout, "location sensor did not answer in time");
            Err(LocationError::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::acquire;
    use crate::model::GeoPoint;
    use crate::ports::{LocationError, LocationSensor};

    struct FixedSensor(Result<GeoPoint, LocationError>);

    #[async_trait]
    impl LocationSensor for FixedSensor {
        async fn current_position(&self) -> Result<GeoPoint, LocationError> {
            self.0
        }
    }

    /// A sensor waiting on a permission prompt the user never answers.
    struct SilentSensor;

    #[async_trait]
    impl LocationSensor for SilentSensor {
        async fn current_position(&self) -> Result<GeoPoint, LocationError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn passes_through_sensor_outcomes() {
        let point = GeoPoint::new(-0.4246, 36.9452);
        let timeout = Duration::from_secs(5);

        assert_eq!(acquire(&FixedSensor(Ok(point)), timeout).await, Ok(point));
        assert_eq!(
            acquire(&FixedSensor(Err(LocationError::PermissionDenied)), timeout).await,
            Err(LocationError::PermissionDenied)
        );
        assert_eq!(
            acquire(&FixedSensor(Err(LocationError::PositionUnavailable)), timeout).await,
            Err(LocationError::PositionUnavailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silent_sensor_times_out() {
        let started = tokio::time::Instant::now();
        let result = acquire(&SilentSensor, Duration::from_secs(10)).await;
        assert_eq!(result, Err(LocationError::Timeout));
        assert!(started.elapsed() >= Duration::from_secs(10));
    }
}
