//! Maps `Box<dyn Error>` from the load-cell boundary to a typed `SensorError`.
//!
//! The traits in `station_traits` use `Box<dyn Error + Send + Sync>`; with the
//! `hardware-errors` feature `station_hardware::HwError` is downcast precisely,
//! otherwise the message is inspected.

use crate::error::SensorError;

pub fn map_sensor_error(e: &(dyn std::error::Error + 'static)) -> SensorError {
    #[cfg(feature = "hardware-errors")]
    {
        use station_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::NotReady | HwError::DataReadyTimeout => SensorError::NotReady,
                other => SensorError::Fault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("not ready") || lower.contains("timeout") {
        SensorError::NotReady
    } else {
        SensorError::Fault(s)
    }
}
