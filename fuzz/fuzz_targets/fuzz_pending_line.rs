#![no_main]
use libfuzzer_sys::fuzz_target;
use station_core::FieldValue;
use station_core::telemetry::local_log::parse_line;

fuzz_target!(|data: &str| {
    // Malformed lines are errors, never panics.
    if let Ok(point) = parse_line(data) {
        let text = point.value.to_log_string();
        let again = FieldValue::from_log_str(point.category, &text);
        if point.value.is_finite() {
            assert_eq!(again, point.value);
        }
    }
});
