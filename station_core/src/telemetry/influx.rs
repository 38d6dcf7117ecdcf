//! InfluxDB v2 remote sink over HTTP line protocol.
use super::{FieldValue, Point, RemoteSink, TelemetrySink};
use crate::config::InfluxTarget;
use crate::error::SinkError;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

pub struct InfluxSink {
    client: Client,
    write_url: reqwest::Url,
    ping_url: String,
    token: String,
    station_id: String,
    ping_timeout: Duration,
}

impl InfluxSink {
    pub fn new(target: &InfluxTarget) -> Result<Self, SinkError> {
        let base = target.url.trim_end_matches('/');
        let write_url = reqwest::Url::parse_with_params(
            &format!("{base}/api/v2/write"),
            &[
                ("org", target.org.as_str()),
                ("bucket", target.bucket.as_str()),
                ("precision", "ns"),
            ],
        )
        .map_err(|e| SinkError::Transport(format!("invalid influxdb url {base}: {e}")))?;
        let client = Client::builder()
            .timeout(target.timeout)
            .build()
            .map_err(|e| SinkError::Transport(format!("http client: {e}")))?;
        Ok(Self {
            client,
            write_url,
            ping_url: format!("{base}/ping"),
            token: target.token.clone(),
            station_id: target.station_id.clone(),
            ping_timeout: target.ping_timeout,
        })
    }
}

fn classify(e: &reqwest::Error) -> SinkError {
    if e.is_connect() || e.is_timeout() {
        SinkError::Unreachable
    } else {
        SinkError::Transport(e.to_string())
    }
}

impl TelemetrySink for InfluxSink {
    fn record(&mut self, point: &Point) -> Result<(), SinkError> {
        self.write_batch(std::slice::from_ref(point))
    }
}

impl RemoteSink for InfluxSink {
    fn is_reachable(&mut self) -> bool {
        match self
            .client
            .get(&self.ping_url)
            .timeout(self.ping_timeout)
            .send()
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "influxdb ping failed");
                false
            }
        }
    }

    fn write_batch(&mut self, points: &[Point]) -> Result<(), SinkError> {
        if points.is_empty() {
            return Ok(());
        }
        let body = points
            .iter()
            .map(|p| line_protocol(p, &self.station_id))
            .collect::<Vec<_>>()
            .join("\n");
        let resp = self
            .client
            .post(self.write_url.clone())
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .map_err(|e| classify(&e))?;
        let status = resp.status();
        if status.is_success() {
            tracing::debug!(points = points.len(), "influxdb write acknowledged");
            return Ok(());
        }
        let body = resp.text().unwrap_or_default();
        tracing::warn!(status = status.as_u16(), %body, "influxdb rejected write");
        Err(SinkError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// `<Category>,station=<id> <field>=<value> <unix_ns>`
pub fn line_protocol(point: &Point, station_id: &str) -> String {
    let ns = point.timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX);
    format!(
        "{},station={} {}={} {ns}",
        point.category.as_str(),
        escape_key(station_id),
        escape_key(&point.field_id),
        field_value(&point.value)
    )
}

fn field_value(v: &FieldValue) -> String {
    match v {
        FieldValue::Int(i) => format!("{i}i"),
        FieldValue::Float(f) => format!("{f}"),
        FieldValue::Text(s) => {
            let mut out = String::with_capacity(s.len() + 2);
            out.push('"');
            for c in s.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
            out
        }
    }
}

fn escape_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Category;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn at() -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 5).unwrap()
    }

    #[rstest]
    #[case(FieldValue::Int(42), "42i")]
    #[case(FieldValue::Float(42.5), "42.5")]
    #[case(FieldValue::Float(-1.0), "-1")]
    #[case(FieldValue::Text(r#"say "hi" \o/"#.into()), r#""say \"hi\" \\o/""#)]
    fn encodes_field_values(#[case] v: FieldValue, #[case] expected: &str) {
        assert_eq!(field_value(&v), expected);
    }

    #[test]
    fn formats_full_line() {
        let p = Point::new(Category::Weight, "weight_g", 12.25, at());
        assert_eq!(
            line_protocol(&p, "S1"),
            "Weight,station=S1 weight_g=12.25 1700000000000000005"
        );
    }

    #[test]
    fn escapes_tag_values() {
        let p = Point::new(Category::Error, "error_message", "x", at());
        assert!(line_protocol(&p, "a b,c").starts_with(r"Error,station=a\ b\,c "));
    }
}
