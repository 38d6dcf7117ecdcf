use chrono::{TimeZone, Utc};
use station_core::{Category, InfluxSink, InfluxTarget, Point, RemoteSink, SinkError};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;
use std::time::Duration;

fn target(url: String) -> InfluxTarget {
    InfluxTarget {
        url,
        token: "secret".into(),
        org: "acme".into(),
        bucket: "plants".into(),
        station_id: "S1".into(),
        timeout: Duration::from_secs(5),
        ping_timeout: Duration::from_secs(2),
    }
}

/// Accept one connection, answer with `response`, return the raw request.
fn serve_once(response: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let head_end = loop {
            let n = stream.read(&mut chunk).unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
        let len = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse::<usize>().unwrap())
            .unwrap_or(0);
        while buf.len() < head_end + len {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        stream.write_all(response.as_bytes()).unwrap();
        String::from_utf8(buf).unwrap()
    });
    (url, handle)
}

const NO_CONTENT: &str = "HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

fn point(field: &str, value: f64, ns: u32) -> Point {
    Point::new(
        Category::Weight,
        field,
        value,
        Utc.timestamp_opt(1_700_000_000, ns).unwrap(),
    )
}

#[test]
fn batch_is_posted_as_line_protocol() {
    let (url, server) = serve_once(NO_CONTENT);
    let mut sink = InfluxSink::new(&target(url)).unwrap();
    sink.write_batch(&[point("weight", 1000.0, 1), point("weight_g", 12.5, 2)])
        .unwrap();

    let request = server.join().unwrap();
    let (head, body) = request.split_once("\r\n\r\n").unwrap();
    assert!(
        head.starts_with("POST /api/v2/write?org=acme&bucket=plants&precision=ns HTTP/1.1"),
        "{head}"
    );
    assert!(head.to_ascii_lowercase().contains("authorization: token secret"));
    assert_eq!(
        body,
        "Weight,station=S1 weight=1000 1700000000000000001\n\
         Weight,station=S1 weight_g=12.5 1700000000000000002"
    );
}

#[test]
fn error_status_is_reported_as_rejection() {
    let (url, server) = serve_once(
        "HTTP/1.1 400 Bad Request\r\nContent-Length: 11\r\nConnection: close\r\n\r\nbad payload",
    );
    let mut sink = InfluxSink::new(&target(url)).unwrap();
    let err = sink.write_batch(&[point("weight", 1.0, 0)]).unwrap_err();
    server.join().unwrap();
    assert_eq!(
        err,
        SinkError::Rejected {
            status: 400,
            body: "bad payload".into()
        }
    );
}

#[test]
fn ping_reports_reachability() {
    let (url, server) = serve_once(NO_CONTENT);
    let mut sink = InfluxSink::new(&target(url)).unwrap();
    assert!(sink.is_reachable());
    let request = server.join().unwrap();
    assert!(request.starts_with("GET /ping HTTP/1.1"));
}

#[test]
fn closed_port_is_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut sink = InfluxSink::new(&target(url)).unwrap();
    assert!(!sink.is_reachable());
    assert_eq!(
        sink.write_batch(&[point("weight", 1.0, 0)]).unwrap_err(),
        SinkError::Unreachable
    );
}

#[test]
fn empty_batch_sends_nothing() {
    let mut sink = InfluxSink::new(&target("http://127.0.0.1:9".into())).unwrap();
    assert!(sink.write_batch(&[]).is_ok());
}
