//! Append-only local log of values that have not reached the remote sink.
//!
//! One CSV file per category under the pending folder, one record per line:
//! `timestamp,category,field_id,value` with an RFC 3339 timestamp. After a
//! successful replay a file is moved to the archive folder as
//! `<Category>_<%Y-%m-%dT%H-%M-%SZ>.csv`; nothing is ever deleted.
//!
//! The log holds an exclusive `flock` on `<pending>/.station.lock` for its
//! lifetime so two processes never replay the same file.

use super::{Category, FieldValue, Point, TelemetrySink};
use crate::error::SinkError;
use crate::util::FILE_STAMP_FORMAT;
use chrono::{DateTime, SecondsFormat, Utc};
use csv::{ByteRecord, StringRecord};
use station_config::atomic::write_atomic;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".station.lock";

fn io_err(context: &str, path: &Path, e: impl std::fmt::Display) -> SinkError {
    SinkError::Io(format!("{context} {}: {e}", path.display()))
}

#[cfg(unix)]
fn try_lock(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> std::io::Result<()> {
    Ok(())
}

/// Where [`LocalLog::settle`] put the handled lines.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Settled {
    pub archived: Option<PathBuf>,
    pub rejected: Option<PathBuf>,
}

struct Entry {
    raw: Vec<u8>,
    point: Result<Point, String>,
}

fn trim_line(bytes: &[u8]) -> &[u8] {
    let is_eol = |b: &u8| *b == b'\n' || *b == b'\r';
    let start = bytes.iter().position(|b| !is_eol(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !is_eol(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}

pub struct LocalLog {
    pending: PathBuf,
    archive: PathBuf,
    // Released by the OS when the descriptor closes.
    _lock: File,
}

impl std::fmt::Debug for LocalLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalLog")
            .field("pending", &self.pending)
            .field("archive", &self.archive)
            .finish()
    }
}

impl LocalLog {
    pub fn open(pending: &Path, archive: &Path) -> Result<Self, SinkError> {
        fs::create_dir_all(pending).map_err(|e| io_err("create", pending, e))?;
        fs::create_dir_all(archive).map_err(|e| io_err("create", archive, e))?;
        let lock_path = pending.join(LOCK_FILE);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| io_err("open", &lock_path, e))?;
        try_lock(&lock).map_err(|e| {
            SinkError::Io(format!(
                "pending log {} is in use by another process: {e}",
                pending.display()
            ))
        })?;
        tracing::debug!(pending = %pending.display(), archive = %archive.display(), "local log opened");
        Ok(Self {
            pending: pending.to_path_buf(),
            archive: archive.to_path_buf(),
            _lock: lock,
        })
    }

    pub fn path_for(&self, category: Category) -> PathBuf {
        self.pending.join(format!("{}.csv", category.as_str()))
    }

    pub fn append(&mut self, point: &Point) -> Result<(), SinkError> {
        let path = self.path_for(point.category);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_err("open", &path, e))?;
        {
            let mut w = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(&file);
            w.write_record(&to_record(point))
                .map_err(|e| io_err("append", &path, e))?;
            w.flush().map_err(|e| io_err("flush", &path, e))?;
        }
        file.sync_data().map_err(|e| io_err("sync", &path, e))?;
        tracing::debug!(
            category = %point.category,
            field = %point.field_id,
            "value buffered locally"
        );
        Ok(())
    }

    /// Buffered points of `category` in append order. Malformed lines are
    /// skipped here but stay in the file.
    pub fn pending(&self, category: Category) -> Result<Vec<Point>, SinkError> {
        let entries = self.read_entries(category)?;
        let mut points = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.into_iter().enumerate() {
            match entry.point {
                Ok(p) => points.push(p),
                Err(e) => tracing::error!(
                    category = %category,
                    line = idx + 1,
                    error = %e,
                    "skipping malformed pending line"
                ),
            }
        }
        Ok(points)
    }

    /// Number of buffered lines across all categories, malformed ones included.
    pub fn pending_count(&self) -> usize {
        Category::ALL
            .into_iter()
            .map(|c| self.read_entries(c).map(|e| e.len()).unwrap_or(0))
            .sum()
    }

    /// Move the whole pending file of `category` into the archive.
    pub fn archive(
        &mut self,
        category: Category,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<PathBuf>, SinkError> {
        let src = self.path_for(category);
        if !src.exists() {
            return Ok(None);
        }
        let dst = self.archive_path(category, completed_at, "");
        if let Err(e) = fs::rename(&src, &dst) {
            // Different filesystem: copy, then remove the original.
            tracing::debug!(error = %e, "rename failed, copying pending log instead");
            fs::copy(&src, &dst).map_err(|e| io_err("copy", &src, e))?;
            fs::remove_file(&src).map_err(|e| io_err("remove", &src, e))?;
        }
        tracing::info!(category = %category, archive = %dst.display(), "pending log archived");
        Ok(Some(dst))
    }

    /// Take the first `handled` valid points of `category` out of the pending
    /// file. Points whose position (among valid points) is listed in
    /// `rejected` go to a `_rejected` archive file, the others to the regular
    /// archive. Malformed lines and everything after the handled prefix stay
    /// pending, byte for byte.
    pub fn settle(
        &mut self,
        category: Category,
        handled: usize,
        rejected: &[usize],
        completed_at: DateTime<Utc>,
    ) -> Result<Settled, SinkError> {
        if handled == 0 {
            return Ok(Settled::default());
        }
        let entries = self.read_entries(category)?;
        let mut done = Vec::new();
        let mut refused = Vec::new();
        let mut keep = Vec::new();
        let mut valid = 0usize;
        for entry in &entries {
            let target = match entry.point {
                Ok(_) if valid < handled => {
                    let target = if rejected.contains(&valid) {
                        &mut refused
                    } else {
                        &mut done
                    };
                    valid += 1;
                    target
                }
                _ => &mut keep,
            };
            target.extend_from_slice(&entry.raw);
            target.push(b'\n');
        }

        if keep.is_empty() && refused.is_empty() {
            let archived = self.archive(category, completed_at)?;
            return Ok(Settled {
                archived,
                rejected: None,
            });
        }

        let mut settled = Settled::default();
        if !done.is_empty() {
            let dst = self.archive_path(category, completed_at, "");
            write_atomic(&dst, &done).map_err(|e| io_err("write", &dst, e))?;
            settled.archived = Some(dst);
        }
        if !refused.is_empty() {
            let dst = self.archive_path(category, completed_at, "_rejected");
            write_atomic(&dst, &refused).map_err(|e| io_err("write", &dst, e))?;
            tracing::warn!(category = %category, archive = %dst.display(), "rejected values set aside");
            settled.rejected = Some(dst);
        }
        let src = self.path_for(category);
        if keep.is_empty() {
            fs::remove_file(&src).map_err(|e| io_err("remove", &src, e))?;
        } else {
            write_atomic(&src, &keep).map_err(|e| io_err("rewrite", &src, e))?;
        }
        tracing::info!(
            category = %category,
            handled,
            rejected = rejected.len(),
            "pending log settled"
        );
        Ok(settled)
    }

    /// Every line of a pending file with its exact bytes.
    fn read_entries(&self, category: Category) -> Result<Vec<Entry>, SinkError> {
        let path = self.path_for(category);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err("read", &path, e)),
        };
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes.as_slice());
        let mut rec = ByteRecord::new();
        let mut start = 0usize;
        let mut out = Vec::new();
        loop {
            match rdr.read_byte_record(&mut rec) {
                Ok(false) => break,
                Ok(true) => {
                    let offset = |b: u64| usize::try_from(b).unwrap_or(bytes.len()).min(bytes.len());
                    let begin = rec.position().map_or(start, |p| offset(p.byte()));
                    let end = offset(rdr.position().byte()).max(begin);
                    let raw = trim_line(&bytes[begin..end]);
                    start = end;
                    if raw.is_empty() {
                        continue;
                    }
                    let point = StringRecord::from_byte_record(rec.clone())
                        .map_err(|e| format!("not utf-8: {e}"))
                        .and_then(|r| parse_record(&r));
                    out.push(Entry {
                        raw: raw.to_vec(),
                        point,
                    });
                }
                Err(e) => {
                    // Keep whatever is left as one opaque line.
                    tracing::warn!(path = %path.display(), error = %e, "unreadable pending line");
                    let raw = trim_line(&bytes[start.min(bytes.len())..]);
                    if !raw.is_empty() {
                        out.push(Entry {
                            raw: raw.to_vec(),
                            point: Err(e.to_string()),
                        });
                    }
                    break;
                }
            }
        }
        Ok(out)
    }

    fn archive_path(&self, category: Category, completed_at: DateTime<Utc>, tag: &str) -> PathBuf {
        let stamp = completed_at.format(FILE_STAMP_FORMAT);
        let base = format!("{}_{stamp}{tag}", category.as_str());
        let mut candidate = self.archive.join(format!("{base}.csv"));
        let mut n = 1u32;
        while candidate.exists() {
            candidate = self.archive.join(format!("{base}_{n}.csv"));
            n += 1;
        }
        candidate
    }
}

impl TelemetrySink for LocalLog {
    fn record(&mut self, point: &Point) -> Result<(), SinkError> {
        self.append(point)
    }
}

fn to_record(point: &Point) -> [String; 4] {
    [
        point
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Nanos, true),
        point.category.as_str().to_string(),
        point.field_id.clone(),
        point.value.to_log_string(),
    ]
}

/// Parse one CSV record of the pending log.
pub fn parse_record(rec: &StringRecord) -> Result<Point, String> {
    if rec.len() != 4 {
        return Err(format!("expected 4 fields, got {}", rec.len()));
    }
    let timestamp = DateTime::parse_from_rfc3339(&rec[0])
        .map_err(|e| format!("bad timestamp {:?}: {e}", &rec[0]))?
        .with_timezone(&Utc);
    let category: Category = rec[1].parse()?;
    if rec[2].is_empty() {
        return Err("empty field id".to_string());
    }
    Ok(Point {
        category,
        field_id: rec[2].to_string(),
        value: FieldValue::from_log_str(category, &rec[3]),
        timestamp,
    })
}

/// Parse a single pending-log line.
pub fn parse_line(line: &str) -> Result<Point, String> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let rec = rdr
        .records()
        .next()
        .ok_or_else(|| "empty line".to_string())?
        .map_err(|e| e.to_string())?;
    parse_record(&rec)
}
