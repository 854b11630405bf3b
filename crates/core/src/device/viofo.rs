//! Viofo dashcam driver.
//!
//! Viofo cameras expose an HTTP command API of the form
//! `http://<addr>/?custom=1&cmd=<n>` with XML responses, plus plain HTTP
//! download of the recorded files. Recording metadata (lens, mode, locked
//! state, start time) is not carried in the XML but encoded in the file path
//! and name, so most of this module is parsing.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use futures::TryStreamExt;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex_lite::Regex;
use tracing::{debug, warn};

use crate::catalog::{Lens, Recording, RecordingMode};
use crate::config::DeviceConfig;

use super::traits::Dashcam;
use super::types::{DeviceError, DownloadStream};

const CMD_GET_FILE_LIST: u32 = 3015;
const CMD_HEART_BEAT: u32 = 3016;
const CMD_CARD_FREE_SPACE: u32 = 3017;
const CMD_DELETE_ONE_FILE: u32 = 4003;

/// Recording start time is encoded in the file name as `YYYY_MMDD_HHMMSS`.
const NAME_PATTERN: &str = r"^(\d{4})_(\d{2})(\d{2})_(\d{2})(\d{2})(\d{2})";

/// Timestamp format of the catalog `TIME` field.
const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// HTTP driver for Viofo dashcams.
pub struct ViofoCam {
    address: String,
    command_timeout: Duration,
    heartbeat_timeout: Duration,
    client: reqwest::Client,
}

impl ViofoCam {
    /// Creates a driver for the camera at `config.address`.
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            address: config.address.clone(),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
            heartbeat_timeout: Duration::from_millis(config.heartbeat_timeout_ms),
            client: reqwest::Client::new(),
        }
    }

    fn command_url(&self, cmd: u32) -> String {
        format!("http://{}/?custom=1&cmd={}", self.address, cmd)
    }

    async fn run_command(&self, cmd: u32, timeout: Duration) -> Result<String, DeviceError> {
        let response = self
            .client
            .get(self.command_url(cmd))
            .timeout(timeout)
            .send()
            .await
            .map_err(map_transport_error)?
            .error_for_status()
            .map_err(|e| DeviceError::CommandFailed(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| DeviceError::ParseFailed(e.to_string()))
    }
}

#[async_trait]
impl Dashcam for ViofoCam {
    fn name(&self) -> &str {
        "viofo"
    }

    async fn fetch_catalog(&self) -> Result<Vec<Recording>, DeviceError> {
        let body = self
            .run_command(CMD_GET_FILE_LIST, self.command_timeout)
            .await?;
        let raw_files = parse_file_list(&body)?;
        let pattern = name_pattern()?;

        let mut recordings = Vec::with_capacity(raw_files.len());
        for file in &raw_files {
            match parse_recording(file, &pattern) {
                Some(recording) => recordings.push(recording),
                None => {
                    warn!(path = %file.fpath, "skipping catalog entry with unparseable name");
                }
            }
        }
        debug!(
            listed = raw_files.len(),
            parsed = recordings.len(),
            "fetched device catalog"
        );
        Ok(recordings)
    }

    async fn heartbeat(&self) -> Result<u64, DeviceError> {
        let started = Instant::now();
        self.run_command(CMD_HEART_BEAT, self.heartbeat_timeout)
            .await?;
        Ok(started.elapsed().as_millis() as u64)
    }

    async fn free_space(&self) -> Result<String, DeviceError> {
        let body = self
            .run_command(CMD_CARD_FREE_SPACE, self.command_timeout)
            .await?;
        let bytes = parse_value_field(&body)?;
        Ok(format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0)))
    }

    async fn open_stream(&self, recording: &Recording) -> Result<DownloadStream, DeviceError> {
        let url = format!(
            "http://{}{}",
            self.address,
            stream_path(&recording.remote_path)
        );
        debug!(url = %url, "opening download stream");

        // No overall timeout here: a full-length clip over a weak link can
        // legitimately take many minutes. Mid-stream stalls surface as
        // transport errors from the connection itself.
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_transport_error)?
            .error_for_status()
            .map_err(|e| DeviceError::CommandFailed(e.to_string()))?;

        let declared_len = response.content_length();
        let stream = response
            .bytes_stream()
            .map_err(|e| DeviceError::Stream(e.to_string()));

        Ok(DownloadStream {
            declared_len,
            stream: Box::pin(stream),
        })
    }

    async fn delete_recording(&self, recording: &Recording) -> Result<(), DeviceError> {
        let url = format!(
            "http://{}/?custom=1&cmd={}&str={}",
            self.address, CMD_DELETE_ONE_FILE, recording.remote_path
        );
        self.client
            .get(&url)
            .timeout(self.command_timeout)
            .send()
            .await
            .map_err(map_transport_error)?
            .error_for_status()
            .map_err(|e| DeviceError::DeleteFailed(e.to_string()))?;
        debug!(path = %recording.remote_path, "deleted remote recording");
        Ok(())
    }
}

fn map_transport_error(err: reqwest::Error) -> DeviceError {
    if err.is_timeout() {
        DeviceError::Timeout
    } else {
        DeviceError::Unreachable(err.to_string())
    }
}

fn name_pattern() -> Result<Regex, DeviceError> {
    Regex::new(NAME_PATTERN).map_err(|e| DeviceError::ParseFailed(e.to_string()))
}

/// One `<File>` element of the file-list response.
#[derive(Debug, Default, Clone)]
struct RawFile {
    name: String,
    fpath: String,
    size: String,
    time: String,
}

/// Parses the `<LIST><ALLFile><File>...` response of `GET_FILE_LIST`.
fn parse_file_list(xml: &str) -> Result<Vec<RawFile>, DeviceError> {
    #[derive(Clone, Copy)]
    enum Field {
        Name,
        Fpath,
        Size,
        Time,
    }

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut files = Vec::new();
    let mut current: Option<RawFile> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"File" => current = Some(RawFile::default()),
                b"NAME" => field = Some(Field::Name),
                b"FPATH" => field = Some(Field::Fpath),
                b"SIZE" => field = Some(Field::Size),
                b"TIME" => field = Some(Field::Time),
                _ => field = None,
            },
            Ok(Event::Text(t)) => {
                if let (Some(field), Some(file)) = (field, current.as_mut()) {
                    let text = t
                        .unescape()
                        .map_err(|e| DeviceError::ParseFailed(e.to_string()))?
                        .into_owned();
                    match field {
                        Field::Name => file.name = text,
                        Field::Fpath => file.fpath = text,
                        Field::Size => file.size = text,
                        Field::Time => file.time = text,
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"File" {
                    if let Some(file) = current.take() {
                        files.push(file);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DeviceError::ParseFailed(e.to_string())),
            _ => {}
        }
    }

    Ok(files)
}

/// Extracts the numeric `<Value>` field of a command response.
fn parse_value_field(xml: &str) -> Result<u64, DeviceError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut in_value = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => in_value = e.name().as_ref() == b"Value",
            Ok(Event::Text(t)) if in_value => {
                let text = t
                    .unescape()
                    .map_err(|e| DeviceError::ParseFailed(e.to_string()))?;
                return text
                    .trim()
                    .parse()
                    .map_err(|_| DeviceError::ParseFailed(format!("bad Value field: {text}")));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DeviceError::ParseFailed(e.to_string())),
            _ => {}
        }
    }

    Err(DeviceError::ParseFailed(
        "response has no Value field".to_string(),
    ))
}

/// Builds a `Recording` from a raw catalog entry. Returns `None` when the
/// name or path does not follow the Viofo conventions.
fn parse_recording(raw: &RawFile, pattern: &Regex) -> Option<Recording> {
    let caps = pattern.captures(&raw.name)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let date = NaiveDate::from_ymd_opt(field(1)? as i32, field(2)?, field(3)?)?;
    let start_naive = date.and_hms_opt(field(4)?, field(5)?, field(6)?)?;
    let start = Utc.from_utc_datetime(&start_naive);

    // The TIME field holds the timestamp the file was closed at. Older
    // firmwares format it inconsistently; fall back to the start time.
    let end = NaiveDateTime::parse_from_str(&raw.time, TIME_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(start);

    let size_bytes = raw.size.trim().parse().ok()?;
    let lens = parse_lens(&raw.fpath)?;

    Some(Recording {
        remote_path: raw.fpath.clone(),
        name: raw.name.clone(),
        size_bytes,
        start,
        end,
        lens,
        mode: parse_mode(&raw.fpath),
        locked: is_locked(&raw.fpath),
        // The camera only lists files it has finished writing.
        finished: true,
    })
}

/// The lens is the last letter of the file stem: `F`ront, `R`ear, `I`nterior.
fn parse_lens(path: &str) -> Option<Lens> {
    let upper = path.to_ascii_uppercase();
    let (stem, ext) = upper.rsplit_once('.')?;
    if !matches!(ext, "MP4" | "JPG") {
        return None;
    }
    match stem.chars().last()? {
        'F' => Some(Lens::Front),
        'R' => Some(Lens::Rear),
        'I' => Some(Lens::Interior),
        _ => None,
    }
}

/// Parking clips live in a `Parking` directory or carry a `P` lens prefix.
fn parse_mode(path: &str) -> RecordingMode {
    if path.contains("Parking")
        || path.ends_with("PF.MP4")
        || path.ends_with("PR.MP4")
        || path.ends_with("PI.MP4")
    {
        RecordingMode::Parking
    } else {
        RecordingMode::Normal
    }
}

/// Locked (evidence) footage is stored under the `RO` directory.
fn is_locked(path: &str) -> bool {
    path.contains("\\RO\\") || path.contains("/RO/")
}

/// Converts a device path like `A:\DCIM\Movie\x.MP4` into the URL path the
/// camera serves the file at (`/DCIM/Movie/x.MP4`).
fn stream_path(fpath: &str) -> String {
    let normalized = fpath.replace('\\', "/");
    let path = match normalized.split_once(':') {
        Some((_, rest)) => rest,
        None => normalized.as_str(),
    };
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
