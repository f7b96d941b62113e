//! QR payloads printed on vaccination cards and drive passes.
//!
//! Doctor cards encode `doctor/{user}/{vaccine}[?dose=N]`, drive passes encode
//! `worker/{user}/{drive}`. Scanners hand over whatever text they read, so the
//! payload may be a bare path or embedded in a longer URL.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

static DOCTOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)doctor/([^/\s?]+)/([^/\s?]+)").expect("static regex"));
static WORKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)worker/([^/\s?]+)/([^/\s?]+)").expect("static regex"));
static MULTI_SLASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"/{2,}").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorScan {
    pub user_id: String,
    pub vaccine_template_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_number: Option<String>,
}

impl DoctorScan {
    /// Portal route the doctor is sent to after scanning.
    pub fn route(&self) -> String {
        let mut r = format!("/doctor/{}/{}", self.user_id, self.vaccine_template_id);
        if let Some(d) = &self.dose_number {
            r.push_str("?dose=");
            r.push_str(&urlencoding::encode(d));
        }
        r
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerScan {
    pub user_id: String,
    pub drive_id: String,
}

// Trim, collapse repeated separators, drop trailing separators.
fn clean(content: &str) -> String {
    let collapsed = MULTI_SLASH.replace_all(content.trim(), "/");
    collapsed.trim_end_matches('/').to_string()
}

pub fn parse_doctor_qr(content: &str) -> AppResult<DoctorScan> {
    let cleaned = clean(content);
    let (path_part, query) = match cleaned.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (cleaned.as_str(), None),
    };
    let dose_number = query.and_then(|q| {
        q.split('&').find_map(|kv| {
            let (k, v) = kv.split_once('=').unwrap_or((kv, ""));
            (k == "dose" && !v.is_empty()).then(|| urlencoding::decode(v).map(|c| c.into_owned()).unwrap_or_else(|_| v.to_string()))
        })
    });
    let caps = DOCTOR_RE.captures(path_part).ok_or_else(|| {
        AppError::user(
            "qr_unrecognized",
            "QR code format not recognized. Please scan a valid vaccine QR code in format doctor/{user-id}/{vaccine-id}?dose={dose_number}",
        )
    })?;
    Ok(DoctorScan { user_id: caps[1].to_string(), vaccine_template_id: caps[2].to_string(), dose_number })
}

pub fn parse_worker_qr(content: &str) -> AppResult<WorkerScan> {
    let cleaned = clean(content);
    let caps = WORKER_RE.captures(&cleaned).ok_or_else(|| {
        AppError::user(
            "qr_unrecognized",
            "QR code format not recognized. Please scan a valid vaccination drive QR code in format worker/{user-id}/{drive-id}",
        )
    })?;
    Ok(WorkerScan { user_id: caps[1].to_string(), drive_id: caps[2].to_string() })
}
