// src/compare/http.rs
//! HTTP response comparison
//!
//! Layering, highest precedence first:
//! 1. both bodies carry the generic error marker: the responses are equal
//! 2. raw body bytes are equal, or either body is not JSON: raw equality
//! 3. JSON bodies: structural diff under `/body`
//!
//! Status is compared as a scalar at `/status` and headers as a map under
//! `/headers`, leaving out transport framing headers.

use super::diff::{child_path, diff_values_at};
use super::DiffDetail;
use crate::model::HttpResponse;
use flate2::read::GzDecoder;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use tracing::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Settings for HTTP layering
#[derive(Debug, Clone, Default)]
pub struct HttpCompareOptions {
    pub generic_error_marker: Option<String>,

    /// Lowercased header names left out of header diffs
    pub transport_headers: HashSet<String>,
}

/// Unfiltered differences between two HTTP responses
pub fn diff_responses(
    baseline: &HttpResponse,
    candidate: &HttpResponse,
    options: &HttpCompareOptions,
) -> Vec<DiffDetail> {
    let gzip = declares_gzip(baseline) || declares_gzip(candidate);
    let before = decoded_body(&baseline.body, gzip);
    let after = decoded_body(&candidate.body, gzip);

    if let Some(marker) = options.generic_error_marker.as_deref() {
        if !marker.is_empty() && contains(&before, marker) && contains(&after, marker) {
            debug!("Both responses carry the generic error marker");
            return Vec::new();
        }
    }

    let mut diffs = Vec::new();

    if baseline.status != candidate.status {
        diffs.push(DiffDetail::modify(
            "/status",
            &Value::from(baseline.status),
            &Value::from(candidate.status),
        ));
    }

    diff_headers(baseline, candidate, options, &mut diffs);
    diff_bodies(&before, &after, &mut diffs);

    diffs
}

fn declares_gzip(response: &HttpResponse) -> bool {
    response
        .header("content-encoding")
        .map_or(false, |v| v.to_ascii_lowercase().contains("gzip"))
}

/// Gunzip when gzip is declared and the bytes look gzipped, else the raw bytes
fn decoded_body(body: &[u8], gzip: bool) -> Cow<'_, [u8]> {
    if !gzip || !body.starts_with(&GZIP_MAGIC) {
        return Cow::Borrowed(body);
    }

    let mut decoded = Vec::with_capacity(body.len() * 4);
    match GzDecoder::new(body).read_to_end(&mut decoded) {
        Ok(_) => Cow::Owned(decoded),
        Err(e) => {
            debug!("Gzip decode failed, comparing raw body: {}", e);
            Cow::Borrowed(body)
        }
    }
}

fn contains(body: &[u8], marker: &str) -> bool {
    let needle = marker.as_bytes();
    body.windows(needle.len()).any(|w| w == needle)
}

fn diff_headers(
    baseline: &HttpResponse,
    candidate: &HttpResponse,
    options: &HttpCompareOptions,
    out: &mut Vec<DiffDetail>,
) {
    let normalize = |response: &HttpResponse| -> BTreeMap<String, (String, String)> {
        response
            .headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), (name.clone(), value.clone())))
            .filter(|(key, _)| !options.transport_headers.contains(key))
            .collect()
    };

    let before = normalize(baseline);
    let after = normalize(candidate);

    for (key, (name, value)) in &before {
        let path = child_path("/headers", name);
        match after.get(key) {
            Some((_, other)) if other == value => {}
            Some((_, other)) => out.push(DiffDetail::modify_rendered(path, value, other)),
            None => out.push(DiffDetail::remove(path, &Value::String(value.clone()))),
        }
    }

    for (key, (name, value)) in &after {
        if !before.contains_key(key) {
            out.push(DiffDetail::add(
                child_path("/headers", name),
                &Value::String(value.clone()),
            ));
        }
    }
}

fn diff_bodies(before: &[u8], after: &[u8], out: &mut Vec<DiffDetail>) {
    if before == after {
        return;
    }

    let parsed = (
        serde_json::from_slice::<Value>(before),
        serde_json::from_slice::<Value>(after),
    );

    match parsed {
        (Ok(a), Ok(b)) => out.extend(diff_values_at("/body", &a, &b)),
        _ => {
            debug!("Body is not JSON, falling back to raw equality");
            out.push(DiffDetail::modify_rendered(
                "/body",
                String::from_utf8_lossy(before),
                String::from_utf8_lossy(after),
            ));
        }
    }
}
