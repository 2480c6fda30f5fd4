//! Builders for jobs and photo payloads used across integration tests.

#![allow(dead_code)]

use std::io::Cursor;

use chrono::{DateTime, TimeZone, Utc};
use image::{ImageFormat, Rgb, RgbImage};

use sitecheck::catalog::{bedroom_key, BASE_COMPARE, CORE_GENERAL};
use sitecheck::{JobDraft, UnitType};

pub const WORKER: &str = "w1";
pub const ADMIN: &str = "admin";

/// Fixed start instant for manual clocks.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()
}

/// Pending job assigned to [`WORKER`].
pub fn draft(id: &str) -> JobDraft {
    JobDraft::new(id).assigned_to(WORKER)
}

pub fn draft_with(id: &str, unit_type: UnitType, features: &[&str]) -> JobDraft {
    draft(id).with_unit_type(unit_type).with_features(features)
}

/// Encodes a solid-colour PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([90, 140, 60]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn base_keys() -> Vec<String> {
    BASE_COMPARE.iter().map(|(k, _)| k.to_string()).collect()
}

/// General keys required at completion for a job without optional features.
pub fn general_keys(bedrooms: u8) -> Vec<String> {
    let mut keys: Vec<String> = CORE_GENERAL.iter().map(|(k, _)| k.to_string()).collect();
    keys.extend((1..=bedrooms).map(bedroom_key));
    keys
}
