//! TLS certificate flattening.

use serde::Serialize;
use serde_json::{Number, Value};

use super::normalize::clean_value;
use super::raw::RawCertInfo;
use super::sentinel::or_dash;

/// How close a certificate is to expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryStatus {
    Expired,
    Critical,
    Warning,
    Ok,
}

impl ExpiryStatus {
    pub fn from_days(days: f64) -> Self {
        if days <= 0.0 {
            ExpiryStatus::Expired
        } else if days <= 7.0 {
            ExpiryStatus::Critical
        } else if days <= 30.0 {
            ExpiryStatus::Warning
        } else {
            ExpiryStatus::Ok
        }
    }
}

/// Flat certificate record.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateInfo {
    #[serde(serialize_with = "or_dash")]
    pub valid: Option<bool>,
    #[serde(serialize_with = "or_dash")]
    pub subject_cn: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub subject_c: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub subject_st: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub subject_l: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub subject_o: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub issuer_cn: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub issuer_c: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub issuer_o: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub subject_alt_name: Option<String>,
    pub info_access: Value,
    #[serde(serialize_with = "or_dash")]
    pub valid_from: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub valid_to: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub days_remaining: Option<Number>,
    #[serde(serialize_with = "or_dash")]
    pub fingerprint: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub serial_number: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub signature_algorithm: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub expiry_status: Option<ExpiryStatus>,
}

impl CertificateInfo {
    /// Flatten raw certificate data. A monitor without certificate data
    /// yields a record whose every field is missing.
    pub fn from_raw(raw: Option<&RawCertInfo>) -> Self {
        let empty = RawCertInfo::default();
        let raw = raw.unwrap_or(&empty);
        let details = &raw.details;

        Self {
            valid: raw.valid,
            subject_cn: details.subject.common_name.clone(),
            subject_c: details.subject.country.clone(),
            subject_st: details.subject.state.clone(),
            subject_l: details.subject.locality.clone(),
            subject_o: details.subject.organization.clone(),
            issuer_cn: details.issuer.common_name.clone(),
            issuer_c: details.issuer.country.clone(),
            issuer_o: details.issuer.organization.clone(),
            subject_alt_name: details.subjectaltname.clone(),
            info_access: clean_value(&details.info_access),
            valid_from: raw.valid_from.clone(),
            valid_to: raw.valid_to.clone(),
            days_remaining: raw.days_remaining.clone(),
            fingerprint: details.fingerprint.clone(),
            serial_number: details.serial_number.clone(),
            signature_algorithm: details.signature_algorithm.clone(),
            expiry_status: raw
                .days_remaining
                .as_ref()
                .and_then(Number::as_f64)
                .map(ExpiryStatus::from_days),
        }
    }
}
