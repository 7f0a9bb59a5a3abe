//! Field-level checks shared by resource attribute types and state backends.

use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type FieldResult = Result<(), FieldError>;

static RESOURCE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_-]*$").expect("Invalid resource name regex")
});

static S3_BUCKET_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("Invalid bucket regex")
});

static AWS_REGION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]{2}(-gov)?-[a-z]+-\d+$").expect("Invalid region regex")
});

static DOMAIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\*\.)?([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,63}\.?$")
        .expect("Invalid domain regex")
});

static ARN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^arn:aws[a-z-]*:[a-z0-9-]+:[a-z0-9-]*:(\d{12})?:.+$").expect("Invalid ARN regex")
});

static HEX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]+$").expect("Invalid hex regex"));

/// Terraform block labels: letters, digits, underscores and dashes, not
/// starting with a digit or dash.
pub fn resource_name(name: &str) -> FieldResult {
    if RESOURCE_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(FieldError::new(
            "name",
            format!("'{}' is not a valid Terraform resource name", name),
        ))
    }
}

pub fn not_blank(field: &str, value: &str) -> FieldResult {
    if value.trim().is_empty() {
        Err(FieldError::new(field, "must not be empty"))
    } else {
        Ok(())
    }
}

pub fn non_empty<T>(field: &str, values: &[T]) -> FieldResult {
    if values.is_empty() {
        Err(FieldError::new(field, "must contain at least one entry"))
    } else {
        Ok(())
    }
}

/// Values carrying a Terraform interpolation are only known at apply time.
pub fn is_interpolated(value: &str) -> bool {
    value.contains("${")
}

/// Regex check; interpolated values are accepted as-is.
pub fn matches(field: &str, value: &str, regex: &Regex, expected: &str) -> FieldResult {
    if is_interpolated(value) || regex.is_match(value) {
        Ok(())
    } else {
        Err(FieldError::new(
            field,
            format!("'{}' is not {}", value, expected),
        ))
    }
}

pub fn in_range<T>(field: &str, value: T, min: T, max: T) -> FieldResult
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value < min || value > max {
        Err(FieldError::new(
            field,
            format!("{} is outside the allowed range {}..={}", value, min, max),
        ))
    } else {
        Ok(())
    }
}

pub fn ipv4(field: &str, value: &str) -> FieldResult {
    if is_interpolated(value) {
        return Ok(());
    }
    value
        .parse::<Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| FieldError::new(field, format!("'{}' is not an IPv4 address", value)))
}

/// `a.b.c.d/n` with a prefix length of 0..=32.
pub fn ipv4_cidr(field: &str, value: &str) -> FieldResult {
    if is_interpolated(value) {
        return Ok(());
    }
    let invalid = || FieldError::new(field, format!("'{}' is not a valid IPv4 CIDR block", value));

    let (address, prefix) = value.split_once('/').ok_or_else(invalid)?;
    address.parse::<Ipv4Addr>().map_err(|_| invalid())?;
    let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
    if prefix > 32 {
        return Err(invalid());
    }
    Ok(())
}

pub fn domain_name(field: &str, value: &str) -> FieldResult {
    if is_interpolated(value) || (value.len() <= 253 && DOMAIN_REGEX.is_match(value)) {
        Ok(())
    } else {
        Err(FieldError::new(
            field,
            format!("'{}' is not a valid domain name", value),
        ))
    }
}

pub fn arn(field: &str, value: &str) -> FieldResult {
    matches(field, value, &ARN_REGEX, "a valid AWS ARN")
}

pub fn hex(field: &str, value: &str, length: usize) -> FieldResult {
    if is_interpolated(value) || (value.len() == length && HEX_REGEX.is_match(value)) {
        Ok(())
    } else {
        Err(FieldError::new(
            field,
            format!("'{}' must be {} hexadecimal characters", value, length),
        ))
    }
}

/// S3 bucket naming rules: 3-63 lowercase characters, no consecutive dots,
/// not shaped like an IP address. Interpolations are rejected: state backends
/// need the literal name.
pub fn s3_bucket_name(field: &str, value: &str) -> FieldResult {
    if !S3_BUCKET_REGEX.is_match(value) {
        return Err(FieldError::new(
            field,
            format!("'{}' is not a valid S3 bucket name", value),
        ));
    }
    if value.contains("..") {
        return Err(FieldError::new(
            field,
            format!("'{}' must not contain consecutive dots", value),
        ));
    }
    if value.parse::<Ipv4Addr>().is_ok() {
        return Err(FieldError::new(
            field,
            format!("'{}' must not be formatted as an IP address", value),
        ));
    }
    Ok(())
}

pub fn aws_region(field: &str, value: &str) -> FieldResult {
    if AWS_REGION_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(FieldError::new(
            field,
            format!("'{}' is not a valid AWS region", value),
        ))
    }
}

/// BGP ASNs usable for a customer gateway: 1..=4294967295, excluding the
/// ASN reserved for the AWS side (7224) and 0.
pub fn bgp_asn(field: &str, value: u64) -> FieldResult {
    in_range(field, value, 1, u64::from(u32::MAX))?;
    if value == 7224 {
        return Err(FieldError::new(field, "ASN 7224 is reserved by AWS"));
    }
    Ok(())
}
