//! Shared flattening helpers for Kubernetes objects

use crate::models::Tags;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

static INVALID_LABEL_CHAR: OnceLock<Regex> = OnceLock::new();

/// Replace every character that is not `[a-zA-Z0-9_]` with `_`
pub fn sanitize_label_name(name: &str) -> String {
    INVALID_LABEL_CHAR
        .get_or_init(|| Regex::new(r"[^a-zA-Z0-9_]").expect("static regex"))
        .replace_all(name, "_")
        .into_owned()
}

pub fn bool_int(b: bool) -> i64 {
    if b {
        1
    } else {
        0
    }
}

/// Add `<prefix><sanitized key>` tags for every entry of `labels`
pub fn add_label_tags(tags: &mut Tags, prefix: &str, labels: Option<&BTreeMap<String, String>>) {
    for (key, value) in labels.into_iter().flatten() {
        tags.insert(
            format!("{}{}", prefix, sanitize_label_name(key)),
            value.clone(),
        );
    }
}

/// Object creation time in Unix nanoseconds
pub fn created_nanos(meta: &ObjectMeta) -> Option<i64> {
    meta.creation_timestamp
        .as_ref()
        .and_then(|t| t.0.timestamp_nanos_opt())
}

/// Numeric code for a volume/claim phase
pub fn phase_code(phase: &str) -> i64 {
    match phase.to_ascii_lowercase().as_str() {
        "bound" => 0,
        "failed" => 1,
        "pending" => 2,
        "released" => 3,
        "available" => 4,
        _ => 5,
    }
}

/// Parse a Kubernetes resource quantity (`500m`, `2Gi`, `1e3`, `1k`)
pub fn parse_quantity(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    const BINARY: [(&str, f64); 6] = [
        ("Ki", 1024.0),
        ("Mi", 1_048_576.0),
        ("Gi", 1_073_741_824.0),
        ("Ti", 1_099_511_627_776.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("Ei", 1_152_921_504_606_846_976.0),
    ];
    for (suffix, multiplier) in BINARY {
        if let Some(number) = value.strip_suffix(suffix) {
            return number.parse::<f64>().ok().map(|n| n * multiplier);
        }
    }

    // Plain numbers and exponent notation
    if let Ok(n) = value.parse::<f64>() {
        return Some(n);
    }

    let suffix = value.chars().last()?;
    let number = &value[..value.len() - suffix.len_utf8()];
    let multiplier = match suffix {
        'n' => 1e-9,
        'u' => 1e-6,
        'm' => 1e-3,
        'k' => 1e3,
        'M' => 1e6,
        'G' => 1e9,
        'T' => 1e12,
        'P' => 1e15,
        'E' => 1e18,
        _ => return None,
    };
    number.parse::<f64>().ok().map(|n| n * multiplier)
}

/// Quantity as whole units (bytes, pods)
pub fn quantity_to_i64(value: &str) -> Option<i64> {
    parse_quantity(value).map(|n| n.round() as i64)
}

/// CPU quantity as millicores
pub fn quantity_to_millis(value: &str) -> Option<i64> {
    parse_quantity(value).map(|n| (n * 1000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_label_name() {
        assert_eq!(
            sanitize_label_name("app.kubernetes.io/name"),
            "app_kubernetes_io_name"
        );
        assert_eq!(sanitize_label_name("tier"), "tier");
        assert_eq!(sanitize_label_name("a-b c"), "a_b_c");
    }

    #[test]
    fn test_bool_int() {
        assert_eq!(bool_int(true), 1);
        assert_eq!(bool_int(false), 0);
    }

    #[test]
    fn test_add_label_tags() {
        let mut labels = BTreeMap::new();
        labels.insert("app.kubernetes.io/name".to_string(), "web".to_string());
        let mut tags = Tags::new();

        add_label_tags(&mut tags, "label_", Some(&labels));
        add_label_tags(&mut tags, "label_", None);

        assert_eq!(tags.len(), 1);
        assert_eq!(tags["label_app_kubernetes_io_name"], "web");
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("4"), Some(4.0));
        assert_eq!(parse_quantity("500m"), Some(0.5));
        assert_eq!(parse_quantity("2Gi"), Some(2_147_483_648.0));
        assert_eq!(parse_quantity("16318900Ki"), Some(16_710_553_600.0));
        assert_eq!(parse_quantity("1k"), Some(1000.0));
        assert_eq!(parse_quantity("1e3"), Some(1000.0));
        assert_eq!(parse_quantity("1E"), Some(1e18));
        assert_eq!(parse_quantity(""), None);
        assert_eq!(parse_quantity("lots"), None);
        assert_eq!(parse_quantity("5µ"), None);
        assert_eq!(parse_quantity("µ"), None);
    }

    #[test]
    fn test_quantity_conversions() {
        assert_eq!(quantity_to_millis("250m"), Some(250));
        assert_eq!(quantity_to_millis("2"), Some(2000));
        assert_eq!(quantity_to_i64("128Mi"), Some(134_217_728));
        assert_eq!(quantity_to_i64("110"), Some(110));
    }

    #[test]
    fn test_phase_code() {
        assert_eq!(phase_code("Bound"), 0);
        assert_eq!(phase_code("Failed"), 1);
        assert_eq!(phase_code("Pending"), 2);
        assert_eq!(phase_code("Released"), 3);
        assert_eq!(phase_code("Available"), 4);
        assert_eq!(phase_code("Lost"), 5);
    }
}
