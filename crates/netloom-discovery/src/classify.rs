//! Best-effort classification from free-text identity fields
//!
//! Everything here is a heuristic. Results are hints for display and
//! filtering; they are never used to match or merge devices.

use netloom_core::DeviceType;
use netloom_snmp::ObjectId;

use crate::mib;

/// Keyword table, checked in order; the first hit wins
const TYPE_KEYWORDS: &[(DeviceType, &[&str])] = &[
    (
        DeviceType::Firewall,
        &[
            "firewall",
            "adaptive security appliance",
            "fortigate",
            "fortios",
            "pan-os",
        ],
    ),
    (
        DeviceType::Switch,
        &["switch", "catalyst", "nx-os", "nexus", "procurve", "cumulus"],
    ),
    (
        DeviceType::Router,
        &["router", "routeros", "ios xr", "ios-xr", "vyos", "edgeos"],
    ),
];

/// Guess a device type from its description; `Unknown` on no match
pub fn classify_device_type(description: &str) -> DeviceType {
    let lower = description.to_ascii_lowercase();
    TYPE_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(device_type, _)| *device_type)
        .unwrap_or(DeviceType::Unknown)
}

/// IANA private enterprise numbers of common network vendors
const ENTERPRISE_VENDORS: &[(u32, &str)] = &[
    (9, "Cisco"),
    (11, "HP"),
    (2011, "Huawei"),
    (2636, "Juniper"),
    (4526, "Netgear"),
    (6527, "Nokia"),
    (8072, "Net-SNMP"),
    (12356, "Fortinet"),
    (14988, "MikroTik"),
    (25461, "Palo Alto Networks"),
    (30065, "Arista"),
    (41112, "Ubiquiti"),
];

/// Vendor named by the enterprise subtree of a sysObjectID
pub fn vendor_from_object_id(object_id: &ObjectId) -> Option<&'static str> {
    let enterprise = *object_id.suffix(&mib::oid(mib::ENTERPRISES))?.first()?;
    ENTERPRISE_VENDORS
        .iter()
        .find(|(number, _)| *number == enterprise)
        .map(|(_, vendor)| *vendor)
}

/// Vendor named in a description, used when the object id is unknown
///
/// Vendor names only match whole words, so "HP" does not hit "HPC".
pub fn vendor_from_description(description: &str) -> Option<&'static str> {
    let tokens = words(description);
    ENTERPRISE_VENDORS
        .iter()
        .find(|(_, vendor)| {
            let name = words(vendor);
            !name.is_empty() && tokens.windows(name.len()).any(|w| w == name.as_slice())
        })
        .map(|(_, vendor)| *vendor)
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Version token following the word "version" (`Version 15.2(7)E3,` → `15.2(7)E3`)
pub fn os_version(description: &str) -> Option<String> {
    let mut words = description.split_whitespace();
    while let Some(word) = words.next() {
        if word.eq_ignore_ascii_case("version") {
            let token = words.next()?.trim_end_matches([',', ';']);
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    None
}
