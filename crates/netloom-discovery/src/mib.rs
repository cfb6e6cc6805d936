//! Object identifiers read during discovery
//!
//! Table columns are given without an instance suffix; the row index is
//! whatever follows the column in a walked path.

use netloom_snmp::ObjectId;

// SNMPv2-MIB system group, scalar instances
pub const SYS_DESCR: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 1, 0];
pub const SYS_OBJECT_ID: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 2, 0];
pub const SYS_UPTIME: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 3, 0];
pub const SYS_CONTACT: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 4, 0];
pub const SYS_NAME: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 5, 0];
pub const SYS_LOCATION: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 6, 0];

/// entPhysicalModelName of the first physical entity (usually the chassis)
pub const ENT_PHYSICAL_MODEL_NAME: &[u32] = &[1, 3, 6, 1, 2, 1, 47, 1, 1, 1, 1, 13, 1];

/// Private enterprise subtree; the next component is the enterprise number
pub const ENTERPRISES: &[u32] = &[1, 3, 6, 1, 4, 1];

// IF-MIB ifTable
pub const IF_DESCR: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 2];
pub const IF_TYPE: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 3];
pub const IF_MTU: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 4];
pub const IF_SPEED: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 5];
pub const IF_PHYS_ADDRESS: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 6];
pub const IF_ADMIN_STATUS: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 7];
pub const IF_OPER_STATUS: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 8];

// IF-MIB ifXTable
pub const IF_NAME: &[u32] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 1];
/// Speed in Mbit/s, for links faster than ifSpeed can express
pub const IF_HIGH_SPEED: &[u32] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 15];
pub const IF_ALIAS: &[u32] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 18];

// IP-MIB ipAddrTable, indexed by the address itself
pub const IP_AD_ENT_IF_INDEX: &[u32] = &[1, 3, 6, 1, 2, 1, 4, 20, 1, 2];
pub const IP_AD_ENT_NET_MASK: &[u32] = &[1, 3, 6, 1, 2, 1, 4, 20, 1, 3];

/// LLDP-MIB lldpRemEntry; index is timeMark.localPortNum.remIndex
pub const LLDP_REM_ENTRY: &[u32] = &[1, 0, 8802, 1, 1, 2, 1, 4, 1, 1];
pub const LLDP_REM_CHASSIS_ID_SUBTYPE: u32 = 4;
pub const LLDP_REM_CHASSIS_ID: u32 = 5;
pub const LLDP_REM_PORT_ID_SUBTYPE: u32 = 6;
pub const LLDP_REM_PORT_ID: u32 = 7;
pub const LLDP_REM_PORT_DESC: u32 = 8;
pub const LLDP_REM_SYS_NAME: u32 = 9;
pub const LLDP_REM_SYS_DESC: u32 = 10;

/// LLDP-MIB lldpRemManAddrEntry; index is
/// timeMark.localPortNum.remIndex.addrSubtype.addrLen.addr...
pub const LLDP_REM_MAN_ADDR_ENTRY: &[u32] = &[1, 0, 8802, 1, 1, 2, 1, 4, 2, 1];

/// CISCO-CDP-MIB cdpCacheEntry; index is ifIndex.deviceIndex
pub const CDP_CACHE_ENTRY: &[u32] = &[1, 3, 6, 1, 4, 1, 9, 9, 23, 1, 2, 1, 1];
pub const CDP_CACHE_ADDRESS_TYPE: u32 = 3;
pub const CDP_CACHE_ADDRESS: u32 = 4;
pub const CDP_CACHE_VERSION: u32 = 5;
pub const CDP_CACHE_DEVICE_ID: u32 = 6;
pub const CDP_CACHE_DEVICE_PORT: u32 = 7;
pub const CDP_CACHE_PLATFORM: u32 = 8;

/// Address family numbers used by LLDP and CDP address columns
pub const ADDRESS_FAMILY_IPV4: u32 = 1;

pub fn oid(components: &[u32]) -> ObjectId {
    ObjectId::from(components)
}

/// Split a walked path below a table entry into (column, row index)
pub fn split_entry<'a>(oid: &'a ObjectId, entry: &ObjectId) -> Option<(u32, &'a [u32])> {
    match oid.suffix(entry)? {
        [column, index @ ..] if !index.is_empty() => Some((*column, index)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_entry() {
        let entry = oid(CDP_CACHE_ENTRY);
        let walked = entry.join(&[CDP_CACHE_DEVICE_ID, 10101, 3]);
        assert_eq!(split_entry(&walked, &entry), Some((CDP_CACHE_DEVICE_ID, &[10101, 3][..])));
        assert_eq!(split_entry(&entry.child(6), &entry), None);
        assert_eq!(split_entry(&oid(SYS_NAME), &entry), None);
    }
}
