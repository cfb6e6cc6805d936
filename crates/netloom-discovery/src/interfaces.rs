//! Interface table reader (IF-MIB ifTable/ifXTable plus ipAddrTable)

use netloom_core::{InterfaceRecord, InterfaceStatus, InterfaceType};
use netloom_snmp::{Credentials, ProtocolError, ProtocolPort, ProtocolResult, SnmpValue, VarBinds};
use std::collections::{BTreeMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::mib;

/// Columns walked for every read, in walk order
const COLUMNS: &[&[u32]] = &[
    mib::IF_NAME,
    mib::IF_DESCR,
    mib::IF_ALIAS,
    mib::IF_TYPE,
    mib::IF_MTU,
    mib::IF_SPEED,
    mib::IF_HIGH_SPEED,
    mib::IF_PHYS_ADDRESS,
    mib::IF_ADMIN_STATUS,
    mib::IF_OPER_STATUS,
    mib::IP_AD_ENT_IF_INDEX,
    mib::IP_AD_ENT_NET_MASK,
];

/// Reads the interface table one column walk at a time
pub struct InterfaceTableReader {
    port: Arc<dyn ProtocolPort>,
}

impl InterfaceTableReader {
    pub fn new(port: Arc<dyn ProtocolPort>) -> Self {
        Self { port }
    }

    /// Read every interface of a device, ordered by index
    ///
    /// A failing column is skipped and the records are built from whatever
    /// columns did come back. Only when every column fails is the first
    /// error returned.
    pub async fn read(
        &self,
        address: IpAddr,
        credentials: &Credentials,
    ) -> ProtocolResult<Vec<InterfaceRecord>> {
        let mut table = ColumnTable::default();
        let mut first_error: Option<ProtocolError> = None;

        for &column in COLUMNS {
            let prefix = mib::oid(column);
            match self.port.walk(address, &prefix, credentials).await {
                Ok(rows) => {
                    trace!(address = %address, column = %prefix, rows = rows.len(), "Walked column");
                    table.insert(column, rows);
                }
                Err(e) => {
                    debug!(address = %address, column = %prefix, error = %e, "Column walk failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        if table.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let records = table.into_records();
        debug!(address = %address, interfaces = records.len(), "Read interface table");
        Ok(records)
    }
}

/// Walked columns keyed by their base identifier
#[derive(Default)]
struct ColumnTable {
    columns: BTreeMap<&'static [u32], VarBinds>,
}

impl ColumnTable {
    fn insert(&mut self, column: &'static [u32], rows: VarBinds) {
        self.columns.insert(column, rows);
    }

    fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Rows of one column as (single-component index, value)
    fn rows(&self, column: &'static [u32]) -> impl Iterator<Item = (u32, &SnmpValue)> + '_ {
        let prefix = mib::oid(column);
        self.columns
            .get(column)
            .into_iter()
            .flat_map(|rows| rows.iter())
            .filter_map(move |(oid, value)| match oid.suffix(&prefix) {
                Some([index]) => Some((*index, value)),
                _ => None,
            })
    }

    /// Pivot column-major rows into one record per interface index
    fn into_records(self) -> Vec<InterfaceRecord> {
        let mut records: BTreeMap<u32, InterfaceRecord> = BTreeMap::new();
        let mut descriptions: BTreeMap<u32, String> = BTreeMap::new();
        let mut high_speeds: BTreeMap<u32, u64> = BTreeMap::new();

        for (index, value) in self.rows(mib::IF_NAME) {
            if let Some(name) = value.as_text().filter(|n| !n.is_empty()) {
                row(&mut records, index).name = name;
            }
        }
        for (index, value) in self.rows(mib::IF_DESCR) {
            row(&mut records, index);
            if let Some(descr) = value.as_text().filter(|d| !d.is_empty()) {
                descriptions.insert(index, descr);
            }
        }
        for (index, value) in self.rows(mib::IF_ALIAS) {
            row(&mut records, index).description = value.as_text().filter(|a| !a.is_empty());
        }
        for (index, value) in self.rows(mib::IF_TYPE) {
            row(&mut records, index).if_type = value
                .as_i64()
                .map(InterfaceType::from_code)
                .unwrap_or_default();
        }
        for (index, value) in self.rows(mib::IF_MTU) {
            row(&mut records, index).mtu = value.as_u64().and_then(|m| u32::try_from(m).ok());
        }
        for (index, value) in self.rows(mib::IF_SPEED) {
            row(&mut records, index).speed_bps = value.as_u64();
        }
        for (index, value) in self.rows(mib::IF_HIGH_SPEED) {
            row(&mut records, index);
            if let Some(mbps) = value.as_u64().filter(|s| *s > 0) {
                high_speeds.insert(index, mbps * 1_000_000);
            }
        }
        for (index, value) in self.rows(mib::IF_PHYS_ADDRESS) {
            row(&mut records, index).mac = value.as_mac();
        }
        for (index, value) in self.rows(mib::IF_ADMIN_STATUS) {
            row(&mut records, index).admin_status = value
                .as_i64()
                .map(InterfaceStatus::from_code)
                .unwrap_or_default();
        }
        for (index, value) in self.rows(mib::IF_OPER_STATUS) {
            row(&mut records, index).oper_status = value
                .as_i64()
                .map(InterfaceStatus::from_code)
                .unwrap_or_default();
        }

        // ifSpeed saturates at ~4.29 Gbit/s; ifHighSpeed is authoritative when set
        for (index, speed) in high_speeds {
            if let Some(record) = records.get_mut(&index) {
                record.speed_bps = Some(speed);
            }
        }

        for (if_index, address, prefix_len) in self.addresses() {
            if let Some(record) = records.get_mut(&if_index) {
                if record.ip.is_none() {
                    record.ip = Some(IpAddr::V4(address));
                    record.prefix_len = prefix_len;
                }
            }
        }

        for (index, record) in records.iter_mut() {
            let descr = descriptions.remove(index);
            if record.name.is_empty() {
                record.name = descr.clone().unwrap_or_else(|| format!("if{}", index));
            }
            if record.description.is_none() {
                record.description = descr.filter(|d| *d != record.name);
            }
        }

        // Names are unique per device; a repeated name keeps its index as a suffix
        let mut seen = HashSet::new();
        for (index, record) in records.iter_mut() {
            if !seen.insert(record.name.clone()) {
                trace!(index, name = %record.name, "Duplicate interface name");
                record.name = format!("{}#{}", record.name, index);
                seen.insert(record.name.clone());
            }
        }

        records.into_values().collect()
    }

    /// (ifIndex, address, prefix length) from ipAddrTable
    fn addresses(&self) -> Vec<(u32, Ipv4Addr, Option<u8>)> {
        let if_index_prefix = mib::oid(mib::IP_AD_ENT_IF_INDEX);
        let mask_prefix = mib::oid(mib::IP_AD_ENT_NET_MASK);
        let masks = self.columns.get(mib::IP_AD_ENT_NET_MASK);

        self.columns
            .get(mib::IP_AD_ENT_IF_INDEX)
            .into_iter()
            .flat_map(|rows| rows.iter())
            .filter_map(|(oid, value)| {
                let address = ipv4_from_index(oid.suffix(&if_index_prefix)?)?;
                let if_index = u32::try_from(value.as_u64()?).ok()?;
                let prefix_len = masks
                    .and_then(|m| m.get(&mask_prefix.join(&address.octets().map(u32::from))))
                    .and_then(|mask| mask.as_ipv4())
                    .map(|mask| u32::from(mask).count_ones() as u8);
                Some((if_index, address, prefix_len))
            })
            .collect()
    }
}

/// Four trailing components of a table index as an IPv4 address
pub(crate) fn ipv4_from_index(index: &[u32]) -> Option<Ipv4Addr> {
    match index {
        [a, b, c, d] => Some(Ipv4Addr::new(
            u8::try_from(*a).ok()?,
            u8::try_from(*b).ok()?,
            u8::try_from(*c).ok()?,
            u8::try_from(*d).ok()?,
        )),
        _ => None,
    }
}

fn row(records: &mut BTreeMap<u32, InterfaceRecord>, index: u32) -> &mut InterfaceRecord {
    records.entry(index).or_insert_with(|| InterfaceRecord {
        index,
        ..Default::default()
    })
}
