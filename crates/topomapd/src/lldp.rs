//! LLDP link extraction and multi-pass pairing
//!
//! Every lldpRemTable row becomes one [`LldpLink`] seen from the reporting
//! device. Two links describing the same cable from opposite ends are found
//! by [`match_links`], which walks the fixed chain of [`MatchPass`]es and
//! pairs each link at most once.

use crate::identity::{IdentityIndex, RemoteIdentity};
use crate::matching::{DirectedLink, LinkPair, PairState};
use crate::model::{Device, Labels};
use crate::types::{DeviceObservation, LldpRemoteRow};
use sonic_topo_types::{
    canonical_chassis, canonical_hostname, canonical_ip, canonical_mac, composite_key,
};
use tracing::debug;

/// LLDP-MIB LldpChassisIdSubtype
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChassisIdSubtype {
    ChassisComponent,
    InterfaceAlias,
    PortComponent,
    MacAddress,
    NetworkAddress,
    InterfaceName,
    Local,
    Unknown,
}

impl ChassisIdSubtype {
    /// Accepts the numeric code, the MIB name or the `name(code)` rendering
    pub fn parse(raw: &str) -> Self {
        match subtype_code(
            raw,
            &[
                ("chassiscomponent", 1),
                ("interfacealias", 2),
                ("portcomponent", 3),
                ("macaddress", 4),
                ("networkaddress", 5),
                ("interfacename", 6),
                ("local", 7),
            ],
        ) {
            1 => ChassisIdSubtype::ChassisComponent,
            2 => ChassisIdSubtype::InterfaceAlias,
            3 => ChassisIdSubtype::PortComponent,
            4 => ChassisIdSubtype::MacAddress,
            5 => ChassisIdSubtype::NetworkAddress,
            6 => ChassisIdSubtype::InterfaceName,
            7 => ChassisIdSubtype::Local,
            _ => ChassisIdSubtype::Unknown,
        }
    }
}

/// LLDP-MIB LldpPortIdSubtype
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PortIdSubtype {
    InterfaceAlias,
    PortComponent,
    MacAddress,
    NetworkAddress,
    InterfaceName,
    AgentCircuitId,
    Local,
    #[default]
    Unknown,
}

impl PortIdSubtype {
    pub fn parse(raw: &str) -> Self {
        match subtype_code(
            raw,
            &[
                ("interfacealias", 1),
                ("portcomponent", 2),
                ("macaddress", 3),
                ("networkaddress", 4),
                ("interfacename", 5),
                ("agentcircuitid", 6),
                ("local", 7),
            ],
        ) {
            1 => PortIdSubtype::InterfaceAlias,
            2 => PortIdSubtype::PortComponent,
            3 => PortIdSubtype::MacAddress,
            4 => PortIdSubtype::NetworkAddress,
            5 => PortIdSubtype::InterfaceName,
            6 => PortIdSubtype::AgentCircuitId,
            7 => PortIdSubtype::Local,
            _ => PortIdSubtype::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PortIdSubtype::InterfaceAlias => "interfaceAlias",
            PortIdSubtype::PortComponent => "portComponent",
            PortIdSubtype::MacAddress => "macAddress",
            PortIdSubtype::NetworkAddress => "networkAddress",
            PortIdSubtype::InterfaceName => "interfaceName",
            PortIdSubtype::AgentCircuitId => "agentCircuitId",
            PortIdSubtype::Local => "local",
            PortIdSubtype::Unknown => "",
        }
    }

    /// Port IDs of these subtypes are addresses, not readable port names
    fn is_address(&self) -> bool {
        matches!(self, PortIdSubtype::MacAddress | PortIdSubtype::NetworkAddress)
    }
}

fn subtype_code(raw: &str, names: &[(&str, u8)]) -> u8 {
    let text = raw.trim().to_ascii_lowercase();
    if let Ok(code) = text.parse::<u8>() {
        return code;
    }
    let (name, paren_code) = match text.split_once('(') {
        Some((name, rest)) => (name, rest.trim_end_matches(')').trim().parse::<u8>().ok()),
        None => (text.as_str(), None),
    };
    let name: String = name.chars().filter(char::is_ascii_alphanumeric).collect();
    names
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, code)| *code)
        .or(paren_code)
        .unwrap_or(0)
}

/// Normalizes a port ID by subtype: MAC ports compare as a canonical MAC,
/// network ports as a canonical IP, everything else verbatim.
pub fn normalize_port_id(raw: &str, subtype: PortIdSubtype) -> String {
    let trimmed = raw.trim();
    let normalized = match subtype {
        PortIdSubtype::MacAddress => canonical_mac(trimmed),
        PortIdSubtype::NetworkAddress => canonical_ip(trimmed),
        _ => None,
    };
    normalized.unwrap_or_else(|| trimmed.to_string())
}

fn normalize_chassis_id(raw: &str, subtype: ChassisIdSubtype) -> String {
    match subtype {
        ChassisIdSubtype::MacAddress => {
            canonical_mac(raw).unwrap_or_else(|| canonical_chassis(raw))
        }
        ChassisIdSubtype::NetworkAddress => {
            canonical_ip(raw).unwrap_or_else(|| canonical_chassis(raw))
        }
        _ => canonical_chassis(raw),
    }
}

/// One unidirectional LLDP neighbor relation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LldpLink {
    /// Reporting device
    pub device_id: String,
    pub local_chassis: String,
    pub local_sys_name: String,
    /// Always the reporting device; kept beside `remote_match_id` so the
    /// pass keys read symmetrically
    pub local_match_id: String,
    pub local_port_num: u32,
    pub local_if_index: u32,
    pub local_port_label: String,
    pub local_port_id: String,
    pub local_port_subtype: PortIdSubtype,
    pub local_port_descr: String,

    pub remote_chassis: String,
    pub remote_sys_name: String,
    pub remote_mgmt_ip: String,
    /// Observed device the remote resolved to, empty when unknown
    pub remote_match_id: String,
    pub remote_port_id: String,
    pub remote_port_subtype: PortIdSubtype,
    pub remote_port_descr: String,

    /// Resolved (possibly synthetic) target device
    pub target_device_id: String,
}

impl LldpLink {
    pub fn local_tokens(&self) -> Vec<String> {
        identity_tokens(&self.local_match_id, &self.local_chassis)
    }

    pub fn remote_tokens(&self) -> Vec<String> {
        identity_tokens(&self.remote_match_id, &self.remote_chassis)
    }

    /// The device heard itself
    pub fn is_self_loop(&self) -> bool {
        let remote = self.remote_tokens();
        self.local_tokens().iter().any(|t| remote.contains(t))
    }

    /// Port label used when the link stays unpaired
    pub fn remote_port_label(&self) -> String {
        if self.remote_port_subtype.is_address() && !self.remote_port_descr.is_empty() {
            self.remote_port_descr.clone()
        } else if !self.remote_port_id.is_empty() {
            self.remote_port_id.clone()
        } else {
            self.remote_port_descr.clone()
        }
    }

    /// What the advertisement says about the remote device
    pub fn remote_device(&self) -> Device {
        let mut device = Device::new(self.target_device_id.clone());
        device.hostname = self.remote_sys_name.clone();
        device.chassis_id = self.remote_chassis.clone();
        if !self.remote_mgmt_ip.is_empty() {
            device.management_addresses.insert(self.remote_mgmt_ip.clone());
        }
        device
    }
}

impl DirectedLink for LldpLink {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn local_port(&self) -> String {
        self.local_port_label.clone()
    }

    fn unpaired_target(&self) -> Option<(String, String)> {
        Some((self.target_device_id.clone(), self.remote_port_label()))
    }

    fn labels(&self) -> Labels {
        let mut labels = Labels::new();
        for (key, value) in [
            ("local_port_id", &self.local_port_id),
            ("remote_chassis_id", &self.remote_chassis),
            ("remote_port_id", &self.remote_port_id),
            ("remote_port_descr", &self.remote_port_descr),
            ("remote_sys_name", &self.remote_sys_name),
            ("remote_mgmt_ip", &self.remote_mgmt_ip),
        ] {
            if !value.is_empty() {
                labels.insert(key.to_string(), value.clone());
            }
        }
        labels
    }
}

fn identity_tokens(match_id: &str, chassis: &str) -> Vec<String> {
    let mut tokens = Vec::with_capacity(2);
    if !match_id.is_empty() {
        tokens.push(format!("id:{}", match_id));
    }
    if !chassis.is_empty() {
        tokens.push(format!("ch:{}", chassis));
    }
    tokens
}

/// Flattens one device's LLDP tables into links, resolving every remote
/// against `index`.
pub fn collect_links(obs: &DeviceObservation, index: &mut IdentityIndex) -> Vec<LldpLink> {
    let device_id = obs.device_id.trim().to_string();
    let local = &obs.lldp_local;
    let local_chassis = if local.chassis_id.trim().is_empty() {
        canonical_chassis(&obs.chassis_id)
    } else {
        normalize_chassis_id(&local.chassis_id, ChassisIdSubtype::parse(&local.chassis_id_subtype))
    };
    let local_sys_name = if local.sys_name.trim().is_empty() {
        canonical_hostname(&obs.hostname)
    } else {
        canonical_hostname(&local.sys_name)
    };

    let mut rows: Vec<&LldpRemoteRow> = obs.lldp_remotes.iter().collect();
    rows.sort_by(|a, b| {
        (a.local_port_num, &a.chassis_id, &a.port_id, &a.sys_name, &a.port_descr)
            .cmp(&(b.local_port_num, &b.chassis_id, &b.port_id, &b.sys_name, &b.port_descr))
            .then_with(|| a.cmp(b))
    });

    let mut links = Vec::with_capacity(rows.len());
    for row in rows {
        let remote_chassis =
            normalize_chassis_id(&row.chassis_id, ChassisIdSubtype::parse(&row.chassis_id_subtype));
        let remote_sys_name = canonical_hostname(&row.sys_name);
        if remote_chassis.is_empty() && remote_sys_name.is_empty() {
            debug!(
                device = %device_id,
                port = row.local_port_num,
                "dropping LLDP row without chassis or sysName"
            );
            continue;
        }

        let local_port = local.ports.iter().filter(|p| p.port_num == row.local_port_num).min();
        let local_if_index = match local_port {
            Some(port) if port.if_index > 0 => port.if_index,
            _ if obs.interface(row.local_port_num).is_some() => row.local_port_num,
            _ => 0,
        };
        let local_port_subtype = local_port
            .map(|p| PortIdSubtype::parse(&p.port_id_subtype))
            .unwrap_or_default();
        let local_port_id = local_port
            .map(|p| normalize_port_id(&p.port_id, local_port_subtype))
            .unwrap_or_default();
        let local_port_descr = local_port
            .map(|p| p.port_descr.trim().to_string())
            .unwrap_or_default();

        let local_port_label = [
            obs.interface_name(local_if_index),
            local_port_descr.clone(),
            local_port_id.clone(),
        ]
        .into_iter()
        .find(|label| !label.is_empty())
        .unwrap_or_else(|| {
            if row.local_port_num > 0 {
                format!("port-{}", row.local_port_num)
            } else {
                String::new()
            }
        });

        let remote_port_subtype = PortIdSubtype::parse(&row.port_id_subtype);
        let remote_mgmt_ip = canonical_ip(&row.management_address).unwrap_or_default();
        let remote = RemoteIdentity::from_canonical(
            remote_sys_name.clone(),
            remote_chassis.clone(),
            remote_mgmt_ip.clone(),
        );
        let remote_match_id = index.resolve_known(&remote).unwrap_or_default();
        let target_device_id = index.resolve_remote(&remote);

        links.push(LldpLink {
            device_id: device_id.clone(),
            local_chassis: local_chassis.clone(),
            local_sys_name: local_sys_name.clone(),
            local_match_id: device_id.clone(),
            local_port_num: row.local_port_num,
            local_if_index,
            local_port_label,
            local_port_id,
            local_port_subtype,
            local_port_descr,
            remote_chassis,
            remote_sys_name,
            remote_mgmt_ip,
            remote_match_id,
            remote_port_id: normalize_port_id(&row.port_id, remote_port_subtype),
            remote_port_subtype,
            remote_port_descr: row.port_descr.trim().to_string(),
            target_device_id,
        });
    }
    links
}

/// Fallback chain tried in declaration order; the first pass to find a
/// mirror wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPass {
    Default,
    PortDescription,
    SysName,
    ChassisPortIdSubtype,
    ChassisPortDescr,
    Chassis,
}

impl MatchPass {
    pub const ALL: [MatchPass; 6] = [
        MatchPass::Default,
        MatchPass::PortDescription,
        MatchPass::SysName,
        MatchPass::ChassisPortIdSubtype,
        MatchPass::ChassisPortDescr,
        MatchPass::Chassis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchPass::Default => "default",
            MatchPass::PortDescription => "port_description",
            MatchPass::SysName => "sysname",
            MatchPass::ChassisPortIdSubtype => "chassis_port_id_subtype",
            MatchPass::ChassisPortDescr => "chassis_port_descr",
            MatchPass::Chassis => "chassis",
        }
    }

    fn uses_identity(&self) -> bool {
        !matches!(self, MatchPass::SysName)
    }

    /// Fields as the candidate target stores them
    fn own_fields<'a>(&self, link: &'a LldpLink) -> Option<Vec<&'a str>> {
        let fields: Vec<&str> = match self {
            MatchPass::Default => vec![link.local_port_id.as_str(), link.remote_port_id.as_str()],
            MatchPass::PortDescription => {
                vec![link.local_port_descr.as_str(), link.remote_port_descr.as_str()]
            }
            MatchPass::SysName => vec![
                link.local_sys_name.as_str(),
                link.remote_sys_name.as_str(),
                link.local_port_id.as_str(),
                link.remote_port_id.as_str(),
            ],
            MatchPass::ChassisPortIdSubtype => {
                if link.local_port_id.is_empty() {
                    return None;
                }
                vec![link.local_port_id.as_str(), link.local_port_subtype.as_str()]
            }
            MatchPass::ChassisPortDescr => vec![link.remote_port_descr.as_str()],
            MatchPass::Chassis => Vec::new(),
        };
        require_all(fields, *self)
    }

    /// Fields of the source, mirrored into the target's perspective
    fn mirrored_fields<'a>(&self, link: &'a LldpLink) -> Option<Vec<&'a str>> {
        let fields: Vec<&str> = match self {
            MatchPass::Default => vec![link.remote_port_id.as_str(), link.local_port_id.as_str()],
            MatchPass::PortDescription => {
                vec![link.remote_port_descr.as_str(), link.local_port_descr.as_str()]
            }
            MatchPass::SysName => vec![
                link.remote_sys_name.as_str(),
                link.local_sys_name.as_str(),
                link.remote_port_id.as_str(),
                link.local_port_id.as_str(),
            ],
            MatchPass::ChassisPortIdSubtype => {
                if link.remote_port_id.is_empty() {
                    return None;
                }
                vec![link.remote_port_id.as_str(), link.remote_port_subtype.as_str()]
            }
            MatchPass::ChassisPortDescr => vec![link.local_port_descr.as_str()],
            MatchPass::Chassis => Vec::new(),
        };
        require_all(fields, *self)
    }

    pub fn index_keys(&self, link: &LldpLink) -> Vec<String> {
        match self.own_fields(link) {
            Some(fields) => self.keys(&link.local_tokens(), &link.remote_tokens(), &fields),
            None => Vec::new(),
        }
    }

    pub fn query_keys(&self, link: &LldpLink) -> Vec<String> {
        match self.mirrored_fields(link) {
            Some(fields) => self.keys(&link.remote_tokens(), &link.local_tokens(), &fields),
            None => Vec::new(),
        }
    }

    fn keys(&self, first: &[String], second: &[String], fields: &[&str]) -> Vec<String> {
        if !self.uses_identity() {
            let mut parts = vec![self.as_str()];
            parts.extend_from_slice(fields);
            return vec![composite_key(&parts)];
        }
        let mut keys = Vec::with_capacity(first.len() * second.len());
        for a in first {
            for b in second {
                let mut parts = vec![self.as_str(), a.as_str(), b.as_str()];
                parts.extend_from_slice(fields);
                keys.push(composite_key(&parts));
            }
        }
        keys
    }
}

/// Every pass except the subtype one needs each field populated. The
/// subtype itself may be unknown on both ends.
fn require_all(fields: Vec<&str>, pass: MatchPass) -> Option<Vec<&str>> {
    let check = match pass {
        MatchPass::ChassisPortIdSubtype => &fields[..1],
        _ => &fields[..],
    };
    if check.iter().any(|f| f.is_empty()) {
        None
    } else {
        Some(fields)
    }
}

/// Pairs links across all passes. `links` must already be in canonical
/// order.
pub fn match_links(links: &[LldpLink]) -> Vec<LinkPair> {
    let mut state = PairState::new(links.len());
    for pass in MatchPass::ALL {
        let matched = state.run_pass(
            links,
            pass.as_str(),
            |l| pass.index_keys(l),
            |l| pass.query_keys(l),
            |l| !l.is_self_loop(),
            |a, b| a.device_id != b.device_id,
        );
        debug!(pass = pass.as_str(), matched, "LLDP match pass complete");
    }
    state.into_pairs()
}
