//! Integration tests for topomapd
//!
//! Drives both build entry points end to end with small hand-built
//! observation sets.

#![allow(clippy::useless_vec)]

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use sonic_topomapd::model::{pair_keys, stats};
    use sonic_topomapd::types::{
        ArpRow, FdbRow, InterfaceRow, IsisAdjacencyRow, IsisCircuitRow, LldpLocal, LldpLocalPort,
        LldpRemoteRow, OspfInterfaceRow, OspfNeighborRow,
    };
    use sonic_topomapd::{
        build_l2_result, build_l3_result, DeviceObservation, Protocol, ProtocolToggles,
        TopologyStore, TopomapError,
    };
    use std::collections::BTreeSet;

    /// Switch with one LLDP port and one remote row per `(local port, peer
    /// chassis, peer port)` triple
    fn lldp_switch(id: &str, chassis: &str, neighbors: &[(&str, &str, &str)]) -> DeviceObservation {
        DeviceObservation {
            device_id: id.to_string(),
            hostname: id.to_string(),
            lldp_local: LldpLocal {
                chassis_id: chassis.to_string(),
                chassis_id_subtype: "4".to_string(),
                sys_name: id.to_string(),
                ports: neighbors
                    .iter()
                    .enumerate()
                    .map(|(i, (port, _, _))| LldpLocalPort {
                        port_num: i as u32 + 1,
                        port_id: port.to_string(),
                        port_id_subtype: "5".to_string(),
                        ..Default::default()
                    })
                    .collect(),
            },
            lldp_remotes: neighbors
                .iter()
                .enumerate()
                .map(|(i, (_, peer_chassis, peer_port))| LldpRemoteRow {
                    local_port_num: i as u32 + 1,
                    chassis_id: peer_chassis.to_string(),
                    chassis_id_subtype: "4".to_string(),
                    port_id: peer_port.to_string(),
                    port_id_subtype: "5".to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn fdb_switch(id: &str, chassis: &str, learned: &[(&str, u32)]) -> DeviceObservation {
        DeviceObservation {
            device_id: id.to_string(),
            chassis_id: chassis.to_string(),
            fdb_entries: learned
                .iter()
                .map(|(mac, port)| FdbRow {
                    mac: mac.to_string(),
                    bridge_port: *port,
                    status: "learned".to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn ospf_router(
        id: &str,
        rid: &str,
        local: &str,
        peer_rid: &str,
        peer_ip: &str,
    ) -> DeviceObservation {
        DeviceObservation {
            device_id: id.to_string(),
            ospf_router_id: rid.to_string(),
            interfaces: vec![InterfaceRow {
                if_index: 5,
                if_name: "Ethernet0".to_string(),
                ..Default::default()
            }],
            ospf_interfaces: vec![OspfInterfaceRow {
                ip: local.to_string(),
                if_index: 5,
                area: "0.0.0.0".to_string(),
                netmask: "255.255.255.252".to_string(),
                ..Default::default()
            }],
            ospf_neighbors: vec![OspfNeighborRow {
                router_id: peer_rid.to_string(),
                ip: peer_ip.to_string(),
                state: "full".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn isis_node(id: &str, sys_id: &str, neighbor: &str) -> DeviceObservation {
        DeviceObservation {
            device_id: id.to_string(),
            isis_sys_id: sys_id.to_string(),
            isis_circuits: vec![IsisCircuitRow {
                circuit_index: 1,
                if_index: 21,
                ..Default::default()
            }],
            isis_adjacencies: vec![IsisAdjacencyRow {
                circuit_index: 1,
                adj_index: 1,
                neighbor_sys_id: neighbor.to_string(),
                state: "up".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn two_switch_fabric() -> Vec<DeviceObservation> {
        vec![
            lldp_switch(
                "leaf1",
                "00:00:00:00:00:0a",
                &[("Ethernet0", "00:00:00:00:00:0b", "Ethernet4")],
            ),
            lldp_switch(
                "spine1",
                "00:00:00:00:00:0b",
                &[("Ethernet4", "00:00:00:00:00:0a", "Ethernet0")],
            ),
        ]
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(
            build_l2_result(&[], ProtocolToggles::default()),
            Err(TopomapError::EmptyInput)
        ));
        assert!(matches!(build_l3_result(&[]), Err(TopomapError::EmptyInput)));
    }

    #[test]
    fn test_l2_rejects_observation_without_device_id() {
        let mut observations = two_switch_fabric();
        observations.push(DeviceObservation {
            device_id: "   ".to_string(),
            ..Default::default()
        });
        let err = build_l2_result(&observations, ProtocolToggles::default()).unwrap_err();
        assert!(matches!(err, TopomapError::MissingDeviceId { index: 2 }));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_l3_skips_observation_without_device_id() {
        let observations = vec![
            DeviceObservation {
                device_id: "r1".to_string(),
                ..Default::default()
            },
            DeviceObservation::default(),
        ];
        let result = build_l3_result(&observations).unwrap();
        assert_eq!(result.devices.len(), 1);
        assert_eq!(result.stat(stats::DEVICES_TOTAL), 1);
    }

    #[test]
    fn test_lldp_mirrored_ports_form_one_pair() {
        let result = build_l2_result(&two_switch_fabric(), ProtocolToggles::default()).unwrap();

        let lldp: Vec<_> = result.adjacencies_for(Protocol::Lldp).collect();
        assert_eq!(lldp.len(), 2);
        assert_eq!(lldp[0].source_device_id, "leaf1");
        assert_eq!(lldp[0].source_port, "Ethernet0");
        assert_eq!(lldp[0].target_device_id, "spine1");
        assert_eq!(lldp[0].target_port, "Ethernet4");

        assert_eq!(lldp[0].pair_id(), lldp[1].pair_id());
        assert_eq!(
            lldp[0].pair_id(),
            Some("lldp:leaf1/Ethernet0|lldp:spine1/Ethernet4")
        );
        assert_eq!(lldp[0].labels[pair_keys::PAIR_PASS], "default");
        let sides: BTreeSet<&str> = lldp
            .iter()
            .map(|a| a.labels[pair_keys::PAIR_SIDE].as_str())
            .collect();
        assert_eq!(sides, BTreeSet::from(["a", "b"]));

        assert_eq!(result.stat(stats::LINKS_LLDP), 2);
        assert_eq!(result.stat(stats::LINKS_TOTAL), 2);
        assert_eq!(result.stat(stats::DEVICES_TOTAL), 2);
    }

    #[test]
    fn test_unpaired_lldp_neighbor_becomes_discovered_device() {
        let observations = vec![lldp_switch(
            "leaf1",
            "00:00:00:00:00:0a",
            &[("Ethernet0", "00:00:00:00:00:0c", "Ethernet12")],
        )];
        let result = build_l2_result(&observations, ProtocolToggles::default()).unwrap();

        assert_eq!(result.adjacencies.len(), 1);
        let adjacency = &result.adjacencies[0];
        assert_eq!(adjacency.target_device_id, "chassis-00000000000c");
        assert_eq!(adjacency.target_port, "Ethernet12");
        assert!(adjacency.pair_id().is_none());

        let discovered = result.device("chassis-00000000000c").unwrap();
        assert_eq!(discovered.chassis_id, "00:00:00:00:00:0c");
    }

    #[test]
    fn test_pairs_are_symmetric_and_never_self() {
        let mut observations = two_switch_fabric();
        // leaf2 hears itself on one port and spine1 on another
        observations.push(lldp_switch(
            "leaf2",
            "00:00:00:00:00:0d",
            &[
                ("Ethernet0", "00:00:00:00:00:0d", "Ethernet0"),
                ("Ethernet8", "00:00:00:00:00:0b", "Ethernet16"),
            ],
        ));
        let result = build_l2_result(&observations, ProtocolToggles::ALL).unwrap();

        for adjacency in &result.adjacencies {
            assert!(
                adjacency.source_device_id != adjacency.target_device_id
                    || adjacency.source_port != adjacency.target_port
            );
            let Some(pair_id) = adjacency.pair_id() else {
                continue;
            };
            let reverse = result
                .adjacencies
                .iter()
                .find(|other| {
                    other.source_device_id == adjacency.target_device_id
                        && other.source_port == adjacency.target_port
                })
                .unwrap();
            assert_eq!(reverse.pair_id(), Some(pair_id));
            assert_eq!(reverse.target_device_id, adjacency.source_device_id);
        }
    }

    #[test]
    fn test_output_is_independent_of_input_order() {
        let mut observations = two_switch_fabric();
        observations.push(lldp_switch(
            "leaf2",
            "00:00:00:00:00:0d",
            &[("Ethernet8", "00:00:00:00:00:0b", "Ethernet16")],
        ));
        observations.push(fdb_switch(
            "sw9",
            "00:00:00:00:00:99",
            &[("00:11:22:33:44:01", 3), ("00:11:22:33:44:02", 4)],
        ));
        observations[0].collected_at = Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());

        let forward = build_l2_result(&observations, ProtocolToggles::ALL).unwrap();
        observations.reverse();
        let reversed = build_l2_result(&observations, ProtocolToggles::ALL).unwrap();
        observations.rotate_left(1);
        let rotated = build_l2_result(&observations, ProtocolToggles::ALL).unwrap();

        let expected = serde_json::to_string(&forward).unwrap();
        assert_eq!(serde_json::to_string(&reversed).unwrap(), expected);
        assert_eq!(serde_json::to_string(&rotated).unwrap(), expected);
        assert_eq!(
            forward.collected_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_output_is_independent_of_row_order() {
        let mut observations = two_switch_fabric();
        let leaf = &mut observations[0];
        let mut duplicate = leaf.lldp_remotes[0].clone();
        leaf.lldp_remotes[0].management_address = "10.0.0.2".to_string();
        duplicate.management_address = "10.0.0.1".to_string();
        leaf.lldp_remotes.push(duplicate);
        leaf.fdb_entries = [200, 100]
            .into_iter()
            .map(|vlan| FdbRow {
                mac: "00:11:22:33:44:01".to_string(),
                bridge_port: 3,
                status: "learned".to_string(),
                vlan,
                ..Default::default()
            })
            .collect();

        let toggles = ProtocolToggles::ALL;
        let forward = build_l2_result(&observations, toggles).unwrap();
        for obs in &mut observations {
            obs.lldp_remotes.reverse();
            obs.fdb_entries.reverse();
        }
        let reversed = build_l2_result(&observations, toggles).unwrap();
        assert_eq!(
            serde_json::to_string(&reversed).unwrap(),
            serde_json::to_string(&forward).unwrap()
        );

        let lldp = forward
            .adjacencies
            .iter()
            .find(|a| a.protocol == Protocol::Lldp && a.source_device_id == "leaf1")
            .unwrap();
        assert_eq!(lldp.labels["remote_mgmt_ip"], "10.0.0.1");
        let fdb = forward
            .attachments
            .iter()
            .find(|a| a.device_id == "leaf1")
            .unwrap();
        assert_eq!(fdb.labels["vlan"], "100");
    }

    #[test]
    fn test_default_toggles_skip_endpoint_protocols() {
        let mut observations = two_switch_fabric();
        observations[0].fdb_entries = vec![FdbRow {
            mac: "00:11:22:33:44:01".to_string(),
            bridge_port: 1,
            status: "learned".to_string(),
            ..Default::default()
        }];
        observations[0].arp_entries = vec![ArpRow {
            ip: "10.0.0.5".to_string(),
            mac: "00:11:22:33:44:01".to_string(),
            ..Default::default()
        }];

        let result = build_l2_result(&observations, ProtocolToggles::default()).unwrap();
        assert!(result.attachments.is_empty());
        assert!(result.enrichments.is_empty());
        assert_eq!(result.stat(stats::LINKS_LLDP), 2);

        // every L2 counter is present even when zero
        for name in [
            stats::DEVICES_TOTAL,
            stats::LINKS_TOTAL,
            stats::LINKS_LLDP,
            stats::LINKS_CDP,
            stats::ATTACHMENTS_TOTAL,
            stats::ATTACHMENTS_FDB,
            stats::ENRICHMENTS_TOTAL,
            stats::ENRICHMENTS_ARP_ND,
            stats::BRIDGE_DOMAINS_TOTAL,
            stats::ENDPOINTS_TOTAL,
        ] {
            assert!(result.stats.contains_key(name), "missing stat {}", name);
        }
    }

    #[test]
    fn test_fdb_excludes_macs_the_switch_owns() {
        let mut switch = fdb_switch(
            "sw1",
            "00:00:00:00:00:01",
            &[("00:11:22:33:44:01", 3), ("00:11:22:33:44:02", 3)],
        );
        switch.fdb_entries.push(FdbRow {
            mac: "00:11:22:33:44:02".to_string(),
            bridge_port: 0,
            status: "self".to_string(),
            ..Default::default()
        });
        let toggles = ProtocolToggles {
            fdb: true,
            ..Default::default()
        };
        let result = build_l2_result(&[switch], toggles).unwrap();

        assert_eq!(result.attachments.len(), 1);
        assert_eq!(result.attachments[0].endpoint_id.as_str(), "mac:001122334401");
        assert_eq!(result.attachments[0].method, "fdb");
        assert_eq!(result.stat(stats::ATTACHMENTS_FDB), 1);
        assert_eq!(result.stat(stats::ENDPOINTS_TOTAL), 1);
        // LLDP and CDP stay off when any toggle is set
        assert!(result.adjacencies.is_empty());
    }

    #[test]
    fn test_bridge_domain_from_three_switch_chain() {
        let a = "00:00:00:00:00:0a";
        let b = "00:00:00:00:00:0b";
        let c = "00:00:00:00:00:0c";
        let observations = vec![
            fdb_switch("a", a, &[(b, 1)]),
            fdb_switch("b", b, &[(a, 1), (c, 2), ("00:11:22:33:44:55", 2)]),
            fdb_switch("c", c, &[(b, 1)]),
        ];
        let toggles = ProtocolToggles {
            bridge_domains: true,
            ..Default::default()
        };
        let result = build_l2_result(&observations, toggles).unwrap();

        assert_eq!(result.bridge_domains.len(), 1);
        let domain = &result.bridge_domains[0];
        assert_eq!(domain.root, "a");
        assert_eq!(
            domain.members.iter().cloned().collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert_eq!(domain.segments.len(), 2);
        let host_segment = domain
            .segments
            .iter()
            .find(|s| s.macs.contains("00:11:22:33:44:55"))
            .unwrap();
        assert_eq!(host_segment.designated.device_id, "b");

        assert_eq!(result.stat(stats::BRIDGE_DOMAINS_TOTAL), 1);
        // bridge domains pull FDB attachments in
        assert!(result.stat(stats::ATTACHMENTS_FDB) > 0);
    }

    #[test]
    fn test_arp_ip_only_rows_fold_into_mac_endpoint() {
        let observations = vec![
            DeviceObservation {
                device_id: "gw1".to_string(),
                arp_entries: vec![ArpRow {
                    ip: "10.0.0.5".to_string(),
                    mac: "00-11-22-33-44-55".to_string(),
                    if_index: 3,
                    state: "reachable".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            DeviceObservation {
                device_id: "gw2".to_string(),
                arp_entries: vec![ArpRow {
                    ip: "10.0.0.5".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            },
        ];
        let toggles = ProtocolToggles {
            arp_nd: true,
            ..Default::default()
        };
        let result = build_l2_result(&observations, toggles).unwrap();

        assert_eq!(result.enrichments.len(), 1);
        let enrichment = &result.enrichments[0];
        assert_eq!(enrichment.endpoint_id.as_str(), "mac:001122334455");
        assert_eq!(
            enrichment.device_ids.iter().cloned().collect::<Vec<_>>(),
            vec!["gw1", "gw2"]
        );
        assert!(enrichment.protocols.contains("arp"));
        assert_eq!(result.stat(stats::ENRICHMENTS_ARP_ND), 1);
    }

    #[test]
    fn test_l3_ospf_pair_reads_from_either_side() {
        let observations = vec![
            ospf_router("r1", "1.1.1.1", "10.0.0.1", "2.2.2.2", "10.0.0.2"),
            ospf_router("r2", "2.2.2.2", "10.0.0.2", "1.1.1.1", "10.0.0.1"),
        ];
        let result = build_l3_result(&observations).unwrap();

        assert_eq!(result.stat(stats::LINKS_OSPF), 2);
        assert_eq!(result.stat(stats::OSPF_PAIRS_TOTAL), 1);
        let pair = &result.ospf_pairs[0];
        let (local, remote) = pair.perspective("r2").unwrap();
        assert_eq!(local.device_id, "r2");
        assert_eq!(local.local_ip, "10.0.0.2");
        assert_eq!(remote.device_id, "r1");
        assert_eq!(remote.local_ip, "10.0.0.1");

        let adjacency = result.adjacencies_for(Protocol::Ospf).next().unwrap();
        assert!(adjacency.pair_id().is_some());
        assert_eq!(result.devices.len(), 2);
    }

    #[test]
    fn test_l3_unknown_ospf_neighbor_is_synthesized() {
        let observations = vec![ospf_router("r1", "1.1.1.1", "10.0.0.1", "9.9.9.9", "10.0.0.2")];
        let result = build_l3_result(&observations).unwrap();

        let synthetic = result.device("ospf-9.9.9.9").unwrap();
        assert_eq!(synthetic.labels["ospf_router_id"], "9.9.9.9");
        assert!(result.ospf_pairs.is_empty());
        assert_eq!(result.stat(stats::LINKS_OSPF), 1);
    }

    #[test]
    fn test_l3_isis_mirrored_systems_pair() {
        let observations = vec![
            isis_node("r1", "0000.0000.0001", "0000.0000.0002"),
            isis_node("r2", "0000.0000.0002", "0000.0000.0001"),
            isis_node("r3", "0000.0000.0003", "0000.0000.0009"),
        ];
        let result = build_l3_result(&observations).unwrap();

        assert_eq!(result.stat(stats::ISIS_PAIRS_TOTAL), 1);
        assert_eq!(result.stat(stats::LINKS_ISIS), 3);
        assert!(result.device("isis-000000000009").is_some());
        assert_eq!(result.isis_pairs[0].a.device_id, "r1");

        let l3_json = serde_json::to_value(&result).unwrap();
        assert!(l3_json.get("bridge_domains").is_none());
    }

    #[test]
    fn test_store_keeps_last_good_result() {
        let store = TopologyStore::new();
        store
            .rebuild(|| build_l2_result(&two_switch_fabric(), ProtocolToggles::default()))
            .unwrap();
        assert!(store.rebuild(|| build_l2_result(&[], ProtocolToggles::default())).is_err());

        let current = store.current().unwrap();
        assert_eq!(current.stat(stats::LINKS_LLDP), 2);
        assert!(store.last_failure().is_some());
    }
}
