//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use const_addrs::{ip, net};
use maplit::btreeset;
use stonework_puntmgr::api::CnfMode;
use stonework_puntmgr::error::Error;
use stonework_puntmgr::handler::abx::{abx_index, abx_label};
use stonework_puntmgr::punt::{
    AclProtocol, AclRule, HairpinInterface, L3Protocol, L4Protocol,
    PortRange, PortRanges, PuntConfig, PuntMetadata, PuntRequest, SocketPunt,
};
use stonework_puntmgr::southbound::{
    Abx, AbxAttachedInterface, Acl, AclAction, AclIpProtocol, AclIpRule,
    ChangeRequest, ConfigItem, DhcpProxy, DhcpServer, IsisXConnect,
    L2XConnect, PuntException, PuntToHost, Span, SpanDirection, VppInterface,
};
use stonework_puntmgr::testing::{TestEnv, deleted_items, updated_items};

fn udp_rule(destination: &str, lower: u16, upper: u16) -> AclRule {
    AclRule::new(
        String::new(),
        destination.to_owned(),
        AclProtocol::Udp(PortRanges::new(
            PortRange::default(),
            PortRange::new(lower, upper),
        )),
    )
}

fn abx_request(label: &str, vpp_interface: &str, rules: Vec<AclRule>) -> PuntRequest {
    PuntRequest::new(
        label,
        PuntConfig::Abx {
            vpp_interface: vpp_interface.to_owned(),
            vrf: 0,
            without_cnf_vrf: false,
            ingress_acl_rules: rules,
            egress_acl_rules: vec![],
        },
    )
}

fn span_request(label: &str) -> PuntRequest {
    PuntRequest::new(
        label,
        PuntConfig::Span {
            vpp_interface: "eth0".to_owned(),
        },
    )
}

fn isisx_request(label: &str) -> PuntRequest {
    PuntRequest::new(
        label,
        PuntConfig::Isisx {
            vpp_interface: "eth0".to_owned(),
            vrf: 0,
            without_cnf_vrf: false,
        },
    )
}

fn exception_request(label: &str, socket_path: &str) -> PuntRequest {
    PuntRequest::new(
        label,
        PuntConfig::PuntToSocket(SocketPunt::Exception {
            reason: "ipsec4-spi-0".to_owned(),
            socket_path: socket_path.to_owned(),
        }),
    )
}

fn acl_rule(destination: &str, lower: u16, upper: u16) -> AclIpRule {
    AclIpRule {
        action: AclAction::Permit,
        source_network: net!("0.0.0.0/0"),
        destination_network: destination.parse().unwrap(),
        protocol: AclIpProtocol::Udp(PortRanges::new(
            PortRange::default(),
            PortRange::new(lower, upper),
        )),
    }
}

// Returns the VPP name of the single interconnect of a punt.
fn vpp_end(metadata: &PuntMetadata) -> String {
    metadata.interconnects[0].vpp_interface().unwrap().name.clone()
}

fn find<'a, T>(
    items: &[&'a ConfigItem],
    f: impl Fn(&'a ConfigItem) -> Option<&'a T>,
) -> Vec<&'a T> {
    items.iter().filter_map(|item| f(*item)).collect()
}

fn acls<'a>(items: &[&'a ConfigItem]) -> Vec<&'a Acl> {
    find(items, |item| match item {
        ConfigItem::Acl(acl) => Some(acl),
        _ => None,
    })
}

fn abxs<'a>(items: &[&'a ConfigItem]) -> Vec<&'a Abx> {
    find(items, |item| match item {
        ConfigItem::Abx(abx) => Some(abx),
        _ => None,
    })
}

fn interfaces(txn: &ChangeRequest) -> usize {
    txn.ops()
        .filter(|(_, op)| {
            matches!(
                op.item(),
                ConfigItem::VppInterface(..) | ConfigItem::LinuxInterface(..)
            )
        })
        .count()
}

// Test description:
//
// Two ABX punts of the same CNF on the same VPP interface share one
// interconnect. Their rules are merged into a single ingress ACL, in the order
// in which the punts were added.
//
// Input:
//  * cnf1 punts SNMP (UDP 161-162 to local addresses) from eth0
//  * cnf1 punts syslog (UDP 514 to local addresses) from eth0
//  * both punts are removed
// Output:
//  * one interconnect, shared by the second punt
//  * ingress ACL with the SNMP rule first, attached with priority 1
//  * the ACL shrinks with the first removal, then disappears together with
//    the interconnect
#[tokio::test]
async fn abx_multiplexing() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    manager
        .add_punt(
            "cnf1",
            "config/snmp",
            abx_request("snmp", "eth0", vec![udp_rule("local", 161, 162)]),
        )
        .await
        .unwrap();
    manager
        .add_punt(
            "cnf1",
            "config/syslog",
            abx_request("syslog", "eth0", vec![udp_rule("local", 514, 514)]),
        )
        .await
        .unwrap();
    manager.flush().await;

    let snmp = manager
        .punt_metadata("cnf1", "config/snmp", "snmp")
        .await
        .unwrap();
    let syslog = manager
        .punt_metadata("cnf1", "config/syslog", "syslog")
        .await
        .unwrap();
    assert_eq!(snmp.interconnects.len(), 1);
    assert_eq!(syslog.interconnects.len(), 1);
    assert_eq!(snmp.interconnects[0].id, syslog.interconnects[0].id);
    assert_eq!(snmp.interconnects[0].id.vpp_selector, "vpp/interface/eth0");
    assert!(!snmp.interconnects[0].shared);
    assert!(syslog.interconnects[0].shared);

    // The CNF side borrows the addresses of eth0.
    let cnf = snmp.interconnects[0].cnf_interface().unwrap();
    assert_eq!(cnf.ip_addresses, vec![net!("10.0.0.1/24")]);

    let ic_name = vpp_end(&snmp);
    let ingress_label = abx_label("eth0", &ic_name);
    let commits = env.local_commits();
    assert_eq!(commits.len(), 2);

    // First punt: interconnect and ABX.
    let items = updated_items(&commits[0]);
    assert_eq!(interfaces(&commits[0]), 2);
    assert_eq!(
        acls(&items),
        vec![&Acl {
            name: ingress_label.clone(),
            rules: vec![acl_rule("10.0.0.1/32", 161, 162)],
        }]
    );
    assert_eq!(
        abxs(&items),
        vec![&Abx {
            index: abx_index(&ingress_label),
            acl_name: ingress_label.clone(),
            output_interface: ic_name.clone(),
            dst_mac: Some(cnf.phys_address),
            attached_interfaces: vec![AbxAttachedInterface {
                input_interface: "eth0".to_owned(),
                priority: 1,
            }],
        }]
    );

    // Second punt: merged ACL, same attachment.
    let items = updated_items(&commits[1]);
    assert_eq!(interfaces(&commits[1]), 0);
    assert_eq!(
        acls(&items)[0].rules,
        vec![
            acl_rule("10.0.0.1/32", 161, 162),
            acl_rule("10.0.0.1/32", 514, 514)
        ]
    );
    assert_eq!(abxs(&items)[0].attached_interfaces[0].priority, 1);

    // Removal of the first punt.
    manager
        .del_punt("cnf1", "config/snmp", "snmp")
        .await
        .unwrap();
    manager.flush().await;
    let commits = env.local_commits();
    assert_eq!(commits.len(), 3);
    assert_eq!(interfaces(&commits[2]), 0);
    let items = updated_items(&commits[2]);
    assert_eq!(acls(&items)[0].rules, vec![acl_rule("10.0.0.1/32", 514, 514)]);

    // Removal of the last punt.
    manager
        .del_punt("cnf1", "config/syslog", "syslog")
        .await
        .unwrap();
    manager.flush().await;
    let commits = env.local_commits();
    assert_eq!(commits.len(), 4);
    assert!(updated_items(&commits[3]).is_empty());
    let items = deleted_items(&commits[3]);
    assert_eq!(interfaces(&commits[3]), 2);
    assert!(acls(&items).iter().any(|acl| acl.name == ingress_label));
    assert!(
        abxs(&items)
            .iter()
            .any(|abx| abx.index == abx_index(&ingress_label))
    );
}

// Test description:
//
// ABX rules are expanded for every address family of the VPP interface.
//
// Input:
//  * ABX punt from eth1 (IPv4 and IPv6 addresses), UDP 53 to local addresses
//  * ABX punt from eth1 with an IPv6 rule
// Output:
//  * one rule per address family
//  * IPv6 rule only for the explicit IPv6 destination
#[tokio::test]
async fn abx_address_families() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    manager
        .add_punt(
            "cnf1",
            "config/dns",
            abx_request("dns", "eth1", vec![udp_rule("local", 53, 53)]),
        )
        .await
        .unwrap();
    manager
        .add_punt(
            "cnf1",
            "config/ntp",
            abx_request("ntp", "eth1", vec![udp_rule("2001:db8:2::/64", 123, 123)]),
        )
        .await
        .unwrap();
    manager.flush().await;

    let commits = env.local_commits();
    let items = updated_items(&commits[1]);
    let rules = &acls(&items)[0].rules;
    assert_eq!(rules.len(), 3);
    assert_eq!(rules[0].destination_network, net!("10.0.1.1/32"));
    assert_eq!(rules[1].destination_network, net!("2001:db8:1::1/128"));
    assert_eq!(rules[1].source_network, net!("::/0"));
    assert_eq!(rules[2].destination_network, net!("2001:db8:2::/64"));
    assert_eq!(rules[2].source_network, net!("::/0"));
}

// Test description:
//
// ABX punts with invalid rules are rejected without side effects.
//
// Input:
//  * IPv6 rule on eth0, which has IPv4 addresses only
//  * rule mixing IPv4 and IPv6 networks
// Output:
//  * ABX rule errors, nothing sent
//  * the interconnect of eth0 remains free
#[tokio::test]
async fn abx_invalid_rules() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    let error = manager
        .add_punt(
            "cnf1",
            "config/ntp",
            abx_request("ntp", "eth0", vec![udp_rule("2001:db8::/64", 123, 123)]),
        )
        .await
        .unwrap_err();
    assert!(matches!(error, Error::AbxRule(..)));

    let mut rule = udp_rule("2001:db8::/64", 123, 123);
    rule.source_network = "10.0.0.0/8".to_owned();
    let error = manager
        .add_punt("cnf1", "config/ntp", abx_request("ntp", "eth0", vec![rule]))
        .await
        .unwrap_err();
    assert!(matches!(error, Error::AbxRule(..)));

    manager.flush().await;
    assert!(env.log.events().is_empty());

    let request = PuntRequest::new(
        "xconnect",
        PuntConfig::HairpinXConnect {
            vpp_interface1: "eth0".to_owned(),
            vpp_interface2: "eth1".to_owned(),
        },
    );
    manager
        .add_punt("cnf1", "config/xconnect", request)
        .await
        .unwrap();
}

// Test description:
//
// ABX punts of different CNFs attached to the same VPP interface get their
// own interconnects and distinct priorities.
//
// Input:
//  * cnf1 and cnf2 both punt SNMP from eth0
// Output:
//  * two interconnects with the same VPP selector
//  * separate ACLs, attached to eth0 with priorities 1 and 2
#[tokio::test]
async fn abx_other_cnf() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    for cnf in ["cnf1", "cnf2"] {
        manager
            .add_punt(
                cnf,
                "config/snmp",
                abx_request("snmp", "eth0", vec![udp_rule("local", 161, 162)]),
            )
            .await
            .unwrap();
    }
    manager.flush().await;

    let cnf1 = manager
        .punt_metadata("cnf1", "config/snmp", "snmp")
        .await
        .unwrap();
    let cnf2 = manager
        .punt_metadata("cnf2", "config/snmp", "snmp")
        .await
        .unwrap();
    assert_ne!(cnf1.interconnects[0].id, cnf2.interconnects[0].id);
    assert_eq!(
        cnf1.interconnects[0].id.vpp_selector,
        cnf2.interconnects[0].id.vpp_selector
    );
    assert!(!cnf2.interconnects[0].shared);

    let commits = env.local_commits();
    assert_eq!(commits.len(), 2);
    for (txn, metadata, priority) in
        [(&commits[0], &cnf1, 1), (&commits[1], &cnf2, 2)]
    {
        let items = updated_items(txn);
        let abx = abxs(&items);
        assert_eq!(abx.len(), 1);
        assert_eq!(abx[0].acl_name, abx_label("eth0", &vpp_end(metadata)));
        assert_eq!(
            abx[0].attached_interfaces,
            vec![AbxAttachedInterface {
                input_interface: "eth0".to_owned(),
                priority,
            }]
        );
    }

    // The priority of a removed punt is reused.
    manager
        .del_punt("cnf1", "config/snmp", "snmp")
        .await
        .unwrap();
    manager
        .add_punt(
            "cnf1",
            "config/ntp",
            abx_request("ntp", "eth0", vec![udp_rule("local", 123, 123)]),
        )
        .await
        .unwrap();
    manager.flush().await;
    let commits = env.local_commits();
    let items = updated_items(commits.last().unwrap());
    assert_eq!(abxs(&items)[0].attached_interfaces[0].priority, 1);
}

// Test description:
//
// Hairpin punts cross-connect the VPP interface with its interconnect, and
// route the hairpin interface through a second one.
//
// Input:
//  * hairpin punt of eth3, hairpin interface "hairpin-eth3"
// Output:
//  * two interconnects, one of them named after the hairpin interface
//  * L2 cross-connects in both directions
#[tokio::test]
async fn hairpin() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    let request = PuntRequest::new(
        "hairpin",
        PuntConfig::Hairpin {
            vpp_interface: "eth3".to_owned(),
            hairpin_interface: HairpinInterface {
                name: "hairpin-eth3".to_owned(),
                ip_addresses: vec![net!("10.10.10.1/24")],
                mtu: 1500,
                ..Default::default()
            },
        },
    );
    manager
        .add_punt("cnf1", "config/hairpin", request)
        .await
        .unwrap();
    manager.flush().await;

    let metadata = manager
        .punt_metadata("cnf1", "config/hairpin", "hairpin")
        .await
        .unwrap();
    assert_eq!(metadata.interconnects.len(), 2);
    let ic_name = vpp_end(&metadata);

    let commits = env.local_commits();
    let items = updated_items(&commits[0]);
    let hairpin_iface = find(&items, |item| match item {
        ConfigItem::VppInterface(iface) if iface.name == "hairpin-eth3" => {
            Some(iface)
        }
        _ => None,
    });
    assert_eq!(hairpin_iface.len(), 1);
    assert_eq!(hairpin_iface[0].ip_addresses, vec![net!("10.10.10.1/24")]);
    assert_eq!(hairpin_iface[0].mtu, 1500);

    let xconnects = find(&items, |item| match item {
        ConfigItem::L2XConnect(xc) => Some(xc),
        _ => None,
    });
    assert_eq!(
        xconnects,
        vec![
            &L2XConnect {
                receive_interface: "eth3".to_owned(),
                transmit_interface: ic_name.clone(),
            },
            &L2XConnect {
                receive_interface: ic_name,
                transmit_interface: "eth3".to_owned(),
            },
        ]
    );

    // A hairpin excludes any other punt on the same VPP interface.
    let error = manager
        .add_punt(
            "cnf1",
            "config/snmp",
            abx_request("snmp", "eth3", vec![udp_rule("local", 161, 162)]),
        )
        .await
        .unwrap_err();
    assert!(matches!(error, Error::InterconnectConflict(..)));
}

// Test description:
//
// Hairpin XConnect punts match every VPP interface with its own
// interconnect.
//
// Input:
//  * hairpin xconnect punt between eth0 and eth1
// Output:
//  * four L2 cross-connects, each VPP interface paired with the interconnect
//    selected for it
//  * everything removed on deletion
#[tokio::test]
async fn hairpin_xconnect() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    let request = PuntRequest::new(
        "xconnect",
        PuntConfig::HairpinXConnect {
            vpp_interface1: "eth0".to_owned(),
            vpp_interface2: "eth1".to_owned(),
        },
    );
    manager
        .add_punt("cnf1", "config/xconnect", request)
        .await
        .unwrap();
    manager.flush().await;

    let metadata = manager
        .punt_metadata("cnf1", "config/xconnect", "xconnect")
        .await
        .unwrap();
    assert_eq!(metadata.interconnects.len(), 2);
    let commits = env.local_commits();
    let items = updated_items(&commits[0]);
    let xconnects = find(&items, |item| match item {
        ConfigItem::L2XConnect(xc) => Some(xc),
        _ => None,
    });
    let ic1 = &metadata.interconnects[0].vpp_interface().unwrap().name;
    let ic2 = &metadata.interconnects[1].vpp_interface().unwrap().name;
    let pairs = xconnects
        .iter()
        .map(|xc| (xc.receive_interface.as_str(), xc.transmit_interface.as_str()))
        .collect::<BTreeSet<_>>();
    assert_eq!(
        pairs,
        btreeset! {
            ("eth0", ic1.as_str()),
            (ic1.as_str(), "eth0"),
            ("eth1", ic2.as_str()),
            (ic2.as_str(), "eth1"),
        }
    );
    assert_eq!(xconnects.len(), 4);

    manager
        .del_punt("cnf1", "config/xconnect", "xconnect")
        .await
        .unwrap();
    manager.flush().await;
    let commits = env.local_commits();
    assert_eq!(deleted_items(&commits[1]).len(), updated_items(&commits[0]).len());
}

// Test description:
//
// SPAN punts of the same VPP interface share the mirror and its
// interconnect. The mirror lives as long as one of them does.
//
// Input:
//  * two SPAN punts of eth0, removed one after the other
// Output:
//  * single mirror created with the first punt
//  * nothing sent for the second punt nor for the first removal
//  * mirror and interconnect removed with the last punt
#[tokio::test]
async fn span_sharing() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    manager
        .add_punt("cnf1", "config/span1", span_request("span1"))
        .await
        .unwrap();
    manager
        .add_punt("cnf1", "config/span2", span_request("span2"))
        .await
        .unwrap();
    manager.flush().await;

    let metadata = manager
        .punt_metadata("cnf1", "config/span1", "span1")
        .await
        .unwrap();
    let span = Span {
        interface_from: "eth0".to_owned(),
        interface_to: vpp_end(&metadata),
        direction: SpanDirection::Both,
    };
    let commits = env.local_commits();
    assert_eq!(commits.len(), 1);
    assert!(updated_items(&commits[0]).contains(&&ConfigItem::Span(span.clone())));

    manager
        .del_punt("cnf1", "config/span1", "span1")
        .await
        .unwrap();
    manager.flush().await;
    assert_eq!(env.local_commits().len(), 1);

    manager
        .del_punt("cnf1", "config/span2", "span2")
        .await
        .unwrap();
    manager.flush().await;
    let commits = env.local_commits();
    assert_eq!(commits.len(), 2);
    assert!(deleted_items(&commits[1]).contains(&&ConfigItem::Span(span)));
    assert_eq!(interfaces(&commits[1]), 2);
}

// Test description:
//
// ISIS cross-connects are shared by the ISISX punts of a VPP interface and
// removed with the last of them.
//
// Input:
//  * two ISISX punts of eth0, removed one after the other
// Output:
//  * cross-connects in both directions created once
//  * cross-connects deleted with the last punt only
#[tokio::test]
async fn isisx_refcount() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    manager
        .add_punt("cnf1", "config/isis1", isisx_request("isis1"))
        .await
        .unwrap();
    manager
        .add_punt("cnf1", "config/isis2", isisx_request("isis2"))
        .await
        .unwrap();
    manager.flush().await;

    let metadata = manager
        .punt_metadata("cnf1", "config/isis1", "isis1")
        .await
        .unwrap();
    let ic_name = vpp_end(&metadata);
    let xconnects = [
        ConfigItem::IsisXConnect(IsisXConnect {
            input_interface: "eth0".to_owned(),
            output_interface: ic_name.clone(),
        }),
        ConfigItem::IsisXConnect(IsisXConnect {
            input_interface: ic_name,
            output_interface: "eth0".to_owned(),
        }),
    ];
    let commits = env.local_commits();
    let items = updated_items(&commits[0]);
    assert!(xconnects.iter().all(|xc| items.contains(&xc)));

    manager
        .del_punt("cnf1", "config/isis1", "isis1")
        .await
        .unwrap();
    manager.flush().await;
    let commits = env.local_commits();
    assert!(
        commits
            .iter()
            .all(|txn| deleted_items(txn).is_empty())
    );

    manager
        .del_punt("cnf1", "config/isis2", "isis2")
        .await
        .unwrap();
    manager.flush().await;
    let commits = env.local_commits();
    let items = deleted_items(commits.last().unwrap());
    assert!(xconnects.iter().all(|xc| items.contains(&xc)));
    assert_eq!(interfaces(commits.last().unwrap()), 2);
}

// Test description:
//
// ABX and ISISX punts of the same CNF can ride the same interconnect.
//
// Input:
//  * ABX punt then ISISX punt of eth0
// Output:
//  * same interconnect, shared by the ISISX punt
#[tokio::test]
async fn abx_and_isisx() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    manager
        .add_punt(
            "cnf1",
            "config/snmp",
            abx_request("snmp", "eth0", vec![udp_rule("local", 161, 162)]),
        )
        .await
        .unwrap();
    manager
        .add_punt("cnf1", "config/isis", isisx_request("isis"))
        .await
        .unwrap();

    let abx = manager
        .punt_metadata("cnf1", "config/snmp", "snmp")
        .await
        .unwrap();
    let isisx = manager
        .punt_metadata("cnf1", "config/isis", "isis")
        .await
        .unwrap();
    assert_eq!(abx.interconnects[0].id, isisx.interconnects[0].id);
    assert!(isisx.interconnects[0].shared);
}

// Test description:
//
// DHCP proxy punts relay DHCP requests of a VRF to the CNF over an
// interconnect addressed from the allocation pool.
//
// Input:
//  * DHCP proxy punt of VRF 0
// Output:
//  * interconnect addressed with the first /30 of the pool
//  * DHCP proxy from the VPP end to the CNF end
#[tokio::test]
async fn dhcp_proxy() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    let request = PuntRequest::new(
        "dhcp",
        PuntConfig::DhcpProxy {
            vrf: 0,
            without_cnf_vrf: false,
        },
    );
    manager
        .add_punt("cnf1", "config/dhcp", request)
        .await
        .unwrap();
    manager.flush().await;

    let metadata = manager
        .punt_metadata("cnf1", "config/dhcp", "dhcp")
        .await
        .unwrap();
    let ic = &metadata.interconnects[0];
    assert_eq!(ic.id.vpp_selector, "vpp/vrf/0");
    assert_eq!(
        ic.vpp_interface().unwrap().ip_addresses,
        vec![net!("192.168.111.1/30")]
    );
    assert_eq!(
        ic.cnf_interface().unwrap().ip_addresses,
        vec![net!("192.168.111.2/30")]
    );

    let commits = env.local_commits();
    let items = updated_items(&commits[0]);
    assert!(items.contains(&&ConfigItem::DhcpProxy(DhcpProxy {
        rx_vrf_id: 0,
        source_ip_address: ip!("192.168.111.1"),
        servers: vec![DhcpServer {
            vrf_id: 0,
            ip_address: ip!("192.168.111.2"),
        }],
    })));
    let vpp_ifaces: Vec<&VppInterface> = find(&items, |item| match item {
        ConfigItem::VppInterface(iface) => Some(iface),
        _ => None,
    });
    assert_eq!(vpp_ifaces.len(), 1);
    assert_eq!(vpp_ifaces[0].ip_addresses, vec![net!("192.168.111.1/30")]);
}

// Test description:
//
// Punt-to-socket punts register the socket of the CNF with VPP, and don't
// create any interface.
//
// Input:
//  * exception punt to /run/cnf1/ipsec.sock
//  * to-host punt of UDP port 4789
//  * second exception punt with the same reason
// Output:
//  * socket interconnects with the socket paths
//  * registrations committed, no interface created
//  * the second exception punt conflicts with the first one
#[tokio::test]
async fn punt_to_socket() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    manager
        .add_punt(
            "cnf1",
            "config/ipsec",
            exception_request("ipsec", "/run/cnf1/ipsec.sock"),
        )
        .await
        .unwrap();
    let request = PuntRequest::new(
        "vxlan",
        PuntConfig::PuntToSocket(SocketPunt::ToHost {
            l3_protocol: L3Protocol::Ipv4,
            l4_protocol: L4Protocol::Udp,
            port: 4789,
            socket_path: "/run/cnf1/vxlan.sock".to_owned(),
        }),
    );
    manager
        .add_punt("cnf1", "config/vxlan", request)
        .await
        .unwrap();
    manager.flush().await;

    let metadata = manager
        .punt_metadata("cnf1", "config/ipsec", "ipsec")
        .await
        .unwrap();
    assert_eq!(
        metadata.interconnects[0].socket_path(),
        Some("/run/cnf1/ipsec.sock")
    );

    let commits = env.local_commits();
    assert_eq!(commits.len(), 2);
    assert!(commits.iter().all(|txn| interfaces(txn) == 0));
    assert_eq!(
        updated_items(&commits[0]),
        vec![&ConfigItem::PuntException(PuntException {
            reason: "ipsec4-spi-0".to_owned(),
            socket_path: "/run/cnf1/ipsec.sock".to_owned(),
        })]
    );
    assert_eq!(
        updated_items(&commits[1]),
        vec![&ConfigItem::PuntToHost(PuntToHost {
            l3_protocol: L3Protocol::Ipv4,
            l4_protocol: L4Protocol::Udp,
            port: 4789,
            socket_path: "/run/cnf1/vxlan.sock".to_owned(),
        })]
    );

    let error = manager
        .add_punt(
            "cnf2",
            "config/ipsec",
            exception_request("ipsec", "/run/cnf2/ipsec.sock"),
        )
        .await
        .unwrap_err();
    assert!(matches!(error, Error::InterconnectConflict(..)));
}
