//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use stonework_puntmgr::api::CnfMode;
use stonework_puntmgr::config::Config;
use stonework_puntmgr::error::Error;
use stonework_puntmgr::notification::notification_key;
use stonework_puntmgr::punt::{
    AclProtocol, AclRule, HairpinInterface, InterconnectType, PortRange,
    PortRanges, PuntConfig, PuntId, PuntMetadata, PuntRequest, PuntState,
};
use stonework_puntmgr::southbound::{
    ConfigItem, DependencyTarget, INTERNAL_CONFIG_LABEL_KEY, microservice_key,
};
use stonework_puntmgr::testing::{
    AGENT_LABEL, Event, LOCAL_TARGET, TestEnv, deleted_items, updated_items,
};

fn snmp_request() -> PuntRequest {
    PuntRequest::new(
        "snmp",
        PuntConfig::Abx {
            vpp_interface: "eth0".to_owned(),
            vrf: 0,
            without_cnf_vrf: false,
            ingress_acl_rules: vec![AclRule::new(
                "any".to_owned(),
                "local".to_owned(),
                AclProtocol::Udp(PortRanges::new(
                    PortRange::default(),
                    PortRange::new(161, 162),
                )),
            )],
            egress_acl_rules: vec![],
        },
    )
}

fn hairpin_request() -> PuntRequest {
    PuntRequest::new(
        "hairpin",
        PuntConfig::Hairpin {
            vpp_interface: "eth3".to_owned(),
            hairpin_interface: HairpinInterface {
                name: "hairpin-eth3".to_owned(),
                ip_addresses: vec!["10.10.10.1/24".parse().unwrap()],
                ..Default::default()
            },
        },
    )
}

fn cnf1_punt(key: &str, label: &str) -> PuntId {
    PuntId::new("cnf1".to_owned(), key.to_owned(), label.to_owned())
}

fn punt_notification_key(id: &PuntId) -> String {
    notification_key(&id.cnf_ms_label, &id.key, &id.label)
}

// Reduces the event log to a comparable trace.
fn trace(env: &TestEnv) -> Vec<String> {
    env.log
        .events()
        .into_iter()
        .map(|event| match event {
            Event::Commit(target, txn) => {
                let op = if txn.ops().all(|(_, op)| op.is_delete()) {
                    "delete"
                } else {
                    "update"
                };
                format!("commit {target} {op}")
            }
            Event::PuntStateUpdate(target, _, state) => {
                format!("punt-state {target} {state}")
            }
            Event::Notification(key, Some(())) => format!("created {key}"),
            Event::Notification(key, None) => format!("removed {key}"),
        })
        .collect()
}

// Test description:
//
// A punt added by a standalone CNF is realized locally and announced once its
// configuration has been sent. Removing it retracts the configuration.
//
// Input:
//  * add an ABX punt for cnf1, then delete it
// Output:
//  * local commits with the interconnect and ABX configuration
//  * "created" notification, then "removed" notification
//  * the punt is forgotten after deletion
#[tokio::test]
async fn lifecycle_standalone() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    manager
        .add_punt("cnf1", "config/snmp", snmp_request())
        .await
        .unwrap();
    manager.flush().await;

    let commits = env.local_commits();
    assert_eq!(commits.len(), 1);
    assert!(commits[0].labels().contains_key(INTERNAL_CONFIG_LABEL_KEY));
    let items = updated_items(&commits[0]);
    assert!(
        items
            .iter()
            .any(|item| matches!(item, ConfigItem::VppInterface(..)))
    );
    assert!(
        items
            .iter()
            .any(|item| matches!(item, ConfigItem::LinuxInterface(..)))
    );
    assert!(items.iter().any(|item| matches!(item, ConfigItem::Abx(..))));

    let id = cnf1_punt("config/snmp", "snmp");
    let key = punt_notification_key(&id);
    assert_eq!(env.notifications(), vec![(key.clone(), Some(()))]);
    let metadata = manager
        .punt_metadata("cnf1", "config/snmp", "snmp")
        .await
        .unwrap();
    assert_eq!(metadata.id, id);
    assert_eq!(metadata.interconnects.len(), 1);

    manager.del_punt("cnf1", "config/snmp", "snmp").await.unwrap();
    manager.flush().await;

    let commits = env.local_commits();
    assert_eq!(commits.len(), 2);
    assert!(commits[1].ops().all(|(_, op)| op.is_delete()));
    assert_eq!(
        env.notifications(),
        vec![(key.clone(), Some(())), (key, None)]
    );
    assert!(
        manager
            .punt_metadata("cnf1", "config/snmp", "snmp")
            .await
            .is_none()
    );
}

// Test description:
//
// Deleting a punt twice is harmless.
//
// Input:
//  * add a punt, delete it twice
// Output:
//  * the second deletion fails with "unknown punt" and sends nothing
#[tokio::test]
async fn idempotent_teardown() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    manager
        .add_punt("cnf1", "config/snmp", snmp_request())
        .await
        .unwrap();
    manager.del_punt("cnf1", "config/snmp", "snmp").await.unwrap();
    manager.flush().await;
    let events = env.log.events().len();

    let error = manager
        .del_punt("cnf1", "config/snmp", "snmp")
        .await
        .unwrap_err();
    assert!(matches!(error, Error::UnknownPunt(..)));
    manager.flush().await;
    assert_eq!(env.log.events().len(), events);
}

// Test description:
//
// A punt can't be added twice.
//
// Input:
//  * add the same punt twice
// Output:
//  * the second attempt fails and leaves the first punt untouched
#[tokio::test]
async fn duplicate_punt() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    manager
        .add_punt("cnf1", "config/snmp", snmp_request())
        .await
        .unwrap();
    let error = manager
        .add_punt("cnf1", "config/snmp", snmp_request())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::PuntExists(..)));

    manager.flush().await;
    assert_eq!(env.local_commits().len(), 1);
    assert_eq!(manager.all_cnf_punts("cnf1").await.len(), 1);
}

// Test description:
//
// Standalone CNFs can't use memif interconnects.
//
// Input:
//  * add a punt requesting a memif interconnect in standalone mode
// Output:
//  * the request is rejected before anything is allocated
#[tokio::test]
async fn memif_in_standalone() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    let mut request = snmp_request();
    request.interconnect_type = InterconnectType::Memif;
    let error = manager
        .add_punt("cnf1", "config/snmp", request)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::MemifInStandalone));

    manager.flush().await;
    assert!(env.log.events().is_empty());
    assert!(manager.all_cnf_punts("cnf1").await.is_empty());
}

// Test description:
//
// StoneWork modules never realize punts themselves.
//
// Input:
//  * add a punt in the StoneWork module mode
// Output:
//  * panic
#[tokio::test]
#[should_panic]
async fn add_punt_in_module_mode() {
    let env = TestEnv::new(CnfMode::StoneworkModule);
    let _ = env
        .manager
        .add_punt("cnf1", "config/snmp", snmp_request())
        .await;
}

// Test description:
//
// In StoneWork, punts of a module are realized on both sides and the module
// is informed about every state change.
//
// Input:
//  * add an ABX punt for cnf1, then delete it
// Output:
//  * INIT is sent synchronously, CREATED once both sides are configured
//  * the CNF side of the interconnect is committed to the module
//  * on removal, the module is informed and configured before VPP
#[tokio::test]
async fn lifecycle_stonework() {
    let env = TestEnv::new(CnfMode::Stonework);
    let manager = &env.manager;
    let id = cnf1_punt("config/snmp", "snmp");
    let key = punt_notification_key(&id);

    manager
        .add_punt("cnf1", "config/snmp", snmp_request())
        .await
        .unwrap();
    manager.flush().await;

    assert_eq!(
        trace(&env),
        vec![
            "punt-state cnf1 INIT".to_owned(),
            format!("commit {LOCAL_TARGET} update"),
            "commit cnf1 update".to_owned(),
            "punt-state cnf1 CREATED".to_owned(),
            format!("created {key}"),
        ]
    );
    let remote_commits = env.registry.cfg_client("cnf1").commits();
    assert_eq!(remote_commits.len(), 1);
    let remote_items = updated_items(&remote_commits[0]);
    assert_eq!(remote_items.len(), 1);
    assert!(matches!(remote_items[0], ConfigItem::LinuxInterface(..)));
    assert!(
        updated_items(&env.local_commits()[0])
            .iter()
            .all(|item| !matches!(item, ConfigItem::LinuxInterface(..)))
    );

    // The metadata sent to the module matches the local record.
    let states = env.registry.punt_client("cnf1").punt_states();
    let metadata = manager
        .punt_metadata("cnf1", "config/snmp", "snmp")
        .await
        .unwrap();
    assert_eq!(states[0].0, metadata);

    env.log.clear();
    manager.del_punt("cnf1", "config/snmp", "snmp").await.unwrap();
    manager.flush().await;

    assert_eq!(
        trace(&env),
        vec![
            "punt-state cnf1 DELETED".to_owned(),
            format!("removed {key}"),
            "commit cnf1 delete".to_owned(),
            format!("commit {LOCAL_TARGET} delete"),
        ]
    );
}

// Test description:
//
// Punts of the StoneWork agent itself are realized locally, even in StoneWork
// mode.
//
// Input:
//  * add a punt with an empty CNF label in StoneWork mode
// Output:
//  * no punt state update, single local commit
//  * the punt is listed under the agent label
#[tokio::test]
async fn agent_punt_in_stonework() {
    let env = TestEnv::new(CnfMode::Stonework);
    let manager = &env.manager;

    manager
        .add_punt("", "config/snmp", snmp_request())
        .await
        .unwrap();
    manager.flush().await;

    let id =
        PuntId::new(AGENT_LABEL.to_owned(), "config/snmp".to_owned(), "snmp".to_owned());
    assert_eq!(
        trace(&env),
        vec![
            format!("commit {LOCAL_TARGET} update"),
            format!("created {}", punt_notification_key(&id)),
        ]
    );
    assert_eq!(manager.all_cnf_punts("").await.len(), 1);
    assert_eq!(manager.all_cnf_punts(AGENT_LABEL).await.len(), 1);
    assert!(manager.all_cnf_punts("cnf1").await.is_empty());
}

// Test description:
//
// A punt of a CNF unknown to the registry is rejected.
//
// Input:
//  * add a punt for cnf3 in StoneWork mode
// Output:
//  * registry error, nothing sent or stored
#[tokio::test]
async fn unknown_cnf() {
    let env = TestEnv::new(CnfMode::Stonework);
    let manager = &env.manager;

    let error = manager
        .add_punt("cnf3", "config/snmp", snmp_request())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::CnfRegistry(..)));

    manager.flush().await;
    assert!(env.log.events().is_empty());
    assert!(manager.all_cnf_punts("cnf3").await.is_empty());
}

// Test description:
//
// Failing commits and RPCs are logged, never propagated. The punt still
// becomes CREATED.
//
// Input:
//  * module config client and punt state client both failing
//  * add a punt for cnf1
// Output:
//  * local commit and "created" notification only
#[tokio::test]
async fn remote_failures() {
    let env = TestEnv::new(CnfMode::Stonework);
    let manager = &env.manager;
    env.registry.cfg_client("cnf1").set_fail(true);
    env.registry.punt_client("cnf1").set_fail(true);

    manager
        .add_punt("cnf1", "config/snmp", snmp_request())
        .await
        .unwrap();
    manager.flush().await;

    let id = cnf1_punt("config/snmp", "snmp");
    assert_eq!(
        trace(&env),
        vec![
            format!("commit {LOCAL_TARGET} update"),
            format!("created {}", punt_notification_key(&id)),
        ]
    );
}

// Test description:
//
// Punt state updates sent to a module are bounded by the RPC timeout.
//
// Input:
//  * 1s RPC timeout, module answering after 3s
//  * add a punt for cnf1
// Output:
//  * the punt is added and created anyway
//  * no punt state update recorded by the module
#[tokio::test]
async fn rpc_timeout() {
    let config = Config {
        rpc_timeout_secs: 1,
        ..Default::default()
    };
    let env = TestEnv::with_config(CnfMode::Stonework, config);
    let manager = &env.manager;
    env.registry
        .punt_client("cnf1")
        .set_delay(Some(Duration::from_secs(3)));

    manager
        .add_punt("cnf1", "config/snmp", snmp_request())
        .await
        .unwrap();
    manager.flush().await;

    assert!(env.registry.punt_client("cnf1").punt_states().is_empty());
    let id = cnf1_punt("config/snmp", "snmp");
    assert_eq!(
        env.notifications(),
        vec![(punt_notification_key(&id), Some(()))]
    );
}

// Test description:
//
// Pushes of the same punt are sent in order, even if the punt is removed
// before its creation was sent.
//
// Input:
//  * add a punt and delete it right away
// Output:
//  * creation committed before removal
//  * the last notification is "removed"
#[tokio::test]
async fn push_ordering() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    manager
        .add_punt("cnf1", "config/snmp", snmp_request())
        .await
        .unwrap();
    manager.del_punt("cnf1", "config/snmp", "snmp").await.unwrap();
    manager.flush().await;

    let commits = env.local_commits();
    assert_eq!(commits.len(), 2);
    assert!(deleted_items(&commits[0]).is_empty());
    assert!(updated_items(&commits[1]).is_empty());

    let id = cnf1_punt("config/snmp", "snmp");
    assert_eq!(
        env.notifications().last(),
        Some(&(punt_notification_key(&id), None))
    );
}

// Test description:
//
// A punt deleted and added again before its first configuration was sent is
// announced only once the configuration of the new incarnation was sent.
//
// Input:
//  * add a punt, delete it and add it again right away
// Output:
//  * creation, removal and creation committed in that order
//  * the "created" notification follows the last commit
#[tokio::test]
async fn readd_before_push() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    manager
        .add_punt("cnf1", "config/snmp", snmp_request())
        .await
        .unwrap();
    manager.del_punt("cnf1", "config/snmp", "snmp").await.unwrap();
    manager
        .add_punt("cnf1", "config/snmp", snmp_request())
        .await
        .unwrap();
    manager.flush().await;

    let id = cnf1_punt("config/snmp", "snmp");
    let key = punt_notification_key(&id);
    let trace = trace(&env)
        .into_iter()
        .filter(|event| !event.starts_with("removed"))
        .collect::<Vec<_>>();
    assert_eq!(
        trace,
        vec![
            "commit local update".to_owned(),
            "commit local delete".to_owned(),
            "commit local update".to_owned(),
            format!("created {key}"),
        ]
    );
    assert_eq!(env.notifications().last(), Some(&(key, Some(()))));
}

// Test description:
//
// A punt whose VPP-side configuration can't be built releases its
// interconnects.
//
// Input:
//  * ABX punt on eth2, which has no address
//  * hairpin punt on eth2
// Output:
//  * the ABX punt fails, nothing is sent
//  * the hairpin punt gets the interconnect of eth2
#[tokio::test]
async fn rollback_on_handler_failure() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    let mut request = snmp_request();
    let PuntConfig::Abx { vpp_interface, .. } = &mut request.config else {
        unreachable!()
    };
    *vpp_interface = "eth2".to_owned();
    let error = manager
        .add_punt("cnf1", "config/abx", request)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::InterfaceWithoutAddress(..)));
    manager.flush().await;
    assert!(env.log.events().is_empty());

    let mut request = hairpin_request();
    let PuntConfig::Hairpin { vpp_interface, .. } = &mut request.config else {
        unreachable!()
    };
    *vpp_interface = "eth2".to_owned();
    manager
        .add_punt("cnf1", "config/hairpin", request)
        .await
        .unwrap();
    manager.flush().await;
    assert_eq!(env.local_commits().len(), 1);
}

// Test description:
//
// Punt states received from StoneWork drive the punt records of a module.
//
// Input:
//  * sequence of state updates, some of them out of order
// Output:
//  * CREATED without INIT is rejected, INIT twice is rejected
//  * "created" notified once, "removed" only for created punts
//  * UNKNOWN is ignored
#[tokio::test]
async fn punt_state_updates() {
    let env = TestEnv::new(CnfMode::StoneworkModule);
    let manager = &env.manager;
    let id1 = cnf1_punt("config/snmp", "snmp");
    let id2 = cnf1_punt("config/syslog", "syslog");
    let metadata1 = PuntMetadata::new(id1.clone(), vec![]);
    let metadata2 = PuntMetadata::new(id2.clone(), vec![]);
    let key1 = punt_notification_key(&id1);

    let error = manager
        .update_punt_state(metadata1.clone(), PuntState::Created)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::MissingInitState(..)));

    manager
        .update_punt_state(metadata1.clone(), PuntState::Init)
        .await
        .unwrap();
    let error = manager
        .update_punt_state(metadata1.clone(), PuntState::Init)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::PuntAlreadyKnown(..)));
    assert!(env.notifications().is_empty());

    manager
        .update_punt_state(metadata1.clone(), PuntState::Unknown)
        .await
        .unwrap();
    manager
        .update_punt_state(metadata1.clone(), PuntState::Created)
        .await
        .unwrap();
    manager
        .update_punt_state(metadata1.clone(), PuntState::Created)
        .await
        .unwrap();
    assert_eq!(env.notifications(), vec![(key1.clone(), Some(()))]);
    assert_eq!(
        manager.punt_metadata("cnf1", "config/snmp", "snmp").await,
        Some(metadata1.clone())
    );

    manager
        .update_punt_state(metadata1.clone(), PuntState::Deleted)
        .await
        .unwrap();
    manager
        .update_punt_state(metadata1.clone(), PuntState::Deleted)
        .await
        .unwrap();
    assert_eq!(
        env.notifications(),
        vec![(key1.clone(), Some(())), (key1, None)]
    );

    // Removed before being created: no notification.
    manager
        .update_punt_state(metadata2.clone(), PuntState::Init)
        .await
        .unwrap();
    manager
        .update_punt_state(metadata2, PuntState::Deleted)
        .await
        .unwrap();
    assert_eq!(env.notifications().len(), 2);
    assert!(manager.all_cnf_punts("cnf1").await.is_empty());
}

// Test description:
//
// Punts learned from StoneWork can't be removed locally.
//
// Input:
//  * INIT received for a punt in a standalone manager, then local deletion
// Output:
//  * "unknown punt" error
#[tokio::test]
async fn delete_learned_punt() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;
    let id = cnf1_punt("config/snmp", "snmp");

    manager
        .update_punt_state(PuntMetadata::new(id, vec![]), PuntState::Init)
        .await
        .unwrap();
    let error = manager
        .del_punt("cnf1", "config/snmp", "snmp")
        .await
        .unwrap_err();
    assert!(matches!(error, Error::UnknownPunt(..)));
}

// Test description:
//
// Metadata of every punt of a CNF can be listed.
//
// Input:
//  * ABX and hairpin punts for cnf1, ABX punt for cnf2
// Output:
//  * two punts listed for cnf1, one for cnf2
//  * the hairpin punt has two interconnects
#[tokio::test]
async fn cnf_punts() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;

    manager
        .add_punt("cnf1", "config/snmp", snmp_request())
        .await
        .unwrap();
    manager
        .add_punt("cnf1", "config/hairpin", hairpin_request())
        .await
        .unwrap();
    let mut request = snmp_request();
    let PuntConfig::Abx { vpp_interface, .. } = &mut request.config else {
        unreachable!()
    };
    *vpp_interface = "eth1".to_owned();
    manager
        .add_punt("cnf2", "config/snmp", request)
        .await
        .unwrap();
    manager.flush().await;

    let punts = manager.all_cnf_punts("cnf1").await;
    assert_eq!(punts.len(), 2);
    let hairpin = punts
        .iter()
        .find(|metadata| metadata.id.label == "hairpin")
        .unwrap();
    assert_eq!(hairpin.interconnects.len(), 2);
    assert_eq!(manager.all_cnf_punts("cnf2").await.len(), 1);
}

// Test description:
//
// Punts of other microservices depend on the microservice itself.
//
// Input:
//  * dependencies of an ABX punt requested by cnf1 and by the agent
// Output:
//  * microservice dependency first for cnf1, absent for the agent
//  * handler dependencies follow
#[tokio::test]
async fn punt_dependencies() {
    let env = TestEnv::new(CnfMode::Standalone);
    let manager = &env.manager;
    let request = snmp_request();

    let deps = manager.punt_dependencies("cnf1", &request).await;
    assert_eq!(deps.len(), 2);
    assert_eq!(deps[0].label, "snmp-cnf-microservice");
    assert_eq!(
        deps[0].target,
        DependencyTarget::Key(microservice_key("cnf1"))
    );
    assert_eq!(deps[1].label, "snmp-abx-eth0");

    let deps = manager.punt_dependencies("", &request).await;
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].label, "snmp-abx-eth0");

    assert_eq!(manager.linux_vrf_name(10), "vrf-10");
}
