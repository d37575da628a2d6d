use std::{sync::Arc, thread, time::Duration};

use log::LevelFilter;

use layered_broadcast::{
    broadcaster::{BroadcastMode, Broadcaster},
    config::Configuration,
    networking::{FairLossLink, LinkError, UdpTransport},
    stop::Stoppable,
    types::{Host, ProcessID},
};

mod common;

use common::{check_output, count_delivered, logging::setup_logger, wait_until};

fn loopback_hosts(first_port: u16, n: u16) -> Vec<Host> {
    (0..n)
        .map(|i| {
            Host::new(
                ProcessID::new(i as u64 + 1),
                format!("127.0.0.1:{}", first_port + i).parse().unwrap(),
            )
        })
        .collect()
}

fn loopback_configuration(me: u64, hosts: &[Host]) -> Configuration {
    Configuration::builder()
        .me(ProcessID::new(me))
        .hosts(hosts.to_vec())
        .retransmit_interval(Duration::from_millis(10))
        .poll_interval(Duration::from_millis(10))
        .log_events(true)
        .build()
}

/// Smoke test of the whole stack over UDP sockets on the loopback interface.
#[test]
fn udp_fifo_broadcaster_test() {
    setup_logger(LevelFilter::Info);

    let hosts = loopback_hosts(47_311, 3);
    let broadcasters: Vec<Arc<Broadcaster>> = (1..=3)
        .map(|me| {
            Arc::new(
                Broadcaster::bind(&loopback_configuration(me, &hosts), BroadcastMode::Fifo, 5)
                    .unwrap(),
            )
        })
        .collect();

    let handles: Vec<_> = broadcasters
        .iter()
        .cloned()
        .map(|broadcaster| thread::spawn(move || broadcaster.broadcast_all()))
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }

    for broadcaster in &broadcasters {
        assert!(wait_until(Duration::from_secs(20), || {
            count_delivered(&broadcaster.output()) >= 15
        }));
        check_output(&broadcaster.output(), 3, 5);
    }
    for broadcaster in &broadcasters {
        broadcaster.stop();
    }
}

/// Tests that binding an address that is already in use fails with a bind error, and that a
/// process missing from the host list is rejected.
#[test]
fn udp_bind_errors_test() {
    setup_logger(LevelFilter::Info);

    let hosts = loopback_hosts(47_321, 2);
    let _taken = UdpTransport::bind(hosts[0].address, Duration::from_millis(10)).unwrap();
    assert!(matches!(
        FairLossLink::bind(&loopback_configuration(1, &hosts), |_, _| {}),
        Err(LinkError::Bind(_))
    ));
    assert!(matches!(
        FairLossLink::bind(&loopback_configuration(3, &hosts), |_, _| {}),
        Err(LinkError::UnknownProcess(_))
    ));
}
