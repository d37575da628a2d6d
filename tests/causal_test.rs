use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use log::LevelFilter;

use layered_broadcast::{
    broadcaster::{BroadcastMode, Broadcaster},
    causal::{types::ConfigureError, LocalizedCausalBroadcast},
    stop::Stoppable,
    types::ProcessID,
};

mod common;

use common::{
    check_output, configuration, count_delivered, hosts,
    logging::{log_with_context, setup_logger},
    network::mock_network,
    wait_until,
};

type Deliveries = Arc<Mutex<Vec<(u64, ProcessID)>>>;

/// Tests that a message is buffered until its dependency is delivered, even if it arrives first.
///
/// Process 1 depends on process 2. Process 2's message is held back from process 3, while process
/// 1's message, which depends on it, reaches process 3 freely.
#[test]
fn causal_dependency_buffering_test() {
    setup_logger(LevelFilter::Info);

    // 1. Start 3 processes. Process 1 depends on process 2.
    let hosts = hosts(3);
    let (stubs, control) = mock_network(&hosts, 0.0, 0.0);

    // Hold back every copy of a message emitted by process 2 on its way to process 3. Data
    // datagrams carry the URB emitter right after the perfect link sequence.
    control.set_filter(|_, to, datagram| {
        to == ProcessID::new(3) && datagram.len() > 8 && datagram[8..16] == 2u64.to_be_bytes()
    });

    let deliveries: Vec<Deliveries> = (0..3).map(|_| Arc::new(Mutex::new(Vec::new()))).collect();
    let processes: Vec<LocalizedCausalBroadcast<u64>> = stubs
        .into_iter()
        .enumerate()
        .map(|(i, stub)| {
            let mut config = configuration(i as u64 + 1, &hosts);
            if i == 0 {
                config.dependencies = Some(vec![ProcessID::new(2)]);
            }
            let deliveries = deliveries[i].clone();
            LocalizedCausalBroadcast::new(&config, stub, move |payload, source| {
                deliveries.lock().unwrap().push((payload, source))
            })
            .unwrap()
        })
        .collect();

    // 2. Process 2 broadcasts, and process 1 delivers it.
    log_with_context(Some(2), "Broadcasting 200.");
    processes[1].broadcast(200);
    assert!(wait_until(Duration::from_secs(10), || {
        deliveries[0].lock().unwrap().contains(&(200, ProcessID::new(2)))
    }));

    // 3. Process 1 broadcasts a message that depends on process 2's message.
    log_with_context(Some(1), "Broadcasting 100.");
    processes[0].broadcast(100);
    assert!(wait_until(Duration::from_secs(10), || {
        deliveries[1].lock().unwrap().contains(&(100, ProcessID::new(1)))
    }));

    // 4. Process 3 has received process 1's message, but must not deliver it yet.
    thread::sleep(Duration::from_millis(300));
    assert!(deliveries[2].lock().unwrap().is_empty());
    assert_eq!(processes[2].delivered_from(ProcessID::new(1)), 0);

    // 5. Release process 2's message. Process 3 delivers both, dependency first.
    log_with_context(None, "Releasing process 2's message.");
    control.clear_filter();
    assert!(wait_until(Duration::from_secs(10), || deliveries[2].lock().unwrap().len() >= 2));
    assert_eq!(
        *deliveries[2].lock().unwrap(),
        vec![(200, ProcessID::new(2)), (100, ProcessID::new(1))]
    );
    assert_eq!(processes[2].delivered_from(ProcessID::new(1)), 1);
    assert_eq!(processes[2].delivered_from(ProcessID::new(2)), 1);

    for process in &processes {
        process.stop();
    }
}

/// Tests that, at every process, each message is delivered after the messages of other sources
/// that its emitter had delivered before broadcasting it.
///
/// The dependency vector of a message is at least the emitter's delivery counts read just before
/// `broadcast`, so those counts are recorded per message and checked against every delivery log.
#[test]
fn causal_cross_source_order_test() {
    setup_logger(LevelFilter::Info);

    // 1. Start 3 processes over a lossy network. Each depends on all of them.
    let hosts = hosts(3);
    let (stubs, _control) = mock_network(&hosts, 0.1, 0.1);
    let deliveries: Vec<Deliveries> = (0..3).map(|_| Arc::new(Mutex::new(Vec::new()))).collect();
    let processes: Vec<Arc<LocalizedCausalBroadcast<u64>>> = stubs
        .into_iter()
        .enumerate()
        .map(|(i, stub)| {
            let mut config = configuration(i as u64 + 1, &hosts);
            config.dependencies = Some(hosts.iter().map(|host| host.id).collect());
            let deliveries = deliveries[i].clone();
            Arc::new(
                LocalizedCausalBroadcast::new(&config, stub, move |payload, source| {
                    deliveries.lock().unwrap().push((payload, source))
                })
                .unwrap(),
            )
        })
        .collect();

    // Delivery counts per source, read by the emitter right before broadcasting each payload.
    let declared: Arc<Mutex<HashMap<u64, Vec<(ProcessID, usize)>>>> =
        Arc::new(Mutex::new(HashMap::new()));
    let broadcast = {
        let declared = declared.clone();
        move |process: &LocalizedCausalBroadcast<u64>, log: &Deliveries, payload: u64| {
            let counts = {
                let log = log.lock().unwrap();
                (1..=3)
                    .map(ProcessID::new)
                    .map(|source| (source, log.iter().filter(|(_, s)| *s == source).count()))
                    .collect()
            };
            declared.lock().unwrap().insert(payload, counts);
            process.broadcast(payload);
        }
    };

    // 2. Process 1 broadcasts first, and everyone delivers it before anyone else broadcasts.
    broadcast(&processes[0], &deliveries[0], 1_000);
    for log in &deliveries {
        assert!(wait_until(Duration::from_secs(10), || !log.lock().unwrap().is_empty()));
    }

    // 3. All three broadcast 10 more messages concurrently.
    log_with_context(None, "All processes broadcast 10 messages.");
    let handles: Vec<_> = (0..3)
        .map(|i| {
            let process = processes[i].clone();
            let log = deliveries[i].clone();
            let broadcast = broadcast.clone();
            thread::spawn(move || {
                for n in 1..=10u64 {
                    broadcast(&process, &log, (i as u64 + 1) * 1_000 + n);
                    thread::sleep(Duration::from_millis(15));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // 4. Every process delivers all 31 messages, each after everything it declared.
    let declared = declared.lock().unwrap();
    for (i, log) in deliveries.iter().enumerate() {
        assert!(
            wait_until(Duration::from_secs(30), || log.lock().unwrap().len() >= 31),
            "process {} delivered only {} messages",
            i + 1,
            log.lock().unwrap().len()
        );
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 31);
        for (position, (payload, _)) in log.iter().enumerate() {
            for &(source, count) in &declared[payload] {
                let before = log[..position].iter().filter(|(_, s)| *s == source).count();
                assert!(
                    before >= count,
                    "process {} delivered {} after {} messages from {}, but it depends on {}",
                    i + 1,
                    payload,
                    before,
                    source,
                    count
                );
            }
        }
    }

    // Processes 2 and 3 broadcast after delivering process 1's first message, so every one of
    // their messages declared it.
    assert!((2_001..=2_010)
        .chain(3_001..=3_010)
        .all(|payload| declared[&payload][0].1 >= 1));

    for process in &processes {
        process.stop();
    }
}

/// Tests that the dependency set can be fixed once, and only if the configuration left it open.
#[test]
fn causal_configure_once_test() {
    setup_logger(LevelFilter::Info);

    let hosts = hosts(2);
    let (mut stubs, _control) = mock_network(&hosts, 0.0, 0.0);

    let mut preconfigured = configuration(2, &hosts);
    preconfigured.dependencies = Some(vec![ProcessID::new(1)]);
    let second = LocalizedCausalBroadcast::<u64>::new(&preconfigured, stubs.pop().unwrap(), |_, _| {})
        .unwrap();
    assert_eq!(
        second.configure(vec![]),
        Err(ConfigureError::AlreadyConfigured)
    );

    let first = LocalizedCausalBroadcast::<u64>::new(&configuration(1, &hosts), stubs.pop().unwrap(), |_, _| {})
        .unwrap();
    assert_eq!(first.configure(vec![ProcessID::new(2)]), Ok(()));
    assert_eq!(
        first.configure(vec![ProcessID::new(2)]),
        Err(ConfigureError::AlreadyConfigured)
    );
}

/// End-to-end test: 3 processes that all depend on each other each broadcast messages 1 to 10
/// with causal broadcast over a lossy network.
#[test]
fn causal_broadcaster_end_to_end_test() {
    setup_logger(LevelFilter::Info);

    let hosts = hosts(3);
    let (stubs, _control) = mock_network(&hosts, 0.2, 0.1);
    let broadcasters: Vec<Arc<Broadcaster>> = stubs
        .into_iter()
        .enumerate()
        .map(|(i, stub)| {
            let mut config = configuration(i as u64 + 1, &hosts);
            config.dependencies = Some(hosts.iter().map(|host| host.id).collect());
            Arc::new(Broadcaster::new(&config, BroadcastMode::Causal, 10, stub).unwrap())
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
        assert!(wait_until(Duration::from_secs(30), || {
            count_delivered(&broadcaster.output()) >= 30
        }));
        check_output(&broadcaster.output(), 3, 10);
        broadcaster.stop();
    }
}
