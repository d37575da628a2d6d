#![allow(dead_code)]

pub(crate) mod logging;

pub(crate) mod network;

use std::{
    collections::HashMap,
    thread,
    time::{Duration, Instant},
};

use layered_broadcast::{
    config::Configuration,
    types::{Host, ProcessID},
};

/// Hosts `1..=n` with distinct placeholder addresses. The in-memory network only uses the
/// addresses as keys.
pub(crate) fn hosts(n: u64) -> Vec<Host> {
    (1..=n)
        .map(|i| {
            Host::new(
                ProcessID::new(i),
                format!("10.0.0.{}:11000", i).parse().unwrap(),
            )
        })
        .collect()
}

/// A configuration with short intervals, so that tests recover from losses quickly.
pub(crate) fn configuration(me: u64, hosts: &[Host]) -> Configuration {
    Configuration::builder()
        .me(ProcessID::new(me))
        .hosts(hosts.to_vec())
        .retransmit_interval(Duration::from_millis(10))
        .poll_interval(Duration::from_millis(5))
        .build()
}

/// Poll `condition` until it holds or `timeout` passes. Returns whether it held.
pub(crate) fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Checks a broadcaster's output log: `num_messages` broadcast lines in order, and from every
/// source exactly `num_messages` delivered lines in increasing order.
pub(crate) fn check_output(output: &str, num_hosts: u64, num_messages: u64) {
    let mut broadcast = Vec::new();
    let mut delivered: HashMap<u64, Vec<u64>> = HashMap::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split(' ').collect();
        match fields.as_slice() {
            ["b", i] => broadcast.push(i.parse::<u64>().unwrap()),
            ["d", source, i] => delivered
                .entry(source.parse().unwrap())
                .or_default()
                .push(i.parse().unwrap()),
            _ => panic!("malformed output line: {:?}", line),
        }
    }

    let in_order: Vec<u64> = (1..=num_messages).collect();
    assert_eq!(broadcast, in_order);
    assert_eq!(delivered.len() as u64, num_hosts);
    for (source, payloads) in delivered {
        assert_eq!(payloads, in_order, "deliveries from {} out of order", source);
    }
}

pub(crate) fn count_delivered(output: &str) -> usize {
    output.lines().filter(|line| line.starts_with("d ")).count()
}
