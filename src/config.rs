/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Per-run parameters shared by every layer of a process's stack.
//!
//! A [`Configuration`] is built with the builder pattern. Only the identity of this process and the
//! host list are required; every tuning parameter has a default.
//!
//! ```ignore
//! let configuration = Configuration::builder()
//!     .me(ProcessID::new(1))
//!     .hosts(hosts)
//!     .dependencies(vec![ProcessID::new(2)])
//!     .retransmit_interval(Duration::from_millis(20))
//!     .log_events(true)
//!     .build();
//! ```

use std::{net::SocketAddr, time::Duration};

use typed_builder::TypedBuilder;

use crate::types::{Host, ProcessID};

/// Stores the parameters required to start a process's broadcast stack:
/// 1. The identity of this process and the fixed, ordered host list.
/// 2. The causal dependency set, if the process runs localized causal broadcast.
/// 3. Queue capacities, which bound memory and apply backpressure to callers.
/// 4. Perfect link sender parameters: worker pool size, resend cycle length and in-flight window
///    bounds.
/// 5. The poll interval, which bounds how long any loop waits before observing a stop request.
/// 6. The "Log Events" flag, if set to "true" then protocol events are logged.
///
/// ## Log Events
///
/// The crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations). Warnings
/// are logged whether or not this flag is set.
#[derive(Clone, Debug, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.me(...)`
    - `.hosts(...)`

    Optional:
    - `.dependencies(...)`
    - `.send_backlog_warning(...)`
    - `.delivery_queue_capacity(...)`
    - `.broadcast_queue_capacity(...)`
    - `.sender_workers(...)`
    - `.retransmit_interval(...)`
    - `.poll_interval(...)`
    - `.initial_window(...)`
    - `.min_window(...)`
    - `.max_window(...)`
    - `.log_events(...)`
    "))]
pub struct Configuration {
    #[builder(setter(doc = "Set the identity of this process. Must appear in `hosts`. Required."))]
    pub me: ProcessID,
    #[builder(setter(doc = "Set the fixed, ordered list of all processes of the run. Required."))]
    pub hosts: Vec<Host>,
    #[builder(default, setter(strip_option, doc = "Set the processes whose deliveries this process's causal broadcasts depend on. Optional."))]
    pub dependencies: Option<Vec<ProcessID>>,
    #[builder(default = 1024, setter(doc = "Set the number of packets waiting for a send window slot of one destination above which a warning is logged. The queue itself is unbounded. Optional, defaults to 1024."))]
    pub send_backlog_warning: usize,
    #[builder(default = 1024, setter(doc = "Set the capacity of the queue between the network receive loop and the delivery worker. Optional, defaults to 1024."))]
    pub delivery_queue_capacity: usize,
    #[builder(default = 256, setter(doc = "Set the capacity of the queue of application broadcasts waiting to be echoed. Optional, defaults to 256."))]
    pub broadcast_queue_capacity: usize,
    #[builder(default = 4, setter(doc = "Set the number of perfect link sender workers. Optional, defaults to 4."))]
    pub sender_workers: usize,
    #[builder(default = Duration::from_millis(50), setter(doc = "Set the target duration of one resend cycle. Optional, defaults to 50ms."))]
    pub retransmit_interval: Duration,
    #[builder(default = Duration::from_millis(100), setter(doc = "Set the longest time a loop waits before checking for a stop request. Optional, defaults to 100ms."))]
    pub poll_interval: Duration,
    #[builder(default = 32, setter(doc = "Set the initial number of unacknowledged packets allowed per destination. Optional, defaults to 32."))]
    pub initial_window: usize,
    #[builder(default = 1, setter(doc = "Set the smallest in-flight window. Optional, defaults to 1."))]
    pub min_window: usize,
    #[builder(default = 1024, setter(doc = "Set the largest in-flight window. Optional, defaults to 1024."))]
    pub max_window: usize,
    #[builder(default = false, setter(doc = "Enable logging of protocol events? Optional, defaults to false."))]
    pub log_events: bool,
}

impl Configuration {
    pub fn num_hosts(&self) -> usize {
        self.hosts.len()
    }

    pub fn host_ids(&self) -> impl Iterator<Item = ProcessID> + '_ {
        self.hosts.iter().map(|host| host.id)
    }

    /// The address of process `id` in the host list.
    pub fn address_of(&self, id: ProcessID) -> Option<SocketAddr> {
        self.hosts
            .iter()
            .find(|host| host.id == id)
            .map(|host| host.address)
    }

    pub(crate) fn sender_workers(&self) -> usize {
        self.sender_workers.max(1)
    }

    /// The window bounds, with `min <= initial <= max` and every bound at least 1.
    pub(crate) fn window_bounds(&self) -> (usize, usize, usize) {
        let min = self.min_window.max(1);
        let max = self.max_window.max(min);
        let initial = self.initial_window.clamp(min, max);
        (min, initial, max)
    }
}
