//! Behavioural suites for the sensor daemon.

mod dispatch_behaviour;
mod support;
