//! Host-side integration tests for the event → decision pipeline.
//!
//! These drive the full [`ClimateService`] with synthetic event traces
//! and assert on the emitted decision stream, without any real device
//! or transport.

mod mock_sink;
mod scenario_tests;
mod service_tests;
