//! Property tests for the invariants the decision core is built around:
//! the hysteresis band never chatters, event ordering never regresses
//! state, and no event storm can drive the pipeline into a panic.

use proptest::prelude::*;

use climacore::app::events::EngineEvent;
use climacore::app::service::ClimateService;
use climacore::clock::Timestamp;
use climacore::config::SystemConfig;
use climacore::events::{AirQualityReading, InboundEvent};
use climacore::occupancy::{OccupancyState, OccupancyTracker, SensorState};
use climacore::spike::SpikeDetector;
use climacore::vent::{FanSpeed, VentilationEngine};

fn t(secs: f64) -> Timestamp {
    Timestamp::from_secs(secs)
}

fn sensors_with_co2(co2: f32) -> SensorState {
    let mut s = SensorState::new(t(0.0));
    s.co2_ppm = Some(co2);
    s
}

fn decide_present(engine: &mut VentilationEngine, at: f64, co2: f32) -> FanSpeed {
    engine
        .decide(
            t(at),
            &sensors_with_co2(co2),
            OccupancyState::Present,
            &SpikeDetector::new(),
            None,
            false,
            &SystemConfig::default(),
        )
        .speed
}

proptest! {
    /// A CO2 trace that never reaches the critical level can never turn
    /// the fan on, no matter how it oscillates below the trigger.
    #[test]
    fn band_never_turns_on_below_the_trigger(trace in proptest::collection::vec(1850.0f32..1950.0, 1..200)) {
        let mut engine = VentilationEngine::new();
        for (i, co2) in trace.into_iter().enumerate() {
            let speed = decide_present(&mut engine, i as f64 * 60.0, co2);
            prop_assert_eq!(speed, FanSpeed::Off, "turned on at {} ppm", co2);
        }
    }

    /// Once on, the fan stays on for any trace that never drops below
    /// the release level.
    #[test]
    fn band_holds_on_inside_the_dead_zone(trace in proptest::collection::vec(1810.0f32..1990.0, 1..200)) {
        let mut engine = VentilationEngine::new();
        prop_assert_eq!(decide_present(&mut engine, 0.0, 2100.0), FanSpeed::Quiet);
        for (i, co2) in trace.into_iter().enumerate() {
            let speed = decide_present(&mut engine, (i + 1) as f64 * 60.0, co2);
            prop_assert_eq!(speed, FanSpeed::Quiet, "dropped out at {} ppm", co2);
        }
    }

    /// Activity stamped at or before the last door change never triggers
    /// presence; strictly newer activity (with a monitor) always does.
    #[test]
    fn presence_requires_activity_newer_than_door_change(
        door_at in 100.0f64..10_000.0,
        stale_offset in 0.0f64..100.0,
        fresh_offset in 0.001f64..100.0,
    ) {
        let config = SystemConfig::default();
        let mut timers = climacore::clock::TimerService::new();
        let mut tracker = OccupancyTracker::new(OccupancyState::Away, t(0.0));

        tracker.handle_door(true, t(door_at), &mut timers, &config);
        tracker.handle_door(false, t(door_at + 1.0), &mut timers, &config);
        let door_changed = door_at + 1.0;

        tracker.handle_activity(t(door_changed - stale_offset), true, &mut timers, &config);
        prop_assert_eq!(tracker.state(), OccupancyState::Away);

        let change = tracker.handle_activity(t(door_changed + fresh_offset), true, &mut timers, &config);
        prop_assert_eq!(change.map(|c| c.to), Some(OccupancyState::Present));
    }
}

// ── Event-storm robustness ───────────────────────────────────────

#[derive(Debug, Clone)]
enum StormEvent {
    Door(bool),
    Window(bool),
    Motion,
    Activity(bool),
    Air { co2: Option<f32>, tvoc: Option<f32>, temp: Option<f32> },
    Heartbeat,
}

fn arb_storm_event() -> impl Strategy<Value = StormEvent> {
    prop_oneof![
        any::<bool>().prop_map(StormEvent::Door),
        any::<bool>().prop_map(StormEvent::Window),
        Just(StormEvent::Motion),
        any::<bool>().prop_map(StormEvent::Activity),
        (
            proptest::option::of(350.0f32..3000.0),
            proptest::option::of(0.0f32..500.0),
            proptest::option::of(5.0f32..35.0),
        )
            .prop_map(|(co2, tvoc, temp)| StormEvent::Air { co2, tvoc, temp }),
        Just(StormEvent::Heartbeat),
    ]
}

proptest! {
    /// Arbitrary interleavings of valid events (with arbitrary gaps, so
    /// every timer can fire mid-storm) never panic and never produce an
    /// undefined decision.
    #[test]
    fn event_storms_never_break_the_pipeline(
        storm in proptest::collection::vec((arb_storm_event(), 1u32..1200), 1..120),
    ) {
        let mut svc = ClimateService::new(
            SystemConfig::default(),
            OccupancyState::Present,
            t(0.0),
        );
        let mut emitted = 0usize;
        let mut sink = |_: &EngineEvent| emitted += 1;

        let mut now = 0.0f64;
        for (event, gap) in storm {
            now += f64::from(gap);
            let result = match event {
                StormEvent::Door(open) => {
                    svc.handle_event(t(now), InboundEvent::Door { open, at: t(now) }, &mut sink)
                }
                StormEvent::Window(open) => {
                    svc.handle_event(t(now), InboundEvent::Window { open, at: t(now) }, &mut sink)
                }
                StormEvent::Motion => {
                    svc.handle_event(t(now), InboundEvent::Motion { at: t(now) }, &mut sink)
                }
                StormEvent::Activity(monitor) => svc.handle_event(
                    t(now),
                    InboundEvent::Activity {
                        last_active: t(now),
                        external_monitor: monitor,
                    },
                    &mut sink,
                ),
                StormEvent::Air { co2, tvoc, temp } => svc.handle_event(
                    t(now),
                    InboundEvent::AirQuality(AirQualityReading {
                        co2_ppm: co2,
                        tvoc_index: tvoc,
                        temp_c: temp,
                        humidity: None,
                        at: t(now),
                    }),
                    &mut sink,
                ),
                StormEvent::Heartbeat => {
                    svc.tick(t(now), &mut sink);
                    Ok(())
                }
            };
            prop_assert!(result.is_ok());

            // The model only ever holds one of its two states, and the
            // commanded speed is always a defined preset.
            let speed = svc.fan_speed();
            prop_assert!(speed.registers().0 <= 8 && speed.registers().1 <= 8);
        }
        let _ = emitted;
    }
}
