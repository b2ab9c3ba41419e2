//! Pipeline tests for individual subsystems driven through the service:
//! spike lifecycle, timer-driven stale flush, heating coordination, and
//! snapshot restore.

use climacore::app::service::ClimateService;
use climacore::clock::Timestamp;
use climacore::config::SystemConfig;
use climacore::events::{AirQualityReading, InboundEvent};
use climacore::occupancy::OccupancyState;
use climacore::snapshot::PersistedState;
use climacore::vent::FanSpeed;

use crate::mock_sink::RecordingSink;

fn t(secs: f64) -> Timestamp {
    Timestamp::from_secs(secs)
}

fn reading(
    co2: Option<f32>,
    tvoc: Option<f32>,
    temp: Option<f32>,
    at: Timestamp,
) -> InboundEvent {
    InboundEvent::AirQuality(AirQualityReading {
        co2_ppm: co2,
        tvoc_index: tvoc,
        temp_c: temp,
        humidity: None,
        at,
    })
}

// ── Spike lifecycle through the pipeline ─────────────────────────

#[test]
fn spike_resolution_ventilates_then_clears() {
    let mut svc = ClimateService::new(SystemConfig::default(), OccupancyState::Present, t(0.0));
    let mut sink = RecordingSink::new();

    // Calm baseline.
    for k in 0..6u32 {
        let at = f64::from(k) * 60.0;
        svc.handle_event(t(at), reading(None, Some(40.0), None, t(at)), &mut sink)
            .unwrap();
    }

    // Cooking: sharp rise, peak, decline.
    for (k, tvoc) in [(6u32, 240.0f32), (7, 230.0), (8, 220.0)] {
        let at = f64::from(k) * 60.0;
        svc.handle_event(t(at), reading(None, Some(tvoc), None, t(at)), &mut sink)
            .unwrap();
    }

    assert_eq!(sink.spike_peaks(), vec![240.0]);
    assert_eq!(sink.last_vent_speed(), Some(FanSpeed::Medium));
    let history = sink.vent_history();
    let (_, reason) = history.last().unwrap();
    assert!(reason.contains("clearing"), "got reason: {reason}");

    // Index falls below the clear target: back to the CO2 rules (off —
    // there is no CO2 reading at all).
    svc.handle_event(t(9.0 * 60.0), reading(None, Some(110.0), None, t(540.0)), &mut sink)
        .unwrap();
    assert_eq!(sink.last_vent_speed(), Some(FanSpeed::Off));
}

#[test]
fn second_spike_inside_cooldown_ventilates_only_once() {
    let mut svc = ClimateService::new(SystemConfig::default(), OccupancyState::Present, t(0.0));
    let mut sink = RecordingSink::new();

    let mut at = 0.0;
    let mut feed = |svc: &mut ClimateService, sink: &mut RecordingSink, tvoc: f32| {
        svc.handle_event(t(at), reading(None, Some(tvoc), None, t(at)), sink)
            .unwrap();
        at += 60.0;
    };

    for _ in 0..6 {
        feed(&mut svc, &mut sink, 40.0);
    }
    feed(&mut svc, &mut sink, 240.0);
    feed(&mut svc, &mut sink, 230.0);
    feed(&mut svc, &mut sink, 220.0); // resolved → cooldown armed
    feed(&mut svc, &mut sink, 100.0); // cleared

    // Second burner incident twenty minutes later.
    for _ in 0..6 {
        feed(&mut svc, &mut sink, 40.0);
    }
    feed(&mut svc, &mut sink, 250.0);
    feed(&mut svc, &mut sink, 245.0);
    feed(&mut svc, &mut sink, 240.0);

    assert_eq!(
        sink.spike_peaks().len(),
        1,
        "the second spike is suppressed until cooldown expiry"
    );
}

// ── Timer-driven stale flush ─────────────────────────────────────

#[test]
fn stale_flush_fires_from_the_timer_without_sensor_traffic() {
    let mut config = SystemConfig::default();
    config.stale_flush_interval_secs = 3600;
    config.stale_flush_duration_secs = 600;
    let mut svc = ClimateService::new(config, OccupancyState::Away, t(0.0));
    let mut sink = RecordingSink::new();

    // Room idle at baseline; readings stop a few minutes before the
    // flush comes due.
    for k in 0..=55u32 {
        let at = f64::from(k) * 60.0;
        svc.handle_event(t(at), reading(Some(450.0), None, None, t(at)), &mut sink)
            .unwrap();
    }
    assert_eq!(sink.last_vent_speed(), Some(FanSpeed::Off), "settled at baseline");

    // The heartbeat alone opens the flush window.
    svc.tick(t(3601.0), &mut sink);
    assert_eq!(sink.last_vent_speed(), Some(FanSpeed::Medium));
    let history = sink.vent_history();
    assert!(history.last().unwrap().1.contains("flush"));
}

// ── Heating coordination ─────────────────────────────────────────

#[test]
fn heating_suspends_during_away_purge_and_resumes_after() {
    // 10:00 UTC — inside the default occupancy hours.
    let base = 10.0 * 3600.0;
    let mut svc = ClimateService::new(SystemConfig::default(), OccupancyState::Present, t(base));
    let mut sink = RecordingSink::new();

    svc.handle_event(
        t(base),
        reading(Some(900.0), None, Some(22.0), t(base)),
        &mut sink,
    )
    .unwrap();
    assert!(sink.last_heating().is_none(), "nothing to do while present");

    // Departure.
    svc.handle_event(t(base + 100.0), InboundEvent::Door { open: true, at: t(base + 100.0) }, &mut sink)
        .unwrap();
    svc.handle_event(t(base + 105.0), InboundEvent::Door { open: false, at: t(base + 105.0) }, &mut sink)
        .unwrap();
    svc.tick(t(base + 116.0), &mut sink);
    assert_eq!(svc.occupancy(), OccupancyState::Away);

    // First away reading: turbo purge in a warm room → suspend heat.
    svc.handle_event(
        t(base + 120.0),
        reading(Some(900.0), None, Some(22.0), t(base + 120.0)),
        &mut sink,
    )
    .unwrap();
    assert_eq!(sink.last_vent_speed(), Some(FanSpeed::Turbo));
    let (suspended, reason) = sink.last_heating().unwrap();
    assert!(suspended);
    assert!(reason.contains("away ventilation"), "got: {reason}");

    // Baseline settles after the purge window; fan stops, heat resumes.
    let phase2 = base + 120.0 + 1800.0;
    for k in 0..=20u32 {
        let at = phase2 + f64::from(k) * 60.0;
        svc.handle_event(t(at), reading(Some(450.0), None, Some(22.0), t(at)), &mut sink)
            .unwrap();
    }
    assert_eq!(sink.last_vent_speed(), Some(FanSpeed::Off));
    let (suspended, reason) = sink.last_heating().unwrap();
    assert!(!suspended);
    assert!(reason.contains("occupancy hours"), "got: {reason}");
}

// ── Snapshot restore ─────────────────────────────────────────────

#[test]
fn away_snapshot_restores_and_ramps_on_next_reading() {
    let snap = PersistedState {
        occupancy: OccupancyState::Away,
        door_open_mode: false,
        co2_hysteresis_on: false,
        heating_suspended: false,
        heat_band_paused: false,
        last_fan_speed: FanSpeed::Off,
        saved_at: t(1000.0),
    };
    let bytes = snap.encode().unwrap();
    let restored = PersistedState::decode(&bytes).unwrap();

    let mut svc = ClimateService::new(SystemConfig::default(), OccupancyState::Present, t(2000.0));
    svc.resume_from(&restored, t(2000.0));
    assert_eq!(svc.occupancy(), OccupancyState::Away);

    // First reading after the restart: the purge ramp starts fresh.
    let mut sink = RecordingSink::new();
    svc.handle_event(
        t(2060.0),
        reading(Some(700.0), None, None, t(2060.0)),
        &mut sink,
    )
    .unwrap();
    assert_eq!(sink.last_vent_speed(), Some(FanSpeed::Turbo));
}
