//! The full day-in-the-life trace: occupied hysteresis, departure,
//! forced purge, adaptive ramp, and the plateau stop.

use climacore::app::service::ClimateService;
use climacore::clock::Timestamp;
use climacore::config::SystemConfig;
use climacore::events::{AirQualityReading, InboundEvent};
use climacore::occupancy::OccupancyState;
use climacore::vent::FanSpeed;

use crate::mock_sink::RecordingSink;

fn t(secs: f64) -> Timestamp {
    Timestamp::from_secs(secs)
}

fn air(co2: f32, at: Timestamp) -> InboundEvent {
    InboundEvent::AirQuality(AirQualityReading {
        co2_ppm: Some(co2),
        tvoc_index: None,
        temp_c: None,
        humidity: None,
        at,
    })
}

#[test]
fn end_to_end_occupied_departure_ramp_plateau() {
    let mut svc = ClimateService::new(SystemConfig::default(), OccupancyState::Present, t(0.0));
    let mut sink = RecordingSink::new();

    // Occupied, CO2 critical: quiet ventilation.
    svc.handle_event(t(0.0), air(2100.0, t(0.0)), &mut sink).unwrap();
    assert_eq!(sink.last_vent_speed(), Some(FanSpeed::Quiet));

    // Falling but inside the dead band: still quiet, no re-command.
    let commands_so_far = sink.vent_history().len();
    svc.handle_event(t(60.0), air(1900.0, t(60.0)), &mut sink).unwrap();
    assert_eq!(sink.last_vent_speed(), Some(FanSpeed::Quiet));
    assert_eq!(sink.vent_history().len(), commands_so_far);

    // Below the release level: off.
    svc.handle_event(t(120.0), air(1750.0, t(120.0)), &mut sink).unwrap();
    assert_eq!(sink.last_vent_speed(), Some(FanSpeed::Off));

    // Door opens and closes; eleven quiet seconds confirm departure.
    svc.handle_event(t(180.0), InboundEvent::Door { open: true, at: t(180.0) }, &mut sink)
        .unwrap();
    svc.handle_event(t(185.0), InboundEvent::Door { open: false, at: t(185.0) }, &mut sink)
        .unwrap();
    svc.tick(t(196.0), &mut sink);
    assert_eq!(svc.occupancy(), OccupancyState::Away);
    assert_eq!(
        sink.occupancy_history(),
        vec![(OccupancyState::Present, OccupancyState::Away)]
    );

    // First reading while away: forced purge regardless of level.
    svc.handle_event(t(200.0), air(800.0, t(200.0)), &mut sink).unwrap();
    assert_eq!(sink.last_vent_speed(), Some(FanSpeed::Turbo));

    // Readings every minute: 1 ppm/min decline down to 620, then flat.
    let mut off_seen_at: Option<f64> = None;
    for k in 1..=200u32 {
        let at = 200.0 + f64::from(k) * 60.0;
        let ppm = (800.0 - k as f32).max(620.0);
        svc.handle_event(t(at), air(ppm, t(at)), &mut sink).unwrap();

        // 31 minutes into away: phase 2, slow band, quiet.
        if k == 31 {
            assert_eq!(
                sink.last_vent_speed(),
                Some(FanSpeed::Quiet),
                "slow decline should ventilate quietly after the purge window"
            );
        }
        if off_seen_at.is_none() && sink.last_vent_speed() == Some(FanSpeed::Off) {
            off_seen_at = Some(at);
        }
    }

    // The flatline at 620 ppm must end in a plateau stop.
    let off_at = off_seen_at.expect("plateau must stop ventilation");
    assert!(off_at > 200.0 + 180.0 * 60.0, "stop only after the decline flattened");

    let history = sink.vent_history();
    let (_, reason) = history
        .iter()
        .rev()
        .find(|(speed, _)| *speed == FanSpeed::Off)
        .expect("an off decision exists");
    assert_eq!(reason, "baseline reached");

    // And it stays off: no later decision turned the fan back on.
    assert_eq!(sink.last_vent_speed(), Some(FanSpeed::Off));
}

#[test]
fn return_after_plateau_starts_from_a_clean_slate() {
    let mut svc = ClimateService::new(SystemConfig::default(), OccupancyState::Away, t(0.0));
    let mut sink = RecordingSink::new();

    // Away with a long-settled baseline.
    for k in 0..40u32 {
        let at = f64::from(k) * 60.0;
        svc.handle_event(t(at), air(450.0, t(at)), &mut sink).unwrap();
    }

    // Someone walks in (door stays closed — motion after door change).
    svc.handle_event(
        t(2500.0),
        InboundEvent::Motion { at: t(2500.0) },
        &mut sink,
    )
    .unwrap();
    assert_eq!(svc.occupancy(), OccupancyState::Present);

    // Occupied at 1900 ppm: inside the band but the latch is clean → off.
    svc.handle_event(t(2560.0), air(1900.0, t(2560.0)), &mut sink).unwrap();
    assert_eq!(sink.last_vent_speed(), Some(FanSpeed::Off));
}
