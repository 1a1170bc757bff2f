use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};
use rstest::rstest;
use shade_core::error::{CalibrationError, ErrorKind};
use shade_core::protocol::{
    ATTR_CALIBRATION_MODE, ATTR_CONFIGURED_MODE, ATTR_TILT_TRANSITION_STEPS,
    CALIBRATION_MODE_ENTER, CALIBRATION_MODE_EXIT,
};
use shade_core::{
    CalibrationCfg, CalibrationOutcome, CalibrationPhase, Calibrator, DeviceId, SessionManager,
    ShadeType,
};
use shade_hardware::{Faults, SimSettings, SimulatedCover};
use shade_traits::clock::test_clock::TestClock;
use shade_traits::{
    AttributeId, CoverCommand, DeviceCommandPort, ManufacturerCode, PortError, PositionFeed,
};

fn calibrator(cfg: CalibrationCfg) -> (Calibrator, TestClock) {
    let clock = TestClock::new();
    let cal = Calibrator::new(cfg, Arc::new(SessionManager::new())).with_clock(clock.clone());
    (cal, clock)
}

fn faulty(faults: Faults) -> SimulatedCover {
    SimulatedCover::with_faults(SimSettings::default(), faults)
}

#[rstest]
#[case::roller(ShadeType::Roller, 0x00, 0)]
#[case::cellular(ShadeType::Cellular, 0x00, 0)]
#[case::venetian(ShadeType::Venetian, 0x08, 100)]
#[case::exterior_venetian(ShadeType::ExteriorVenetian, 0x08, 100)]
fn happy_path_writes_in_order(
    #[case] shade: ShadeType,
    #[case] mode: u16,
    #[case] tilt: u16,
) {
    let (cal, _clock) = calibrator(CalibrationCfg::default());
    let mut sim = SimulatedCover::default();
    let id = DeviceId::new("cover-1");

    let report = cal.run(&mut sim, &id, shade).unwrap();
    assert_eq!(report.total_steps, 1_800);
    assert_eq!(report.top_position, 100);
    assert_eq!(report.bottom_position, 0);
    assert_eq!(report.verified_position, 100);
    let phases: Vec<_> = report.history.iter().map(|r| r.phase).collect();
    assert_eq!(
        phases,
        vec![
            CalibrationPhase::EnteringMode,
            CalibrationPhase::FindingTop,
            CalibrationPhase::FindingBottom,
            CalibrationPhase::Verifying,
            CalibrationPhase::Finalizing,
        ]
    );

    assert_eq!(
        sim.writes(),
        vec![
            (ATTR_CALIBRATION_MODE, CALIBRATION_MODE_ENTER),
            (ATTR_CONFIGURED_MODE, mode),
            (ATTR_TILT_TRANSITION_STEPS, tilt),
            (ATTR_CALIBRATION_MODE, CALIBRATION_MODE_EXIT),
        ]
    );
    assert_eq!(
        sim.commands(),
        vec![
            CoverCommand::UpOpen,
            CoverCommand::Stop,
            CoverCommand::DownClose,
            CoverCommand::Stop,
            CoverCommand::UpOpen,
            CoverCommand::Stop,
        ]
    );
    assert!(!sim.in_calibration_mode());
    assert!(!cal.sessions().is_active(&id));
    assert_eq!(cal.sessions().last_phase(&id), Some(CalibrationPhase::Done));
}

#[test]
fn outcome_carries_step_count() {
    let (cal, _clock) = calibrator(CalibrationCfg::default());
    let mut sim = SimulatedCover::default();
    let outcome = cal.calibrate(&mut sim, &DeviceId::new("c"), ShadeType::Roller);
    assert_eq!(outcome, CalibrationOutcome::Success { total_steps: 1_800 });
}

#[test]
fn elapsed_follows_simulated_time() {
    let (cal, clock) = calibrator(CalibrationCfg::default());
    let mut sim = SimulatedCover::default();
    let report = cal.run(&mut sim, &DeviceId::new("c"), ShadeType::Roller).unwrap();
    assert_eq!(report.elapsed, clock.offset());
    let summed: Duration = report.history.iter().map(|r| r.duration).sum();
    assert_eq!(summed, report.elapsed);
}

#[test]
fn unset_step_count_fails_and_still_exits_mode() {
    let (cal, _clock) = calibrator(CalibrationCfg::default());
    let mut sim = faulty(Faults {
        unset_total_steps: true,
        ..Faults::default()
    });
    let id = DeviceId::new("cover-7");

    let err = cal.run(&mut sim, &id, ShadeType::Roller).unwrap_err();
    assert_eq!(
        err,
        CalibrationError::InvalidStepsReading {
            value: Some(0xFFFF)
        }
    );
    assert_eq!(cal.sessions().last_phase(&id), Some(CalibrationPhase::Failed));
    assert_eq!(
        sim.writes().last(),
        Some(&(ATTR_CALIBRATION_MODE, CALIBRATION_MODE_EXIT))
    );
    assert!(!sim.in_calibration_mode());
    assert!(!cal.sessions().is_active(&id));
}

#[test]
fn rejected_command_names_phase() {
    let (cal, _clock) = calibrator(CalibrationCfg::default());
    let mut sim = faulty(Faults {
        fail_command: Some(CoverCommand::DownClose),
        ..Faults::default()
    });
    let outcome = cal.calibrate(&mut sim, &DeviceId::new("c"), ShadeType::Roller);
    let CalibrationOutcome::Failure { kind, message } = outcome else {
        panic!("expected failure");
    };
    assert_eq!(kind, ErrorKind::CommandFailed);
    assert!(message.contains("finding_bottom"), "{message}");
    assert!(message.contains("down_close"), "{message}");
    assert!(!sim.in_calibration_mode());
}

#[test]
fn cleanup_failure_does_not_mask_original_error() {
    let (cal, _clock) = calibrator(CalibrationCfg::default());
    let mut sim = faulty(Faults {
        fail_write: Some(ATTR_CALIBRATION_MODE),
        ..Faults::default()
    });
    let err = cal.run(&mut sim, &DeviceId::new("c"), ShadeType::Roller).unwrap_err();
    match err {
        CalibrationError::CommandFailed { phase, .. } => {
            assert_eq!(phase, CalibrationPhase::EnteringMode)
        }
        other => panic!("unexpected {other:?}"),
    }
    // enter attempt plus the cleanup attempt
    assert_eq!(sim.writes().len(), 2);
}

#[rstest]
#[case::configured_mode(ATTR_CONFIGURED_MODE, CalibrationPhase::EnteringMode, 3)]
#[case::tilt_steps(ATTR_TILT_TRANSITION_STEPS, CalibrationPhase::Finalizing, 4)]
fn failed_write_names_phase_and_still_exits_mode(
    #[case] attribute: AttributeId,
    #[case] expected: CalibrationPhase,
    #[case] writes: usize,
) {
    let (cal, _clock) = calibrator(CalibrationCfg::default());
    let mut sim = faulty(Faults {
        fail_write: Some(attribute),
        ..Faults::default()
    });
    let id = DeviceId::new("cover-3");

    let err = cal.run(&mut sim, &id, ShadeType::Venetian).unwrap_err();
    match err {
        CalibrationError::CommandFailed { phase, reason, .. } => {
            assert_eq!(phase, expected);
            assert!(reason.contains("device rejected"), "{reason}");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(sim.writes().len(), writes);
    assert_eq!(
        sim.writes().last(),
        Some(&(ATTR_CALIBRATION_MODE, CALIBRATION_MODE_EXIT))
    );
    assert!(!sim.in_calibration_mode());
    assert_eq!(cal.sessions().last_phase(&id), Some(CalibrationPhase::Failed));
}

#[test]
fn lost_link_fails_then_recovers() {
    let (cal, _clock) = calibrator(CalibrationCfg::default());
    let mut sim = faulty(Faults {
        link_down: true,
        ..Faults::default()
    });
    let id = DeviceId::new("cover-4");

    let CalibrationOutcome::Failure { kind, message } =
        cal.calibrate(&mut sim, &id, ShadeType::Roller)
    else {
        panic!("expected failure");
    };
    assert_eq!(kind, ErrorKind::CommandFailed);
    assert!(message.contains("transport error: link down"), "{message}");
    assert!(sim.commands().is_empty());

    sim.set_faults(Faults::default());
    let outcome = cal.calibrate(&mut sim, &id, ShadeType::Roller);
    assert_eq!(outcome, CalibrationOutcome::Success { total_steps: 1_800 });
    assert_eq!(cal.sessions().last_phase(&id), Some(CalibrationPhase::Done));
}

#[test]
fn moving_forever_is_a_stall_timeout() {
    let cfg = CalibrationCfg {
        move_timeout: Duration::from_secs(10),
        ..CalibrationCfg::default()
    };
    let (cal, _clock) = calibrator(cfg);
    let mut sim = faulty(Faults {
        never_stall: true,
        ..Faults::default()
    });
    let err = cal.run(&mut sim, &DeviceId::new("c"), ShadeType::Roller).unwrap_err();
    match err {
        CalibrationError::StallTimeout { phase, elapsed, .. } => {
            assert_eq!(phase, CalibrationPhase::FindingTop);
            assert!(elapsed >= Duration::from_secs(10));
        }
        other => panic!("unexpected {other:?}"),
    }
    // The motor is still told to stop after giving up.
    assert_eq!(
        sim.commands(),
        vec![CoverCommand::UpOpen, CoverCommand::Stop]
    );
    assert!(!sim.in_calibration_mode());
}

#[test]
fn session_budget_is_checked_between_phases() {
    let cfg = CalibrationCfg {
        total_timeout: Duration::from_secs(10),
        ..CalibrationCfg::default()
    };
    let (cal, _clock) = calibrator(cfg);
    let mut sim = SimulatedCover::default();
    let err = cal.run(&mut sim, &DeviceId::new("c"), ShadeType::Roller).unwrap_err();
    match err {
        CalibrationError::TotalTimeoutExceeded { phase, elapsed, limit } => {
            assert_eq!(phase, CalibrationPhase::FindingTop);
            assert!(elapsed > limit);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!sim.in_calibration_mode());
}

#[test]
fn failed_stop_is_not_fatal() {
    let (cal, _clock) = calibrator(CalibrationCfg::default());
    let mut sim = faulty(Faults {
        fail_command: Some(CoverCommand::Stop),
        ..Faults::default()
    });
    let report = cal.run(&mut sim, &DeviceId::new("c"), ShadeType::Roller).unwrap();
    assert_eq!(report.total_steps, 1_800);
}

#[test]
fn unknown_positions_only_delay_the_stall() {
    let (cal, _clock) = calibrator(CalibrationCfg::default());
    let mut sim = faulty(Faults {
        unknown_polls: 3,
        ..Faults::default()
    });
    assert!(cal.calibrate(&mut sim, &DeviceId::new("c"), ShadeType::Roller).is_success());
}

#[test]
fn busy_device_is_rejected_without_touching_it() {
    let (cal, _clock) = calibrator(CalibrationCfg::default());
    let id = DeviceId::new("cover-6");
    let held = cal
        .sessions()
        .try_acquire(&id, ShadeType::Roller, std::time::Instant::now())
        .unwrap();

    let mut sim = SimulatedCover::default();
    let err = cal.run(&mut sim, &id, ShadeType::Venetian).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyInProgress);
    assert!(sim.events().is_empty());
    assert_eq!(
        cal.sessions().session(&id).map(|s| s.shade_type),
        Some(ShadeType::Roller)
    );

    drop(held);
    assert!(cal.run(&mut sim, &id, ShadeType::Venetian).is_ok());
}

/// Pauses the first calibration-mode write until released.
struct Gated {
    inner: SimulatedCover,
    entered: Sender<()>,
    proceed: Receiver<()>,
    gated: bool,
}

impl DeviceCommandPort for Gated {
    fn send_command(&mut self, command: CoverCommand) -> Result<(), PortError> {
        self.inner.send_command(command)
    }
    fn read_attribute(
        &mut self,
        attribute: AttributeId,
        manufacturer: Option<ManufacturerCode>,
    ) -> Result<Option<u16>, PortError> {
        self.inner.read_attribute(attribute, manufacturer)
    }
    fn write_attribute(
        &mut self,
        attribute: AttributeId,
        value: u16,
        manufacturer: Option<ManufacturerCode>,
    ) -> Result<(), PortError> {
        if !self.gated {
            self.gated = true;
            self.entered.send(()).map_err(|e| Box::new(e) as PortError)?;
            self.proceed.recv().map_err(|e| Box::new(e) as PortError)?;
        }
        self.inner.write_attribute(attribute, value, manufacturer)
    }
}

impl PositionFeed for Gated {
    fn current_position(&mut self) -> Option<u8> {
        self.inner.current_position()
    }
}

#[test]
fn concurrent_calibration_of_same_device_is_rejected() {
    let (cal, _clock) = calibrator(CalibrationCfg::default());
    let id = DeviceId::new("cover-6");
    let (entered_tx, entered_rx) = bounded(1);
    let (proceed_tx, proceed_rx) = bounded(1);
    let mut first = Gated {
        inner: SimulatedCover::default(),
        entered: entered_tx,
        proceed: proceed_rx,
        gated: false,
    };

    thread::scope(|s| {
        let worker = s.spawn(|| cal.run(&mut first, &id, ShadeType::Roller));
        entered_rx.recv().unwrap();

        let mut second = SimulatedCover::default();
        let err = cal.run(&mut second, &id, ShadeType::Roller).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyInProgress);
        assert!(second.events().is_empty());
        assert_eq!(
            cal.sessions().phase_of(&id),
            Some(CalibrationPhase::EnteringMode)
        );

        proceed_tx.send(()).unwrap();
        assert!(worker.join().unwrap().is_ok());
    });

    assert!(!cal.sessions().is_active(&id));
    let mut again = SimulatedCover::default();
    assert!(cal.run(&mut again, &id, ShadeType::Roller).is_ok());
}

#[test]
fn other_devices_calibrate_in_parallel() {
    let (cal, _clock) = calibrator(CalibrationCfg::default());
    thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cal = &cal;
                s.spawn(move || {
                    let mut sim = SimulatedCover::default();
                    cal.run(&mut sim, &DeviceId::new(format!("cover-{i}")), ShadeType::Roller)
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap().is_ok());
        }
    });
    assert_eq!(cal.sessions().active_count(), 0);
}
