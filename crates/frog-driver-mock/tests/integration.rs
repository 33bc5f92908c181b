//! Device wrappers driven through the simulated backends.

use frog_core::units::micrometers;
use frog_core::{
    CalibrationStore, Delivery, FaultPolicy, FrogError, LinearMotor, SpectralSensor,
};
use frog_driver_mock::*;
use std::sync::Arc;
use std::time::Duration;

fn motor_with(stage: &MockStage, dir: &std::path::Path) -> LinearMotor {
    LinearMotor::new(Arc::new(stage.clone()), CalibrationStore::new(dir)).unwrap()
}

/// Targets outside the limits never reach the controller, targets inside do.
#[tokio::test]
async fn interlock_rejects_outside_and_accepts_inside() {
    let dir = tempfile::tempdir().unwrap();
    let stage = MockStage::new();
    let motor = motor_with(&stage, dir.path());
    motor
        .set_travel_limits(micrometers(0.0), micrometers(20000.0))
        .unwrap();

    for target_um in [-0.001, -256.0, 20000.001, 1e6] {
        let err = motor.move_absolute(micrometers(target_um)).await.unwrap_err();
        assert!(matches!(err, FrogError::StageOutOfBounds { .. }), "{target_um}");
    }
    assert!(stage.commands().is_empty());

    for target_um in [0.0, 11114.0, 20000.0] {
        let delivery = motor.move_absolute(micrometers(target_um)).await.unwrap();
        assert_eq!(delivery, Delivery::Delivered);
    }
    assert_eq!(
        stage.move_targets(),
        vec![0.0, micrometers(11114.0), micrometers(20000.0)]
    );
}

#[tokio::test]
async fn unset_limits_block_all_motion() {
    let dir = tempfile::tempdir().unwrap();
    let stage = MockStage::new();
    let motor = motor_with(&stage, dir.path());
    assert!(matches!(
        motor.move_absolute(1e-3).await,
        Err(FrogError::StageLimitsNotSet)
    ));
    assert!(stage.commands().is_empty());
}

#[tokio::test]
async fn uncalibrated_stage_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let stage = MockStage::builder().uncalibrated().build();
    let result = LinearMotor::new(Arc::new(stage), CalibrationStore::new(dir.path()));
    assert!(matches!(result, Err(FrogError::StageNotCalibrated(_))));
}

/// First access seeds time zero from the position; a second process reads it back.
#[tokio::test]
async fn time_zero_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let stage = MockStage::builder().initial_position(micrometers(11370.0)).build();
        let motor = motor_with(&stage, dir.path());
        assert_eq!(motor.time_zero().await.unwrap(), micrometers(11370.0));
        motor.close().await.unwrap();
    }

    // Restarted process: the stage now sits elsewhere
    let stage = MockStage::builder().initial_position(micrometers(500.0)).build();
    let motor = motor_with(&stage, dir.path());
    assert_eq!(motor.time_zero().await.unwrap(), micrometers(11370.0));

    let delay = motor.position_as_delay().await.unwrap();
    assert!(delay < 0.0);
}

#[tokio::test]
async fn realistic_stage_is_waited_for() {
    let dir = tempfile::tempdir().unwrap();
    let stage = MockStage::builder()
        .mode(MockMode::Realistic)
        .speed(1e-3)
        .settle(Duration::from_millis(2))
        .build();
    let motor = motor_with(&stage, dir.path())
        .with_travel_limits(0.0, 20e-3)
        .unwrap();

    motor.move_absolute(20e-6).await.unwrap();
    assert!(motor.is_in_motion().await.unwrap());
    motor
        .wait_move_finished(Duration::from_millis(2))
        .await
        .unwrap();
    assert!(!motor.is_in_motion().await.unwrap());
    assert_eq!(motor.position().await.unwrap(), 20e-6);
}

#[tokio::test]
async fn native_wait_is_preferred() {
    let dir = tempfile::tempdir().unwrap();
    let stage = MockStage::builder()
        .mode(MockMode::Realistic)
        .speed(1e-3)
        .native_wait(true)
        .error_config(ErrorConfig::scenario(ErrorScenario::Timeout {
            operation: "is_moving",
        }))
        .build();
    let motor = motor_with(&stage, dir.path())
        .with_fault_policy(FaultPolicy::Strict)
        .with_travel_limits(0.0, 1e-3)
        .unwrap();

    motor.move_absolute(10e-6).await.unwrap();
    // Polling would fail under the strict policy; the native wait never polls
    motor
        .wait_move_finished(Duration::from_millis(1))
        .await
        .unwrap();
    assert_eq!(stage.current_position(), 10e-6);
}

/// A transient controller hiccup during a move is absorbed and reported.
#[tokio::test]
async fn transient_move_fault_is_absorbed() {
    let dir = tempfile::tempdir().unwrap();
    let stage = MockStage::builder()
        .error_config(ErrorConfig::scenario(ErrorScenario::FailOnce {
            operation: "move",
            nth: 2,
        }))
        .build();
    let motor = motor_with(&stage, dir.path())
        .with_travel_limits(0.0, 1e-3)
        .unwrap();

    assert!(motor.move_absolute(1e-4).await.unwrap().is_delivered());
    assert!(matches!(
        motor.move_absolute(2e-4).await.unwrap(),
        Delivery::Absorbed { .. }
    ));
    assert!(motor.move_absolute(3e-4).await.unwrap().is_delivered());
    assert_eq!(stage.current_position(), 3e-4);
}

#[tokio::test]
async fn spectrometer_wrapper_over_mock() {
    let sensor = SpectralSensor::new(Arc::new(
        MockSpectrometer::builder()
            .wavelength_range(380e-9, 420e-9, 32)
            .build(),
    ));
    assert!(sensor.is_wavelength_based());
    assert!(sensor.set_integration_time(1e-3).await.is_err());
    sensor.set_integration_time(0.1).await.unwrap();

    let spectrum = sensor.spectrum().await.unwrap();
    assert_eq!(spectrum.len(), 32);
    assert_eq!(spectrum.axis[0], 380e-9);
    sensor.close().await.unwrap();
    sensor.close().await.unwrap();
    assert!(matches!(
        sensor.intensities().await,
        Err(FrogError::DeviceClosed(_))
    ));
}
