use std::f32::consts::PI;
use std::sync::mpsc;
use std::time::Duration;

use gyro_cube::pump::{OrientationPump, PumpError, PumpState, RenderLink, apply_orientation};
use gyro_cube::resources::mesh::build_cube;
use gyro_cube::telemetry::{Orientation, TelemetryError};

/// A render loop that polls the link until it turns inactive.
fn spin(link: RenderLink) {
    while link.is_active() {
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn should_refuse_to_start_twice() {
    let mut pump = OrientationPump::new();
    pump.start(spin).unwrap();
    assert!(matches!(pump.start(spin), Err(PumpError::AlreadyRunning)));
    pump.stop().unwrap();
}

#[test]
fn should_refuse_to_stop_before_start() {
    let mut pump = OrientationPump::new();
    assert!(matches!(pump.stop(), Err(PumpError::NotRunning)));
    assert_eq!(pump.state(), PumpState::Idle);
}

#[test]
fn should_clear_the_thread_handle_and_be_restartable() {
    let mut pump = OrientationPump::new();
    pump.start(spin).unwrap();
    assert!(pump.has_render_thread());
    assert_eq!(pump.state(), PumpState::Running);

    pump.stop().unwrap();
    assert!(!pump.has_render_thread());
    assert_eq!(pump.state(), PumpState::Stopped);
    assert!(matches!(pump.stop(), Err(PumpError::NotRunning)));

    pump.start(spin).unwrap();
    assert!(pump.is_running());
    pump.stop().unwrap();
}

#[test]
fn should_hand_published_orientations_to_the_render_thread() {
    let mut pump = OrientationPump::new();
    let (tx, rx) = mpsc::channel();
    pump.start(move |link| {
        let mut last = Orientation::default();
        while link.is_active() {
            let latest = link.latest();
            if latest != last {
                last = latest;
                let _ = tx.send(latest);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    })
    .unwrap();

    let input: &[u8] = b"angle:1.5 x:0.0 y:1.0 z:0.0\n";
    assert_eq!(pump.run(input).unwrap(), 1);

    let seen = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(
        seen,
        Orientation {
            angle: 1.5,
            x: 0.0,
            y: 0.0,
            z: -1.0
        }
    );
    pump.stop().unwrap();
}

#[test]
fn should_report_a_panicking_render_thread() {
    let mut pump = OrientationPump::new();
    pump.start(|_| panic!("render failure")).unwrap();
    assert!(matches!(pump.stop(), Err(PumpError::RenderPanicked)));
    assert!(!pump.has_render_thread());
}

struct ClosedPort;

impl std::io::Read for ClosedPort {
    fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::ErrorKind::BrokenPipe.into())
    }
}

#[test]
fn should_stop_after_the_stream_ends() {
    let mut pump = OrientationPump::new();
    pump.start(spin).unwrap();
    let input: &[u8] = b"angle:0.5 x:1.0 y:0.0 z:0.0\nangle:0.6 x:1.0 y:0.0 z:0.0\n";
    assert_eq!(pump.run_to_end(input).unwrap(), 2);
    assert_eq!(pump.state(), PumpState::Stopped);
    assert!(!pump.has_render_thread());
}

#[test]
fn should_report_a_closed_port_after_stopping() {
    let mut pump = OrientationPump::new();
    pump.start(spin).unwrap();
    let result = pump.run_to_end(std::io::BufReader::new(ClosedPort));
    assert!(matches!(
        result,
        Err(PumpError::Telemetry(TelemetryError::Io(_)))
    ));
    assert_eq!(pump.state(), PumpState::Stopped);
}

#[test]
fn should_prefer_the_render_panic_over_a_closed_port() {
    let mut pump = OrientationPump::new();
    pump.start(|_| panic!("render failure")).unwrap();
    let result = pump.run_to_end(std::io::BufReader::new(ClosedPort));
    assert!(matches!(result, Err(PumpError::RenderPanicked)));
    assert!(!pump.has_render_thread());
}

#[test]
fn should_stop_the_render_thread_on_drop() {
    let (tx, rx) = mpsc::channel();
    {
        let mut pump = OrientationPump::new();
        pump.start(move |link| {
            spin(link);
            let _ = tx.send(());
        })
        .unwrap();
    }
    assert!(rx.try_recv().is_ok());
}

#[test]
fn should_keep_the_previous_rotation_for_a_zero_axis() {
    let mut cube = build_cube().unwrap();
    let turn = Orientation {
        angle: PI,
        x: 0.0,
        y: 1.0,
        z: 0.0,
    };
    apply_orientation(&mut cube, &turn).unwrap();
    let before = cube.get_model_matrix();

    let degenerate = Orientation {
        angle: 0.7,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    assert!(apply_orientation(&mut cube, &degenerate).is_err());
    assert_eq!(cube.get_model_matrix(), before);
}
