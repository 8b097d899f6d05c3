use drv8243_core::level::{DEFAULT_MIN_LEVEL, LevelCurve, MappedLevel, OFF_EPSILON};

#[test]
fn default_curve_spans_floor_to_full() {
    let curve = LevelCurve::default();

    // Smallest non-off command lands just above the dead-zone floor.
    match curve.map(OFF_EPSILON * 2.0) {
        MappedLevel::Drive(level) => {
            assert!(level >= DEFAULT_MIN_LEVEL - 1e-3, "level {level} under floor");
            assert!(level <= DEFAULT_MIN_LEVEL + 0.01);
        }
        MappedLevel::Off => panic!("command above epsilon must drive"),
    }

    // Full command saturates at (or within rounding of) full duty.
    match curve.map(1.0) {
        MappedLevel::Drive(level) => assert!((level - 1.0).abs() < 0.01),
        MappedLevel::Off => panic!("full command must drive"),
    }
}

#[test]
fn default_curve_is_monotonic() {
    let curve = LevelCurve::default();
    let mut previous = 0.0_f32;
    let mut x = 0.01_f32;
    while x <= 1.0 {
        let level = curve.map(x).level();
        // Tolerance absorbs the approximate powf on the low-precision path.
        assert!(level >= previous - 5e-3, "map({x}) = {level} dipped below {previous}");
        previous = level;
        x += 0.01;
    }
}

#[test]
fn shaping_dims_midrange_commands() {
    // The perceptual exponent pulls mid commands below the linear diagonal.
    let shaped = LevelCurve::new(0.0, 1.8).map(0.5).level();
    let linear = LevelCurve::new(0.0, 0.0).map(0.5).level();
    assert!(shaped < linear);
    assert!(shaped > 0.0);
}

#[test]
fn zero_floor_keeps_endpoints_exact() {
    let curve = LevelCurve::new(0.0, 0.0);
    assert_eq!(curve.map(0.0), MappedLevel::Off);
    match curve.map(1.0) {
        MappedLevel::Drive(level) => assert!((level - 1.0).abs() < f32::EPSILON),
        MappedLevel::Off => panic!("full command must drive"),
    }
}
