//! Interactive command session driving the simulated device.

use drv8243_core::driver::Drv8243Driver;
use drv8243_core::handshake::{
    HandshakeConfig, HandshakeEngine, HandshakeTrigger, SessionGuard,
};
use drv8243_core::level::{LevelCurve, MappedLevel};
use drv8243_core::lines::{ALL_LINES, LineId};
use drv8243_core::telemetry::{TelemetryPayload, TelemetryRecord, TelemetryRecorder};

use crate::device::{DeviceHandle, DeviceProfile, DutySink};

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "handshake",
        "handshake         - run a wake/ACK pass against the device",
    ),
    (
        "level",
        "level <0..1>      - apply a normalized output level",
    ),
    (
        "profile",
        "profile [<tag>]   - show or switch the device profile (nominal, never-ready, stuck-low, unwired)",
    ),
    (
        "status",
        "status            - display driver and device state",
    ),
    (
        "telemetry",
        "telemetry         - dump the telemetry ring",
    ),
    ("help", "help [topic]      - show help for a command"),
];

type EmuDriver = Drv8243Driver<
    'static,
    crate::device::EmuWake,
    crate::device::EmuFault,
    crate::device::EmuTimebase,
    DutySink,
>;

pub struct Session {
    guard: &'static SessionGuard,
    profile: DeviceProfile,
    device: DeviceHandle,
    sink: DutySink,
    driver: EmuDriver,
    telemetry: TelemetryRecorder,
}

impl Session {
    #[must_use]
    pub fn new(profile: DeviceProfile) -> Self {
        // One guard for the lifetime of the process; profile switches rebuild
        // the device and driver around it.
        let guard: &'static SessionGuard = Box::leak(Box::new(SessionGuard::new()));
        let (device, sink, driver) = build_driver(guard, profile);
        Self {
            guard,
            profile,
            device,
            sink,
            driver,
            telemetry: TelemetryRecorder::new(),
        }
    }

    pub fn handle_command(&mut self, line: &str) -> Vec<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let mut parts = trimmed.split_whitespace();
        let Some(command) = parts.next() else {
            return Vec::new();
        };
        let arg = parts.next();
        if parts.next().is_some() {
            return vec![format!("ERR too many arguments for `{command}`")];
        }

        match command.to_ascii_lowercase().as_str() {
            "handshake" | "status" | "telemetry" if arg.is_some() => {
                vec![format!("ERR too many arguments for `{command}`")]
            }
            "handshake" => self.handle_handshake(),
            "level" => self.handle_level(arg),
            "profile" => self.handle_profile(arg),
            "status" => self.handle_status(),
            "telemetry" => self.handle_telemetry(),
            "help" => handle_help(arg),
            _ => vec![format!("ERR unknown command `{command}`; try `help`")],
        }
    }

    fn handle_handshake(&mut self) -> Vec<String> {
        let outcome = self
            .driver
            .run_handshake(HandshakeTrigger::HostRequest, &mut self.telemetry);
        let diag = self.driver.diagnostics();
        vec![
            format!("handshake {} attempt={}", outcome.label(), diag.attempts),
            format!(
                "  ready wait {}us (observed={}), confirm wait {}us (released={})",
                diag.ready_wait_us, diag.saw_ready, diag.confirm_wait_us, diag.saw_ack_clear
            ),
            format!(
                "  ack pulse {}us{}",
                diag.ack_pulse_low_us,
                if diag.ack_pulse_overrun { " OVERRUN" } else { "" }
            ),
        ]
    }

    fn handle_level(&mut self, arg: Option<&str>) -> Vec<String> {
        let Some(raw) = arg else {
            return vec!["ERR level expects a value".to_string()];
        };
        let Ok(command) = raw.parse::<f32>() else {
            return vec![format!("ERR `{raw}` is not a number in [0, 1]")];
        };

        let first_write = !self.driver.has_run();
        self.driver.write_state(command, &mut self.telemetry);

        let mut lines = Vec::new();
        if first_write {
            lines.push(format!(
                "first write ran handshake: {}",
                self.driver.engine().outcome().label()
            ));
        }
        match self.driver.curve().map(command) {
            MappedLevel::Off => lines.push("output off".to_string()),
            MappedLevel::Drive(duty) => lines.push(format!("output duty {duty:.4}")),
        }
        lines
    }

    fn handle_profile(&mut self, arg: Option<&str>) -> Vec<String> {
        match arg {
            None => vec![format!("profile {}", self.profile.label())],
            Some(tag) => match DeviceProfile::from_tag(tag) {
                Ok(profile) => {
                    self.reset(profile);
                    vec![format!("profile {} (device reset)", profile.label())]
                }
                Err(err) => vec![format!("ERR {err}")],
            },
        }
    }

    fn handle_status(&self) -> Vec<String> {
        let diag = self.driver.diagnostics();
        let mut lines = vec![
            format!("profile   {}", self.profile.label()),
            format!(
                "handshake {} attempts={}",
                self.driver.engine().outcome().label(),
                diag.attempts
            ),
            format!(
                "nSLEEP    {}",
                if self.device.wake_is_high() { "high" } else { "low" }
            ),
            format!(
                "nFAULT    {}{}",
                if self.device.fault_is_low() { "low" } else { "high" },
                if self.profile.fault_wired() {
                    ""
                } else {
                    " (unwired)"
                }
            ),
            format!(
                "duty      {}",
                self.sink
                    .last()
                    .map_or_else(|| "-".to_string(), |duty| format!("{duty:.4}"))
            ),
            format!("clock     {}us", self.device.now_us()),
        ];
        for spec in &ALL_LINES {
            let wired = match spec.id {
                LineId::Wake => true,
                LineId::ReadyFault => self.profile.fault_wired(),
                LineId::Direction => false,
            };
            lines.push(format!(
                "line      {:<6} {}{}",
                spec.label,
                if wired { "wired" } else { "unwired" },
                if spec.required { " (required)" } else { "" }
            ));
        }
        lines
    }

    fn handle_telemetry(&self) -> Vec<String> {
        if self.telemetry.is_empty() {
            return vec!["telemetry ring empty".to_string()];
        }
        self.telemetry.oldest_first().map(format_record).collect()
    }

    fn reset(&mut self, profile: DeviceProfile) {
        let (device, sink, driver) = build_driver(self.guard, profile);
        self.profile = profile;
        self.device = device;
        self.sink = sink;
        self.driver = driver;
        self.telemetry = TelemetryRecorder::new();
    }
}

fn build_driver(
    guard: &'static SessionGuard,
    profile: DeviceProfile,
) -> (DeviceHandle, DutySink, EmuDriver) {
    let device = DeviceHandle::new(profile);
    let sink = DutySink::new();
    let fault = profile.fault_wired().then(|| device.fault());
    let engine = HandshakeEngine::new(
        Some(device.wake()),
        fault,
        device.timebase(),
        HandshakeConfig::new(),
        guard,
    );
    let driver = Drv8243Driver::new(engine, LevelCurve::default(), sink.clone());
    (device, sink, driver)
}

fn handle_help(topic: Option<&str>) -> Vec<String> {
    match topic {
        None => HELP_TOPICS.iter().map(|(_, text)| (*text).to_string()).collect(),
        Some(topic) => HELP_TOPICS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(topic))
            .map_or_else(
                || vec![format!("ERR no help for `{topic}`")],
                |(_, text)| vec![(*text).to_string()],
            ),
    }
}

fn format_record(record: &TelemetryRecord) -> String {
    let base = format!(
        "[{:04}] t={:>8}us {}",
        record.id,
        record.timestamp.as_u32(),
        record.event
    );
    match record.details {
        TelemetryPayload::None => base,
        TelemetryPayload::Wait(wait) => {
            format!("{base} waited={}us observed={}", wait.elapsed_us, wait.observed)
        }
        TelemetryPayload::Pulse(pulse) => format!(
            "{base} low={}us{}",
            pulse.low_us,
            if pulse.overrun { " OVERRUN" } else { "" }
        ),
        TelemetryPayload::Pass(pass) => format!(
            "{base} attempt={} ready={}us confirm={}us",
            pass.attempt, pass.ready_wait_us, pass.confirm_wait_us
        ),
    }
}
