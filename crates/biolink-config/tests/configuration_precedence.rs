//! Behavioural coverage of configuration layer precedence.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;
use ortho_config::OrthoConfig;

use biolink_config::{
    Config, SocketEndpoint, default_baud_rate, default_control_socket, default_log_filter,
    default_log_format, default_serial_port,
};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct Harness {
    temp_dir: TempDir,
    file_lines: RefCell<Vec<String>>,
    cli_args: RefCell<Vec<OsString>>,
    env_overrides: RefCell<Vec<(String, Option<OsString>)>>,
    env_guard: RefCell<Option<MutexGuard<'static, ()>>>,
    loaded: RefCell<Option<Config>>,
    error: RefCell<Option<String>>,
}

impl Harness {
    fn new() -> Self {
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        Self {
            temp_dir,
            file_lines: RefCell::new(Vec::new()),
            cli_args: RefCell::new(vec![OsString::from("biolinkd")]),
            env_overrides: RefCell::new(Vec::new()),
            env_guard: RefCell::new(None),
            loaded: RefCell::new(None),
            error: RefCell::new(None),
        }
    }

    fn add_file_line(&self, line: String) {
        self.file_lines.borrow_mut().push(line);
    }

    fn config_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("biolink.toml")
    }

    fn set_env(&self, key: &str, value: &str) {
        if self.env_guard.borrow().is_none() {
            let guard = ENV_MUTEX
                .lock()
                .unwrap_or_else(|poison| poison.into_inner());
            *self.env_guard.borrow_mut() = Some(guard);
        }
        let previous = std::env::var_os(key);
        // Environment mutation is unsafe on the 2024 edition; overrides are
        // restored in `Drop`.
        unsafe { std::env::set_var(key, value) };
        self.env_overrides
            .borrow_mut()
            .push((key.to_string(), previous));
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn load(&self) {
        if self.loaded.borrow().is_some() || self.error.borrow().is_some() {
            return;
        }

        let mut args = self.cli_args.borrow().clone();
        let lines = self.file_lines.borrow();
        if !lines.is_empty() {
            let path = self.config_path();
            if let Err(error) = fs::write(&path, lines.join("\n")) {
                panic!("failed to write configuration: {error}");
            }
            args.insert(1, OsString::from("--config-path"));
            args.insert(2, path.into_os_string());
        }

        match Config::load_from_iter(args) {
            Ok(config) => *self.loaded.borrow_mut() = Some(config),
            Err(error) => *self.error.borrow_mut() = Some(error.to_string()),
        }
    }

    fn config(&self) -> Config {
        self.load();
        if let Some(error) = self.error.borrow().as_ref() {
            panic!("configuration failed to load: {error}");
        }
        match self.loaded.borrow().as_ref() {
            Some(config) => config.clone(),
            None => panic!("configuration was not loaded"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let mut overrides = self.env_overrides.borrow_mut();
        while let Some((key, value)) = overrides.pop() {
            match value {
                Some(os_value) => unsafe { std::env::set_var(&key, os_value) },
                None => unsafe { std::env::remove_var(&key) },
            }
        }
        drop(self.env_guard.borrow_mut().take());
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a configuration file setting the serial port to \"{port}\"")]
fn given_file_serial_port(harness: &Harness, port: String) {
    harness.add_file_line(format!("serial_port = \"{port}\""));
}

#[given("a configuration file setting the control socket to \"{socket}\"")]
fn given_file_control_socket(harness: &Harness, socket: String) {
    let endpoint = match socket.parse::<SocketEndpoint>() {
        Ok(endpoint) => endpoint,
        Err(error) => panic!("invalid socket '{socket}': {error}"),
    };
    let line = match endpoint {
        SocketEndpoint::Unix { path } => {
            format!("control_socket = {{ transport = \"unix\", path = \"{path}\" }}")
        }
        SocketEndpoint::Tcp { host, port } => format!(
            "control_socket = {{ transport = \"tcp\", host = \"{host}\", port = {port} }}"
        ),
    };
    harness.add_file_line(line);
}

#[given("the environment overrides the serial port to \"{port}\"")]
fn given_env_serial_port(harness: &Harness, port: String) {
    harness.set_env("BIOLINK_SERIAL_PORT", &port);
}

#[when("the CLI sets the serial port to \"{port}\"")]
fn when_cli_serial_port(harness: &Harness, port: String) {
    harness.push_cli_arg("--serial-port");
    harness.push_cli_arg(OsString::from(&port));
}

#[when("the configuration loads without overrides")]
fn when_load_without_overrides(harness: &Harness) {
    harness.load();
}

#[then("loading the configuration resolves the serial port to \"{port}\"")]
fn then_serial_port(harness: &Harness, port: String) {
    assert_eq!(harness.config().serial_port(), port);
}

#[then("loading the configuration resolves the control socket to \"{socket}\"")]
fn then_control_socket(harness: &Harness, socket: String) {
    let expected = match socket.parse::<SocketEndpoint>() {
        Ok(endpoint) => endpoint,
        Err(error) => panic!("invalid expected socket '{socket}': {error}"),
    };
    assert_eq!(harness.config().control_socket(), &expected);
}

#[then("loading the configuration applies the built-in defaults")]
fn then_defaults_applied(harness: &Harness) {
    let config = harness.config();
    assert_eq!(config.serial_port(), default_serial_port());
    assert_eq!(config.baud_rate(), default_baud_rate());
    assert_eq!(config.control_socket(), &default_control_socket());
    assert_eq!(config.log_filter(), default_log_filter());
    assert_eq!(config.log_format(), default_log_format());
}

#[scenario(path = "tests/features/configuration_precedence.feature")]
fn configuration_precedence(#[from(harness)] harness: Harness) {
    let _ = harness;
}
