//! Behavioural tests for the JSONL control protocol served over TCP.

use std::cell::RefCell;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;

use biolink_config::SocketEndpoint;
use biolink_sensor::testing::{MemoryPersistence, ScriptedLink};
use biolink_sensor::{RecordStore, SensorService, SensorSettings, Timeouts};

use crate::dispatch::DispatchConnectionHandler;
use crate::transport::{ListenerHandle, SocketListener};

type StepResult = Result<(), String>;

const REPLY_DELAY: Duration = Duration::from_millis(10);

struct DispatchWorld {
    link: ScriptedLink,
    service: Arc<SensorService>,
    listener: Option<ListenerHandle>,
    address: Option<SocketAddr>,
    reply: Option<Value>,
}

impl DispatchWorld {
    fn new() -> Self {
        let link = ScriptedLink::new();
        let records = RecordStore::open(Box::new(MemoryPersistence::new()))
            .expect("in-memory records open");
        let settings = SensorSettings {
            read_timeout: Duration::from_millis(10),
            timeouts: Timeouts {
                enroll: Duration::from_millis(300),
                search: Duration::from_millis(300),
            },
            ..SensorSettings::default()
        };
        let service = SensorService::start(link.source(), records, &settings, Box::new(|_| {}))
            .expect("sensor service starts");
        Self {
            link,
            service: Arc::new(service),
            listener: None,
            address: None,
            reply: None,
        }
    }

    fn start_listener(&mut self) {
        let listener =
            SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind listener");
        self.address = listener.local_addr();
        let handler = Arc::new(DispatchConnectionHandler::new(Arc::clone(&self.service)));
        self.listener = Some(listener.start(handler).expect("start listener"));
    }

    fn send_request(&mut self, request: &str) -> StepResult {
        let addr = self
            .address
            .ok_or_else(|| "listener has not started".to_owned())?;
        let mut stream = TcpStream::connect(addr).map_err(|error| error.to_string())?;
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .map_err(|error| error.to_string())?;
        stream
            .write_all(request.as_bytes())
            .and_then(|()| stream.write_all(b"\n"))
            .and_then(|()| stream.flush())
            .map_err(|error| error.to_string())?;

        let mut lines = Vec::new();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        while reader.read_line(&mut line).map_err(|error| error.to_string())? > 0 {
            lines.push(line.trim().to_owned());
            line.clear();
        }
        let [only] = lines.as_slice() else {
            return Err(format!("expected exactly one reply line, got {lines:?}"));
        };
        self.reply = Some(serde_json::from_str(only).map_err(|error| error.to_string())?);
        Ok(())
    }

    fn reply(&self) -> Result<&Value, String> {
        self.reply
            .as_ref()
            .ok_or_else(|| "no reply was received".to_owned())
    }
}

impl Drop for DispatchWorld {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.take() {
            let _stopped = handle.stop();
        }
        let _stopped = self.service.shutdown();
    }
}

#[fixture]
fn world() -> RefCell<DispatchWorld> {
    RefCell::new(DispatchWorld::new())
}

#[given("a daemon serving control requests")]
fn given_daemon(world: &RefCell<DispatchWorld>) {
    world.borrow_mut().start_listener();
}

#[given("the sensor confirms enrollment of slot {slot} after a short delay")]
fn given_enrollment_confirmation(world: &RefCell<DispatchWorld>, slot: u16) {
    world.borrow().link.reply_after(
        &format!("1,{slot}"),
        &format!("Fingerprint ID #{slot} stored successfully"),
        REPLY_DELAY,
    );
}

#[given("the sensor answers a search with {answer}")]
fn given_search_answer(world: &RefCell<DispatchWorld>, answer: String) {
    world
        .borrow()
        .link
        .reply_after("2", answer.trim_matches('"'), REPLY_DELAY);
}

#[given("the sensor printed {text}")]
fn given_sensor_printed(world: &RefCell<DispatchWorld>, text: String) -> StepResult {
    let borrow = world.borrow();
    let line = text.trim_matches('"');
    borrow.link.push_line(line);
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if borrow.service.get_log(1).iter().any(|entry| entry.text == line) {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(10));
    }
    Err(format!("line {line} never reached the log"))
}

#[given("the client sent {request}")]
fn given_client_sent(world: &RefCell<DispatchWorld>, request: String) -> StepResult {
    world.borrow_mut().send_request(request.trim_matches('\''))
}

#[when("the client sends {request}")]
fn when_client_sends(world: &RefCell<DispatchWorld>, request: String) -> StepResult {
    world.borrow_mut().send_request(request.trim_matches('\''))
}

#[then("the reply kind is {kind}")]
fn then_reply_kind(world: &RefCell<DispatchWorld>, kind: String) -> StepResult {
    let borrow = world.borrow();
    let reply = borrow.reply()?;
    let expected = kind.trim_matches('"');
    if reply["kind"] == expected {
        Ok(())
    } else {
        Err(format!("expected reply kind {expected}, got {reply}"))
    }
}

#[then("the reply message is {message}")]
fn then_reply_message(world: &RefCell<DispatchWorld>, message: String) -> StepResult {
    let borrow = world.borrow();
    let reply = borrow.reply()?;
    let expected = message.trim_matches('"');
    if reply["message"] == expected {
        Ok(())
    } else {
        Err(format!("expected message {expected}, got {reply}"))
    }
}

#[then("the reply is accepted")]
fn then_reply_accepted(world: &RefCell<DispatchWorld>) -> StepResult {
    let borrow = world.borrow();
    let reply = borrow.reply()?;
    if reply["accepted"] == true {
        Ok(())
    } else {
        Err(format!("expected an accepted reply, got {reply}"))
    }
}

#[then("the error status is {status}")]
fn then_error_status(world: &RefCell<DispatchWorld>, status: i64) -> StepResult {
    let borrow = world.borrow();
    let reply = borrow.reply()?;
    if reply["kind"] == "error" && reply["status"] == status {
        Ok(())
    } else {
        Err(format!("expected error status {status}, got {reply}"))
    }
}

#[then("the error mentions {fragment}")]
fn then_error_mentions(world: &RefCell<DispatchWorld>, fragment: String) -> StepResult {
    let borrow = world.borrow();
    let reply = borrow.reply()?;
    let expected = fragment.trim_matches('"');
    let message = reply["message"].as_str().unwrap_or_default();
    if message.contains(expected) {
        Ok(())
    } else {
        Err(format!("expected error mentioning {expected}, got {reply}"))
    }
}

#[then("the listed records contain {id} named {name}")]
fn then_records_contain(world: &RefCell<DispatchWorld>, id: u16, name: String) -> StepResult {
    let borrow = world.borrow();
    let reply = borrow.reply()?;
    let expected = name.trim_matches('"');
    let records = reply["records"]
        .as_array()
        .ok_or_else(|| format!("reply has no records: {reply}"))?;
    let found = records
        .iter()
        .any(|record| record["id"] == id && record["name"] == expected);
    if found {
        Ok(())
    } else {
        Err(format!("record {id} named {expected} missing from {reply}"))
    }
}

#[then("the log holds {count} entries")]
fn then_log_holds(world: &RefCell<DispatchWorld>, count: usize) -> StepResult {
    let borrow = world.borrow();
    let reply = borrow.reply()?;
    let entries = reply["entries"]
        .as_array()
        .ok_or_else(|| format!("reply has no entries: {reply}"))?;
    if entries.len() == count {
        Ok(())
    } else {
        Err(format!("expected {count} log entries, got {reply}"))
    }
}

#[then("the newest log entry reads {text}")]
fn then_newest_entry(world: &RefCell<DispatchWorld>, text: String) -> StepResult {
    let borrow = world.borrow();
    let reply = borrow.reply()?;
    let expected = text.trim_matches('"');
    let newest = reply["entries"]
        .as_array()
        .and_then(|entries| entries.last())
        .ok_or_else(|| format!("reply has no entries: {reply}"))?;
    if newest["text"] == expected {
        Ok(())
    } else {
        Err(format!("expected newest entry {expected}, got {newest}"))
    }
}

#[then("no command was sent to the sensor")]
fn then_nothing_written(world: &RefCell<DispatchWorld>) {
    let written = world.borrow().link.written();
    assert!(written.is_empty(), "unexpected commands: {written:?}");
}

#[scenario(path = "tests/features/control_dispatch.feature")]
fn control_dispatch(#[from(world)] _: RefCell<DispatchWorld>) -> Result<(), String> {
    Ok(())
}
