//! Maps control requests onto sensor service operations.

use tracing::debug;

use biolink_sensor::{SensorService, Verb};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::request::{ControlRequest, Scalar};
use super::response::ControlReply;

/// Serves `request` against `service`.
pub(crate) fn route(
    service: &SensorService,
    request: ControlRequest,
) -> Result<ControlReply, DispatchError> {
    debug!(target: DISPATCH_TARGET, ?request, "routing request");
    match request {
        ControlRequest::Invoke { verb, id, name } => {
            let verb_text = verb.into_text();
            let parsed = verb_text
                .parse::<Verb>()
                .map_err(|error| DispatchError::invalid_arguments(error.to_string()))?;
            invoke(service, parsed, id, name)
        }
        ControlRequest::Enroll { id, name } => invoke(service, Verb::Enroll, id, name),
        ControlRequest::Search => invoke(service, Verb::Search, None, None),
        ControlRequest::Delete { id } => invoke(service, Verb::Delete, id, None),
        ControlRequest::Log { limit } => Ok(ControlReply::Log {
            entries: service.get_log(limit.unwrap_or(usize::MAX)),
        }),
        ControlRequest::ClearLog => {
            service.clear_log();
            Ok(ControlReply::Done { ok: true })
        }
        ControlRequest::ListRecords => Ok(ControlReply::Records {
            records: service.list_records(),
        }),
        ControlRequest::RenameRecord { id, name } => Ok(ControlReply::Done {
            ok: service.rename_record(&id.into_text(), &name)?,
        }),
        ControlRequest::DeleteRecord { id } => Ok(ControlReply::Done {
            ok: service.delete_record(&id.into_text())?,
        }),
        ControlRequest::Status => {
            let journal = service.journal();
            Ok(ControlReply::Status {
                log: journal.log_len(),
                log_capacity: journal.log_capacity(),
                pending: journal.pending_len(),
                evicted: journal.pending_evictions(),
                records: service.list_records().len(),
            })
        }
    }
}

fn invoke(
    service: &SensorService,
    verb: Verb,
    id: Option<Scalar>,
    name: Option<String>,
) -> Result<ControlReply, DispatchError> {
    let id_text = id.map(Scalar::into_text);
    let reply = service.invoke(verb, id_text.as_deref(), name.as_deref())?;
    Ok(reply.into())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use biolink_sensor::testing::{MemoryPersistence, ScriptedLink};
    use biolink_sensor::{RecordStore, SensorSettings, Timeouts};
    use rstest::{fixture, rstest};

    use super::*;

    struct Fixture {
        link: ScriptedLink,
        service: SensorService,
    }

    #[fixture]
    fn fixture() -> Fixture {
        let link = ScriptedLink::new();
        let records =
            RecordStore::open(Box::new(MemoryPersistence::new())).expect("records open");
        let settings = SensorSettings {
            read_timeout: Duration::from_millis(10),
            timeouts: Timeouts {
                enroll: Duration::from_millis(200),
                search: Duration::from_millis(200),
            },
            ..SensorSettings::default()
        };
        let service = SensorService::start(link.source(), records, &settings, Box::new(|_| {}))
            .expect("service starts");
        Fixture { link, service }
    }

    #[rstest]
    fn unknown_verb_is_an_argument_error(fixture: Fixture) {
        let request = ControlRequest::Invoke {
            verb: Scalar::Text("reboot".to_owned()),
            id: None,
            name: None,
        };
        assert!(matches!(
            route(&fixture.service, request),
            Err(DispatchError::InvalidArguments { .. })
        ));
        assert!(fixture.link.written().is_empty());
    }

    #[rstest]
    fn numeric_ids_reach_the_dispatcher(fixture: Fixture) {
        fixture.link.reply_after(
            "1,7",
            "Fingerprint ID #7 stored successfully",
            Duration::from_millis(10),
        );
        let reply = route(
            &fixture.service,
            ControlRequest::Enroll {
                id: Some(Scalar::Number(7)),
                name: Some("Ada".to_owned()),
            },
        )
        .expect("routed");
        assert_eq!(
            reply,
            ControlReply::Reply {
                accepted: true,
                message: "Enrolled ID 7 successfully".to_owned(),
            }
        );
        assert_eq!(fixture.link.written(), vec!["1,7".to_owned()]);
    }

    #[rstest]
    fn rename_of_unknown_record_is_not_ok(fixture: Fixture) {
        let reply = route(
            &fixture.service,
            ControlRequest::RenameRecord {
                id: Scalar::Number(9),
                name: "Nobody".to_owned(),
            },
        )
        .expect("routed");
        assert_eq!(reply, ControlReply::Done { ok: false });
    }

    #[rstest]
    fn status_reports_log_depth(fixture: Fixture) {
        route(&fixture.service, ControlRequest::Delete { id: None }).expect("routed");
        let reply = route(&fixture.service, ControlRequest::Status).expect("routed");
        let ControlReply::Status { log, records, .. } = reply else {
            panic!("expected status reply, got {reply:?}");
        };
        assert_eq!(log, 1, "the rejected delete leaves one status line");
        assert_eq!(records, 0);
    }
}
