use bouncer::{
    error::{AdmissionError, AdmissionErrorKind},
    session::{
        BoundaryErrorKind, FetchRetry, HttpSession, HttpSessionConfig, error::map_http_error,
    },
};

#[test]
fn given_throttling_or_server_errors_when_mapped_then_transient() {
    for status in [408, 429, 500, 503] {
        let err = map_http_error(status, "try later");
        assert_eq!(err.kind, BoundaryErrorKind::Transient, "status {status}");
        assert!(err.retryable);
        assert_eq!(err.http_status, Some(status));
    }
}

#[test]
fn given_client_error_when_mapped_then_permanent_and_body_truncated() {
    let body = "x".repeat(1_000);
    let err = map_http_error(400, &body);

    assert_eq!(err.kind, BoundaryErrorKind::Permanent);
    assert!(!err.retryable);
    assert!(err.message.len() < 400);
    assert!(!FetchRetry::default().can_retry(&err, 0));
}

#[test]
fn given_boundary_error_when_lifted_then_admission_error_keeps_message() {
    let lifted = AdmissionError::from(map_http_error(404, "no such game"));

    assert_eq!(lifted.kind, AdmissionErrorKind::Boundary);
    assert!(lifted.message.contains("404"));
    assert!(lifted.message.contains("no such game"));
}

#[test]
fn given_blank_player_id_when_building_http_session_then_invalid_config() {
    let config = HttpSessionConfig {
        player_id: Some("   ".to_string()),
        ..HttpSessionConfig::default()
    };

    let err = HttpSession::new(config)
        .err()
        .expect("blank player id must be refused");
    assert_eq!(err.kind, AdmissionErrorKind::InvalidConfig);
}
