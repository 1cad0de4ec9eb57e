use pipscope_types::{
    BatchReport, MetricMap, MetricValue, PipelineConfig, PipscopeError, PublishReport,
    SessionTable, Timeframe,
};

#[test]
fn pipeline_config_json_roundtrip() {
    let cfg = PipelineConfig::default();
    let json = serde_json::to_string(&cfg).expect("serialize config");
    let de: PipelineConfig = serde_json::from_str(&json).expect("deserialize config");
    assert_eq!(de, cfg);
    assert_eq!(de.sessions, SessionTable::default());
    assert_eq!(de.timeframes, Timeframe::ALL.to_vec());
}

#[test]
fn session_times_serialize_as_clock_strings() {
    let json = serde_json::to_value(SessionTable::default()).expect("serialize table");
    assert_eq!(json[0]["name"], "Asia");
    assert_eq!(json[0]["start"], "21:00:00");
    assert_eq!(json[0]["end"], "03:00:00");
}

#[test]
fn metric_values_are_untagged() {
    let mut m = MetricMap::new();
    m.insert("Average Daily Range (pips)".into(), MetricValue::Number(71.25));
    m.insert(
        "Date Range".into(),
        MetricValue::Text("2024-01-01 to 2024-12-31".into()),
    );
    let json = serde_json::to_string(&m).expect("serialize metrics");
    assert_eq!(
        json,
        r#"{"Average Daily Range (pips)":71.25,"Date Range":"2024-01-01 to 2024-12-31"}"#
    );
    let de: MetricMap = serde_json::from_str(&json).expect("deserialize metrics");
    assert_eq!(de, m);
}

#[test]
fn reports_carry_errors_through_serde() {
    let mut batch: BatchReport<u32> = BatchReport::default();
    batch.results.insert("EURUSD".into(), 1);
    batch
        .failures
        .insert("FAIL".into(), PipscopeError::not_found("raw bars for FAIL"));
    let json = serde_json::to_string(&batch).expect("serialize batch");
    let de: BatchReport<u32> = serde_json::from_str(&json).expect("deserialize batch");
    assert_eq!(de.succeeded(), 1);
    assert_eq!(de.failed(), 1);
    assert!(!de.is_complete());

    let publish = PublishReport::default();
    assert_eq!(publish.published(), 0);
    assert_eq!(publish.failed(), 0);
}

#[test]
fn transient_classification() {
    for status in [429, 502, 503, 504] {
        assert!(PipscopeError::http(status, "x").is_transient(), "{status}");
    }
    for status in [400, 401, 403, 404, 500] {
        assert!(!PipscopeError::http(status, "x").is_transient(), "{status}");
    }
    assert!(PipscopeError::Transport("connect refused".into()).is_transient());
    assert!(!PipscopeError::InvalidArg("bad".into()).is_transient());
    assert!(
        PipscopeError::AllFailed(vec![
            PipscopeError::http(503, "a"),
            PipscopeError::Transport("b".into())
        ])
        .is_transient()
    );
    assert!(
        !PipscopeError::AllFailed(vec![
            PipscopeError::http(503, "a"),
            PipscopeError::http(401, "b")
        ])
        .is_transient()
    );
    assert!(!PipscopeError::AllFailed(vec![]).is_transient());
}

#[test]
fn flatten_unwraps_nested_aggregates() {
    let nested = PipscopeError::AllFailed(vec![
        PipscopeError::Data("a".into()),
        PipscopeError::AllFailed(vec![PipscopeError::Io("b".into())]),
    ]);
    assert_eq!(
        nested.flatten(),
        vec![PipscopeError::Data("a".into()), PipscopeError::Io("b".into())]
    );
}

#[test]
fn io_not_found_maps_to_not_found() {
    let err: PipscopeError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(err.is_missing_input());
    let err: PipscopeError = std::io::Error::other("disk").into();
    assert!(matches!(err, PipscopeError::Io(_)));
}
