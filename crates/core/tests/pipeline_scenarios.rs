use conveyor_core::config::{PipelineConfig, SchedulerConfig};
use conveyor_core::debug_event::{NodeDebugValueEvent, PipelineObserver};
use conveyor_core::executor::{RunReport, RunStatus, Scheduler};
use conveyor_core::graph::PipelineGraph;
use conveyor_core::registry::build_default_registry;
use conveyor_core::types::{Image, PortData};

#[derive(Default)]
struct RecordingObserver {
    emissions: Vec<String>,
    dropped: Vec<String>,
}

impl PipelineObserver for RecordingObserver {
    fn value_dropped(&mut self, source_id: &str, output: &str, _value: &PortData) {
        self.dropped.push(format!("{source_id}.{output}"));
    }

    fn node_emitted(&mut self, event: &NodeDebugValueEvent) {
        self.emissions.push(event.value.clone());
    }
}

fn build(json: &str, observer: &mut RecordingObserver) -> anyhow::Result<PipelineGraph> {
    let config = PipelineConfig::from_json_str(json)?;
    PipelineGraph::from_config(&config, &build_default_registry(), observer)
}

fn run(graph: &mut PipelineGraph, observer: &mut RecordingObserver) -> RunReport {
    Scheduler::new(SchedulerConfig {
        max_passes: Some(1_000),
    })
    .run(graph, observer)
    .expect("pipeline should run")
}

fn deliver(graph: &mut PipelineGraph, endpoint: (&str, &str), value: PortData) {
    graph
        .deliver(endpoint.0, endpoint.1, value, &mut RecordingObserver::default())
        .expect("delivery should succeed");
}

fn filename(name: &str) -> PortData {
    PortData::Str(name.to_string())
}

#[test]
fn counter_format_print_emits_each_index() {
    let mut observer = RecordingObserver::default();
    let mut graph = build(
        r#"{
            "nodes": {"c": "counter", "f": "format<INT index>", "p": "print"},
            "constants": {"c.min": 0, "c.max": 3, "f.input": "%d"},
            "links": {"c.index": "f.index", "f.output": "p.input"}
        }"#,
        &mut observer,
    )
    .unwrap();

    let report = run(&mut graph, &mut observer);
    assert_eq!(report.status, RunStatus::Fixpoint);
    assert_eq!(
        observer.emissions,
        vec!["[Printer says] 0", "[Printer says] 1", "[Printer says] 2"]
    );
    assert!(observer.dropped.is_empty(), "f.error never fired");
}

const STACK_PIPELINE: &str = r#"{
    "nodes": {
        "reader": "read_jpg",
        "stacker": "stack",
        "writer": "save_jpg",
        "complain": "print"
    },
    "constants": {
        "stacker.count": 3,
        "stacker.method": "median",
        "writer.filename": "stacked.jpg"
    },
    "links": {
        "reader.image": "stacker.input",
        "stacker.output": "writer.image",
        "stacker.error": "complain.input"
    }
}"#;

#[test]
fn stack_combines_three_images_and_resets() {
    let mut observer = RecordingObserver::default();
    let mut graph = build(STACK_PIPELINE, &mut observer).unwrap();

    for name in ["a.jpg", "b.jpg", "c.jpg", "d.jpg"] {
        deliver(&mut graph, ("reader", "filename"), filename(name));
    }
    run(&mut graph, &mut observer);

    assert_eq!(
        observer.emissions,
        vec!["saving image: w 800, h 600, title untitled, operations {median [a.jpg, b.jpg, c.jpg]}"]
    );

    // d.jpg opened a fresh batch; two more complete it.
    for name in ["e.jpg", "f.jpg"] {
        deliver(&mut graph, ("reader", "filename"), filename(name));
    }
    run(&mut graph, &mut observer);

    assert_eq!(observer.emissions.len(), 2);
    assert_eq!(
        observer.emissions[1],
        "saving image: w 800, h 600, title untitled, operations {median [d.jpg, e.jpg, f.jpg]}"
    );
}

#[test]
fn stack_dimension_mismatch_reports_error() {
    let mut observer = RecordingObserver::default();
    let mut graph = build(STACK_PIPELINE, &mut observer).unwrap();

    deliver(&mut graph, ("reader", "filename"), filename("a.jpg"));
    deliver(&mut graph, ("reader", "filename"), filename("b.jpg"));
    deliver(
        &mut graph,
        ("stacker", "input"),
        PortData::Image(Image::new(1024, 768).with_title("odd.jpg")),
    );
    run(&mut graph, &mut observer);

    assert_eq!(observer.emissions, vec!["[Printer says] Image size mismatch"]);
}

#[test]
fn enhancer_filter_cycle_reaches_fixpoint() {
    let mut observer = RecordingObserver::default();
    let mut graph = build(
        r#"{
            "nodes": {
                "reader": "read_jpg",
                "enhance": "enhancer",
                "gate": "filter<IMAGE input>",
                "writer": "save_jpg"
            },
            "constants": {"writer.filename": "out.jpg"},
            "links": {
                "reader.image": "enhance.input",
                "enhance.output": "gate.input",
                "enhance.can_enhance": "gate.condition",
                "gate.output_true": "enhance.input",
                "gate.output_false": "writer.image"
            }
        }"#,
        &mut observer,
    )
    .unwrap();
    assert!(graph.has_cycle());

    deliver(&mut graph, ("reader", "filename"), filename("photo.jpg"));
    let report = run(&mut graph, &mut observer);

    assert_eq!(report.status, RunStatus::Fixpoint);
    assert_eq!(
        observer.emissions,
        vec![format!(
            "saving image: w 800, h 600, title photo.jpg, operations {{{}}}",
            ["enhanced"; 5].join(" AND ")
        )]
    );
}

#[test]
fn fan_out_copies_are_independent() {
    let mut observer = RecordingObserver::default();
    let mut graph = build(
        r#"{
            "nodes": {
                "reader": "read_jpg",
                "enhance": "enhancer",
                "plain": "save_jpg",
                "fancy": "save_jpg"
            },
            "constants": {"plain.filename": "plain.jpg", "fancy.filename": "fancy.jpg"},
            "links": {
                "reader.image": ["plain.image", "enhance.input"],
                "enhance.output": "fancy.image"
            }
        }"#,
        &mut observer,
    )
    .unwrap();

    deliver(&mut graph, ("reader", "filename"), filename("shot.jpg"));
    run(&mut graph, &mut observer);

    assert_eq!(
        observer.emissions,
        vec![
            "saving image: w 800, h 600, title shot.jpg, operations {}",
            "saving image: w 800, h 600, title shot.jpg, operations {enhanced}",
        ]
    );
    assert_eq!(observer.dropped, vec!["enhance.can_enhance"]);
    assert_eq!(
        graph.connections_from("reader", "image"),
        vec![
            ("plain".to_string(), "image".to_string()),
            ("enhance".to_string(), "input".to_string()),
        ]
    );
}

#[test]
fn blocked_graph_is_idempotent() {
    let mut observer = RecordingObserver::default();
    let mut graph = build(
        r#"{
            "nodes": {"f": "format<INT a, INT b>", "p": "print"},
            "constants": {"f.input": "%d + %d"},
            "links": {"f.output": "p.input"}
        }"#,
        &mut observer,
    )
    .unwrap();
    deliver(&mut graph, ("f", "a"), PortData::Int(1));

    for _ in 0..2 {
        let report = run(&mut graph, &mut observer);
        assert_eq!(report.passes, 1);
        assert_eq!(report.status, RunStatus::Fixpoint);
        assert!(graph.node("f").unwrap().ports().has_pending("a"));
    }
    assert!(observer.emissions.is_empty());

    deliver(&mut graph, ("f", "b"), PortData::Int(2));
    run(&mut graph, &mut observer);
    assert_eq!(observer.emissions, vec!["[Printer says] 1 + 2"]);
}

#[test]
fn construction_failures_are_reported_whole() {
    let cases = [
        (
            r#"{"nodes": {"x": "bogus"}}"#,
            "failed to build node 'x' of kind 'bogus': unknown node type: bogus",
        ),
        (
            r#"{"nodes": {"f": "format<WORD a>"}}"#,
            "failed to build node 'f' of kind 'format<WORD a>': no such type WORD",
        ),
        (
            r#"{
                "nodes": {"c": "counter", "f": "format<INT a>"},
                "constants": {"f.a": 1},
                "links": {"c.index": "f.a"}
            }"#,
            "failed to connect 'c.index' -> 'f.a': input 'f.a' is a constant",
        ),
        (
            r#"{
                "nodes": {"c": "counter", "p": "print"},
                "links": {"c.index": "p.input"}
            }"#,
            "failed to connect 'c.index' -> 'p.input': type mismatch: 'c.index' (INT) -> 'p.input' (STRING)",
        ),
        (
            r#"{
                "nodes": {"c": "counter"},
                "links": {"c.index": "ghost.input"}
            }"#,
            "failed to connect 'c.index' -> 'ghost.input': unknown target node id: ghost",
        ),
        (
            r#"{
                "nodes": {"c": "counter"},
                "constants": {"c.min": 1.5}
            }"#,
            "failed to assign constant to 'c.min': wrong type for input 'min': expected INT, got FLOAT",
        ),
    ];

    for (json, expected) in cases {
        let mut observer = RecordingObserver::default();
        let err = match build(json, &mut observer) {
            Ok(_) => panic!("pipeline should be rejected: {json}"),
            Err(err) => err,
        };
        assert_eq!(format!("{err:#}"), expected);
    }
}
