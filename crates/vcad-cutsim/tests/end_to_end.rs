//! Parse G-code and run it through the simulator.

use approx::assert_relative_eq;
use nalgebra::Point3;
use vcad_cutsim::{
    spawn_simulation, ArtifactSink, CancelToken, CutStatus, CuttingTable, NoProgress, SimError,
    Simulation, SimulationConfig, SimulationMode, TriMesh,
};
use vcad_cutsim_gcode::{Dialect, Interpreter, Program};

fn parse(lines: &[&str]) -> Program {
    Interpreter::new(Dialect::Fanuc).parse(lines)
}

fn config(mode: SimulationMode) -> SimulationConfig {
    SimulationConfig {
        simulation_step: 1.0,
        mode,
        ..Default::default()
    }
}

/// Stock far from anything the tool visits.
fn distant_setup() -> Simulation {
    let stock = TriMesh::cuboid(&Point3::new(200.0, 200.0, 0.0), &Point3::new(220.0, 220.0, 10.0)).unwrap();
    let tool = TriMesh::cylinder(2.0, 10.0, 32).unwrap();
    Simulation::new(stock, tool, config(SimulationMode::Simplified)).unwrap()
}

/// A 20 × 10 × 5 block whose top face is z = 0; the tool axis starts at
/// x = -5.5, clear of the block.
fn slotting_setup(mode: SimulationMode) -> Simulation {
    let stock = TriMesh::cuboid(&Point3::new(0.0, -5.0, -5.0), &Point3::new(20.0, 5.0, 0.0)).unwrap();
    let mut tool = TriMesh::cylinder(2.0, 10.0, 32).unwrap();
    tool.translate(&nalgebra::Vector3::new(-5.5, 0.0, 0.0));
    Simulation::new(stock, tool, config(mode)).unwrap()
}

const SLOT: [&str; 4] = ["G90", "G0 Z-2", "G1 X15 F300 S1000", "G0 Z10"];

#[test]
fn test_rapid_then_feed_in_air() {
    let program = parse(&["G90", "G0 X0 Y0 Z10", "G1 X10 Y0 Z0 F300 S1000"]);
    assert_eq!(program.commands.len(), 2);

    let sim = distant_setup();
    let out = sim.run_program(&program, &mut NoProgress, None);

    // 5 rapid substeps, then feed substeps over the Euclidean length of the
    // move: ceil(|(10, 0, -10)| / 1.0) = 15.
    let feed_substeps = (200.0_f64.sqrt() / 1.0).ceil() as usize;
    assert_eq!(out.frames.len(), 5 + feed_substeps);
    assert!(out.frames[..5].iter().all(|f| f.source_line == 2));
    assert!(out.frames[5..].iter().all(|f| f.source_line == 3));

    let last = out.frames.last().unwrap();
    assert!(last.elapsed_time > 0.0);
    assert_eq!(last.pose.position(), Point3::new(10.0, 0.0, 0.0));
    for frame in &out.frames {
        assert_eq!(frame.status, CutStatus::Air);
        assert_eq!(
            [frame.width, frame.depth, frame.cross_section_area, frame.cutting_force],
            [0.0; 4]
        );
    }
    assert!(out.report.is_clean());
}

#[test]
fn test_horizontal_feed_substeps() {
    let program = parse(&["G90", "G0 X0 Y0 Z10", "G1 X10 Y0 Z10 F300 S1000"]);
    let out = distant_setup().run_program(&program, &mut NoProgress, None);
    assert_eq!(out.frames.len(), 5 + 10);
    assert_eq!(out.table().len(), 15);
}

#[test]
fn test_slot_removes_material() {
    let sim = slotting_setup(SimulationMode::Simplified);
    let before = sim.workpiece().volume();
    let out = sim.run_program(&parse(&SLOT), &mut NoProgress, None);

    assert!(out.report.failures.is_empty());
    assert!(out.report.cut_frames > 0);
    assert!(out.workpiece.volume() < before - 1.0);

    let cuts: Vec<_> = out.frames.iter().filter(|f| f.status == CutStatus::Cut).collect();
    for frame in &cuts {
        assert_eq!(frame.source_line, 3);
        assert_relative_eq!(frame.depth, 2.0, epsilon = 1e-3);
        assert!(frame.width > 0.0 && frame.width <= 4.0 + 1e-3);
        assert!(frame.cross_section_area > 0.0);
        assert!(frame.cutting_force.is_finite());
    }
    // Once the cutter is fully engaged the slot is one diameter wide.
    let engaged = cuts.iter().find(|f| f.pose.x > 6.5).unwrap();
    assert_relative_eq!(engaged.width, 4.0, epsilon = 1e-3);
    // The force filter needs two cutting substeps of feed history.
    assert!(cuts.iter().skip(2).any(|f| f.cutting_force > 0.0));
}

#[test]
fn test_accurate_width_is_area_over_depth() {
    let sim = slotting_setup(SimulationMode::Accurate);
    let out = sim.run_program(&parse(&SLOT), &mut NoProgress, None);
    let cuts: Vec<_> = out.frames.iter().filter(|f| f.status == CutStatus::Cut).collect();
    assert!(!cuts.is_empty());
    for frame in cuts.iter().filter(|f| f.depth > 0.0) {
        assert_relative_eq!(frame.width, frame.cross_section_area / frame.depth, epsilon = 1e-9);
    }
}

#[test]
fn test_runs_are_deterministic() {
    let program = parse(&SLOT);
    let sim = slotting_setup(SimulationMode::Simplified);
    let first = sim.run_program(&program, &mut NoProgress, None);
    let second = sim.run_program(&program, &mut NoProgress, None);
    assert_eq!(first.frames, second.frames);
    assert_eq!(first.workpiece, second.workpiece);
}

#[test]
fn test_time_and_progress_are_monotonic() {
    let program = parse(&SLOT);
    let mut published = Vec::new();
    let out = slotting_setup(SimulationMode::Simplified).run_program(
        &program,
        &mut |p: f64| published.push(p),
        None,
    );

    assert!(out.frames.windows(2).all(|w| w[0].elapsed_time <= w[1].elapsed_time));
    assert_eq!(out.report.substeps, out.frames.len());
    assert_eq!(out.snapshots.len(), out.frames.len());

    assert_eq!(published.first(), Some(&0.0));
    assert_eq!(published.last(), Some(&1000.0));
    assert!(published.windows(2).all(|w| w[0] <= w[1]));
    assert!(published.iter().all(|p| (0.0..=1000.0).contains(p)));
}

#[test]
fn test_background_run_reports_completion() {
    let program = parse(&SLOT);
    let handle =
        spawn_simulation(slotting_setup(SimulationMode::Simplified), program.commands.clone()).unwrap();
    let out = handle.join().unwrap();
    assert!(!out.report.cancelled);
    assert!(out.report.cut_frames > 0);
}

#[test]
fn test_cancelled_run_keeps_partial_results() {
    let program = parse(&SLOT);
    let token = CancelToken::new();
    let mut commands_seen = 0;
    let sim = slotting_setup(SimulationMode::Simplified);
    let observer = token.clone();
    // Cancel from the progress callback once the first command is done.
    let out = sim.run_program(
        &program,
        &mut |p: f64| {
            if p >= 1000.0 / 3.0 - 1e-9 && commands_seen == 0 {
                commands_seen += 1;
                observer.cancel();
            }
        },
        Some(&token),
    );
    assert!(out.report.cancelled);
    assert_eq!(out.report.commands, 1);
    assert_eq!(out.frames.len(), 5);
}

struct FullDisk;

impl ArtifactSink for FullDisk {
    fn export(&mut self, _: &TriMesh, _: &CuttingTable) -> vcad_cutsim::Result<()> {
        Err(SimError::Export("no space left on device".into()))
    }
}

#[test]
fn test_export_failure_keeps_results() {
    let mut out = distant_setup().run_program(&parse(&SLOT), &mut NoProgress, None);
    let frames = out.frames.len();
    assert!(out.export(&mut FullDisk).is_err());
    assert_eq!(
        out.report.export_error.as_deref(),
        Some("export failed: no space left on device")
    );
    assert_eq!(out.frames.len(), frames);
    assert!(!out.report.is_clean());
}

#[test]
fn test_fixtured_stock_is_cut_from_the_corner() {
    let stock = TriMesh::cuboid(&Point3::new(10.0, 10.0, 10.0), &Point3::new(40.0, 30.0, 20.0)).unwrap();
    let cutter = TriMesh::cylinder(3.0, 30.0, 24).unwrap();
    let sim = Simulation::fixtured(&stock, &cutter, config(SimulationMode::Simplified)).unwrap();

    // Stock now spans x ∈ [-30, 0], y ∈ [0, 20], z ∈ [0, 10]; the tool's
    // bounding box starts at the origin.
    let program = parse(&[
        "G90",
        "G0 X10",
        "G0 Z12",
        "G0 X-20 Y5",
        "G1 Z8 F200 S3000",
        "G1 X-10",
    ]);
    let out = sim.run_program(&program, &mut NoProgress, None);
    assert!(out.report.failures.is_empty());
    assert!(out.report.cut_frames > 0);
    assert!(out.workpiece.volume() < sim.workpiece().volume());
}
